//! Post-processing of fetched series, driven by the request's function list.

mod registry;
mod series;

pub use registry::{ArrayReduction, Function, SortOrder};

use tracing::{debug, warn};

use crate::query::model::{FunctionCategory, FunctionDescriptor};
use crate::values::{Scalars, SingleData, Values};

/// Functions of one query, resolved once before any data is touched.
/// Entries that fail to resolve are logged and left out.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    reductions: Vec<ArrayReduction>,
    steps: Vec<Function>,
}

impl Pipeline {
    pub fn from_descriptors(descriptors: &[FunctionDescriptor]) -> Self {
        let mut pipeline = Pipeline::default();

        for descriptor in descriptors {
            match descriptor.def.category {
                FunctionCategory::ToScalar => match ArrayReduction::from_name(descriptor.name()) {
                    Some(reduction) => pipeline.reductions.push(reduction),
                    None => warn!(
                        function = descriptor.name(),
                        "not a recognized array function"
                    ),
                },
                FunctionCategory::Transform | FunctionCategory::Filter | FunctionCategory::Sort => {
                    match Function::resolve(descriptor) {
                        Ok(step) => pipeline.steps.push(step),
                        Err(e) => warn!(error = %e, "function has been skipped"),
                    }
                }
                FunctionCategory::Options | FunctionCategory::Unknown => {}
            }
        }

        pipeline
    }

    pub fn is_empty(&self) -> bool {
        self.reductions.is_empty() && self.steps.is_empty()
    }

    pub fn apply(&self, data: Vec<SingleData>) -> Vec<SingleData> {
        let data = self.apply_reductions(data);
        self.steps
            .iter()
            .fold(data, |data, step| apply_step(step, data))
    }

    /// Replaces the input by one scalar series per waveform series and
    /// reduction. Anything that isn't a waveform is dropped here.
    fn apply_reductions(&self, data: Vec<SingleData>) -> Vec<SingleData> {
        if self.reductions.is_empty() {
            return data;
        }

        let mut reduced = Vec::with_capacity(data.len() * self.reductions.len());
        for reduction in &self.reductions {
            for sd in &data {
                let Some(arrays) = sd.values.as_arrays() else {
                    continue;
                };
                let scalars = arrays.reduce(|row| reduction.apply(row));
                reduced.push(sd.derived(
                    format!("{}({})", sd.name, reduction.suffix()),
                    Values::Scalars(scalars),
                ));
            }
        }

        debug!(inputs = data.len(), outputs = reduced.len(), "applied array functions");
        reduced
    }
}

fn for_each_scalars(mut data: Vec<SingleData>, f: impl Fn(&mut Scalars)) -> Vec<SingleData> {
    for sd in data.iter_mut() {
        if let Some(scalars) = sd.values.as_scalars_mut() {
            f(scalars);
        }
    }
    data
}

fn apply_step(step: &Function, data: Vec<SingleData>) -> Vec<SingleData> {
    match step {
        Function::Scale { factor } => for_each_scalars(data, |s| s.scale(*factor)),
        Function::Offset { delta } => for_each_scalars(data, |s| s.offset(*delta)),
        Function::Delta => for_each_scalars(data, |s| s.delta()),
        Function::Fluctuation => for_each_scalars(data, |s| s.fluctuation()),
        Function::MovingAverage { window_size } => {
            for_each_scalars(data, |s| s.moving_average(*window_size))
        }
        Function::Top { number, rank } => series::top(data, *number, *rank),
        Function::Bottom { number, rank } => series::bottom(data, *number, *rank),
        Function::Exclude { pattern } => series::exclude(data, pattern),
        Function::SortBy { rank, order } => series::sort_by_rank(data, *rank, *order),
    }
}

/// Runs the `Array to Scalar` pass and then every `Transform`, `Filter Series`
/// and `Sort` function in request order.
pub fn apply_functions(data: Vec<SingleData>, descriptors: &[FunctionDescriptor]) -> Vec<SingleData> {
    Pipeline::from_descriptors(descriptors).apply(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{Arrays, Scalars, Strings};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn times(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2021, 1, 10, 14, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::seconds(i as i64)).collect()
    }

    fn scalar_data(name: &str, values: &[f64]) -> SingleData {
        SingleData::new(
            name,
            Values::Scalars(Scalars::from_parts(
                times(values.len()),
                values.iter().map(|v| Some(*v)).collect(),
            )),
        )
    }

    fn array_data(name: &str, rows: Vec<Vec<f64>>) -> SingleData {
        let mut arrays = Arrays::default();
        for (row, t) in rows.into_iter().zip(times(10)) {
            arrays.append(row, t);
        }
        SingleData::new(name, Values::Arrays(arrays))
    }

    fn names(data: &[SingleData]) -> Vec<&str> {
        data.iter().map(|sd| sd.name.as_str()).collect()
    }

    fn scalar_values(sd: &SingleData) -> Vec<Option<f64>> {
        sd.values.as_scalars().unwrap().values.clone()
    }

    fn func(name: &str, category: FunctionCategory, params: &[(&str, &str, &str)]) -> FunctionDescriptor {
        FunctionDescriptor::new(name, category, params)
    }

    #[test]
    fn test_empty_function_list() {
        let data = vec![scalar_data("b", &[1.0]), scalar_data("a", &[2.0])];
        assert_eq!(apply_functions(data.clone(), &[]), data);
    }

    #[test]
    fn test_offset_then_scale() {
        let data = vec![scalar_data("PV", &[1.0, 1.0, 2.0, 3.0, 5.0, 8.0])];
        let functions = [
            func("offset", FunctionCategory::Transform, &[("delta", "float", "2")]),
            func("scale", FunctionCategory::Transform, &[("factor", "float", "3")]),
        ];
        let out = apply_functions(data, &functions);
        assert_eq!(
            scalar_values(&out[0]),
            vec![Some(9.0), Some(9.0), Some(12.0), Some(15.0), Some(21.0), Some(30.0)]
        );
    }

    #[test]
    fn test_top_by_average() {
        let data = vec![
            scalar_data("small", &[1.0, 3.0, 6.0]),
            scalar_data("large", &[20.0, 30.0, 40.0]),
        ];
        let functions = [func(
            "top",
            FunctionCategory::Filter,
            &[("number", "int", "1"), ("value", "string", "avg")],
        )];
        let out = apply_functions(data, &functions);
        assert_eq!(names(&out), vec!["large"]);
    }

    #[test]
    fn test_bottom_and_sort() {
        let data = vec![
            scalar_data("mid", &[5.0]),
            scalar_data("high", &[9.0]),
            scalar_data("low", &[-1.0]),
        ];
        let bottom = [func(
            "bottom",
            FunctionCategory::Filter,
            &[("number", "int", "2"), ("value", "string", "max")],
        )];
        assert_eq!(names(&apply_functions(data.clone(), &bottom)), vec!["low", "mid"]);

        let sort = [func("sortByAbsMax", FunctionCategory::Sort, &[("order", "string", "desc")])];
        assert_eq!(names(&apply_functions(data, &sort)), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_sort_is_stable_and_non_scalars_rank_zero() {
        let data = vec![
            scalar_data("a", &[0.0]),
            SingleData::new("strings", Values::Strings(Strings::default())),
            scalar_data("b", &[0.0]),
            scalar_data("neg", &[-1.0]),
        ];
        let sort = [func("sortByAvg", FunctionCategory::Sort, &[("order", "string", "asc")])];
        assert_eq!(
            names(&apply_functions(data, &sort)),
            vec!["neg", "a", "strings", "b"]
        );
    }

    #[test]
    fn test_exclude() {
        let data = vec![scalar_data("PV:A:1", &[1.0]), scalar_data("PV:B:1", &[1.0])];
        let functions = [func("exclude", FunctionCategory::Filter, &[("pattern", "string", ":A:")])];
        assert_eq!(names(&apply_functions(data, &functions)), vec!["PV:B:1"]);
    }

    #[test]
    fn test_unknown_and_malformed_functions_are_skipped() {
        let data = vec![scalar_data("PV", &[1.0, 2.0])];
        let functions = [
            func("integral", FunctionCategory::Transform, &[]),
            func("scale", FunctionCategory::Transform, &[("factor", "float", "abc")]),
            func("offset", FunctionCategory::Transform, &[("delta", "float", "1")]),
        ];
        let out = apply_functions(data, &functions);
        assert_eq!(scalar_values(&out[0]), vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_array_to_scalar() {
        let data = vec![
            array_data("WF", vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]),
            scalar_data("SCALAR", &[1.0]),
        ];
        let functions = [
            func("toScalarByAvg", FunctionCategory::ToScalar, &[]),
            func("toScalarByMax", FunctionCategory::ToScalar, &[]),
        ];
        let out = apply_functions(data, &functions);
        assert_eq!(names(&out), vec!["WF(avg)", "WF(max)"]);
        assert_eq!(scalar_values(&out[0]), vec![Some(2.0), Some(5.0)]);
        assert_eq!(scalar_values(&out[1]), vec![Some(3.0), Some(6.0)]);
        assert_eq!(out[0].pvname(), "WF");
    }

    #[test]
    fn test_array_functions_then_transform() {
        let data = vec![array_data("WF", vec![vec![1.0, 3.0]])];
        let functions = [
            func("scale", FunctionCategory::Transform, &[("factor", "float", "10")]),
            func("toScalarBySum", FunctionCategory::ToScalar, &[]),
        ];
        let out = apply_functions(data, &functions);
        assert_eq!(names(&out), vec!["WF(sum)"]);
        assert_eq!(scalar_values(&out[0]), vec![Some(40.0)]);
    }

    #[test]
    fn test_options_are_not_pipeline_steps() {
        let functions = [func("maxNumPVs", FunctionCategory::Options, &[("number", "int", "10")])];
        assert!(Pipeline::from_descriptors(&functions).is_empty());
    }
}
