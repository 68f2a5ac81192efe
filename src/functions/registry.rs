use regex::Regex;
use std::str::FromStr;

use crate::error::{ArchiverError, Result};
use crate::query::model::FunctionDescriptor;
use crate::values::RankType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = ArchiverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ArchiverError::invalid_request(
                format!("Order {} not recognized", s),
                "order".to_string(),
                vec![],
            )),
        }
    }
}

/// Reduction of one waveform row to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayReduction {
    Avg,
    Max,
    Min,
    Sum,
    Median,
    Std,
}

impl ArrayReduction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "toScalarByAvg" => Some(ArrayReduction::Avg),
            "toScalarByMax" => Some(ArrayReduction::Max),
            "toScalarByMin" => Some(ArrayReduction::Min),
            "toScalarBySum" => Some(ArrayReduction::Sum),
            "toScalarByMed" => Some(ArrayReduction::Median),
            "toScalarByStd" => Some(ArrayReduction::Std),
            _ => None,
        }
    }

    /// Suffix of the derived series name.
    pub fn suffix(&self) -> &'static str {
        match self {
            ArrayReduction::Avg => "avg",
            ArrayReduction::Max => "max",
            ArrayReduction::Min => "min",
            ArrayReduction::Sum => "sum",
            ArrayReduction::Median => "median",
            ArrayReduction::Std => "std",
        }
    }

    /// `None` for an empty row.
    pub fn apply(&self, row: &[f64]) -> Option<f64> {
        if row.is_empty() {
            return None;
        }
        let n = row.len() as f64;

        let v = match self {
            ArrayReduction::Avg => row.iter().sum::<f64>() / n,
            ArrayReduction::Max => row.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ArrayReduction::Min => row.iter().cloned().fold(f64::INFINITY, f64::min),
            ArrayReduction::Sum => row.iter().sum(),
            ArrayReduction::Median => {
                let mut sorted = row.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            // population standard deviation
            ArrayReduction::Std => {
                let mean = row.iter().sum::<f64>() / n;
                let variance = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                variance.sqrt()
            }
        };

        Some(v)
    }
}

/// A `Transform`, `Filter Series` or `Sort` step with typed arguments.
#[derive(Debug, Clone)]
pub enum Function {
    Scale { factor: f64 },
    Offset { delta: f64 },
    Delta,
    Fluctuation,
    MovingAverage { window_size: usize },
    Top { number: usize, rank: RankType },
    Bottom { number: usize, rank: RankType },
    Exclude { pattern: Regex },
    SortBy { rank: RankType, order: SortOrder },
}

fn invalid(descriptor: &FunctionDescriptor, reason: String) -> ArchiverError {
    ArchiverError::InvalidFunction {
        name: descriptor.name().to_string(),
        reason,
    }
}

fn count_param(descriptor: &FunctionDescriptor, param: &str) -> Result<usize> {
    let n = descriptor.extract_param_int(param)?;
    usize::try_from(n).map_err(|_| invalid(descriptor, format!("{} must not be negative, got {}", param, n)))
}

fn rank_param(descriptor: &FunctionDescriptor) -> Result<RankType> {
    descriptor.extract_param_string("value")?.parse()
}

fn order_param(descriptor: &FunctionDescriptor) -> Result<SortOrder> {
    descriptor.extract_param_string("order")?.parse()
}

impl Function {
    /// Looks up the operation by name and converts its arguments.
    pub fn resolve(descriptor: &FunctionDescriptor) -> Result<Self> {
        let sort_by = |rank: RankType| -> Result<Function> {
            Ok(Function::SortBy {
                rank,
                order: order_param(descriptor)?,
            })
        };

        match descriptor.name() {
            "scale" => Ok(Function::Scale {
                factor: descriptor.extract_param_float("factor")?,
            }),
            "offset" => Ok(Function::Offset {
                delta: descriptor.extract_param_float("delta")?,
            }),
            "delta" => Ok(Function::Delta),
            "fluctuation" => Ok(Function::Fluctuation),
            "movingAverage" => {
                let window_size = count_param(descriptor, "windowSize")?;
                if window_size == 0 {
                    return Err(invalid(descriptor, "windowSize must be at least 1".to_string()));
                }
                Ok(Function::MovingAverage { window_size })
            }
            "top" => Ok(Function::Top {
                number: count_param(descriptor, "number")?,
                rank: rank_param(descriptor)?,
            }),
            "bottom" => Ok(Function::Bottom {
                number: count_param(descriptor, "number")?,
                rank: rank_param(descriptor)?,
            }),
            "exclude" => {
                let pattern = descriptor.extract_param_string("pattern")?;
                let pattern = Regex::new(&pattern)
                    .map_err(|e| invalid(descriptor, format!("bad pattern: {}", e)))?;
                Ok(Function::Exclude { pattern })
            }
            "sortByAvg" => sort_by(RankType::Avg),
            "sortByMax" => sort_by(RankType::Max),
            "sortByMin" => sort_by(RankType::Min),
            "sortBySum" => sort_by(RankType::Sum),
            "sortByAbsMax" => sort_by(RankType::AbsoluteMax),
            "sortByAbsMin" => sort_by(RankType::AbsoluteMin),
            _ => Err(invalid(descriptor, "not a recognized function".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::model::FunctionCategory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_scale() {
        let f = FunctionDescriptor::new("scale", FunctionCategory::Transform, &[("factor", "float", "100")]);
        assert!(matches!(Function::resolve(&f).unwrap(), Function::Scale { factor } if factor == 100.0));
    }

    #[test]
    fn test_resolve_sort_by() {
        let f = FunctionDescriptor::new("sortByAbsMax", FunctionCategory::Sort, &[("order", "string", "desc")]);
        assert!(matches!(
            Function::resolve(&f).unwrap(),
            Function::SortBy {
                rank: RankType::AbsoluteMax,
                order: SortOrder::Desc
            }
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let unknown = FunctionDescriptor::new("integral", FunctionCategory::Transform, &[]);
        assert!(Function::resolve(&unknown).is_err());

        let bad_rank = FunctionDescriptor::new(
            "top",
            FunctionCategory::Filter,
            &[("number", "int", "1"), ("value", "string", "median")],
        );
        assert!(Function::resolve(&bad_rank).is_err());

        let bad_window = FunctionDescriptor::new(
            "movingAverage",
            FunctionCategory::Transform,
            &[("windowSize", "int", "0")],
        );
        assert!(Function::resolve(&bad_window).is_err());

        let bad_pattern = FunctionDescriptor::new("exclude", FunctionCategory::Filter, &[("pattern", "string", "(")]);
        assert!(Function::resolve(&bad_pattern).is_err());
    }

    #[test]
    fn test_array_reductions() {
        let row = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(ArrayReduction::Avg.apply(&row), Some(2.5));
        assert_eq!(ArrayReduction::Max.apply(&row), Some(4.0));
        assert_eq!(ArrayReduction::Min.apply(&row), Some(1.0));
        assert_eq!(ArrayReduction::Sum.apply(&row), Some(10.0));
        assert_eq!(ArrayReduction::Median.apply(&row), Some(2.5));
        assert_eq!(ArrayReduction::Median.apply(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(ArrayReduction::Std.apply(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
        assert_eq!(ArrayReduction::Avg.apply(&[]), None);
    }
}
