use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rusty_archive_query::functions::{apply_functions, Pipeline};
use rusty_archive_query::query::model::FunctionDescriptor;
use rusty_archive_query::values::{Arrays, Scalars};
use rusty_archive_query::{SingleData, Values};
use serde_json::json;

fn descriptors(value: serde_json::Value) -> Vec<FunctionDescriptor> {
    serde_json::from_value(value).unwrap()
}

fn waveform(name: &str, rows: &[&[f64]]) -> SingleData {
    let start = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
    let mut arrays = Arrays::default();
    for (i, row) in rows.iter().enumerate() {
        arrays.append(row.to_vec(), start + Duration::seconds(i as i64));
    }
    SingleData::new(name, Values::Arrays(arrays))
}

fn scalar(name: &str, values: &[Option<f64>]) -> SingleData {
    let start = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
    SingleData::new(
        name,
        Values::Scalars(Scalars::from_parts(
            (0..values.len())
                .map(|i| start + Duration::seconds(i as i64))
                .collect(),
            values.to_vec(),
        )),
    )
}

fn names(data: &[SingleData]) -> Vec<&str> {
    data.iter().map(|sd| sd.name.as_str()).collect()
}

#[test]
fn test_reductions_are_grouped_by_function() {
    let data = vec![
        waveform("WF:A", &[&[1.0, 2.0, 9.0], &[]]),
        waveform("WF:B", &[&[4.0, 4.0]]),
    ];
    let functions = descriptors(json!([
        {"def": {"category": "Array to Scalar", "name": "toScalarByMed", "params": []}, "params": []},
        {"def": {"category": "Array to Scalar", "name": "toScalarByStd", "params": []}, "params": []}
    ]));

    let out = apply_functions(data, &functions);

    assert_eq!(
        names(&out),
        vec!["WF:A(median)", "WF:B(median)", "WF:A(std)", "WF:B(std)"]
    );
    assert_eq!(out[0].values.as_scalars().unwrap().values, vec![Some(2.0), None]);
    assert_eq!(out[3].values.as_scalars().unwrap().values, vec![Some(0.0)]);
}

#[test]
fn test_waveforms_reduced_then_sorted() {
    let data = vec![
        waveform("WF:LOW", &[&[1.0, 1.0], &[2.0, 2.0]]),
        waveform("WF:HIGH", &[&[10.0, 30.0]]),
        scalar("SCALAR", &[Some(100.0)]),
    ];
    let functions = descriptors(json!([
        {"def": {"category": "Array to Scalar", "name": "toScalarByMax", "params": []}, "params": []},
        {
            "def": {"category": "Sort", "name": "sortByMax", "params": [{"name": "order", "type": "string", "options": ["desc", "asc"]}]},
            "params": ["desc"]
        }
    ]));

    let out = apply_functions(data, &functions);

    assert_eq!(names(&out), vec!["WF:HIGH(max)", "WF:LOW(max)"]);
}

#[test]
fn test_transforms_keep_gaps() {
    let data = vec![scalar("PV", &[Some(1.0), None, Some(2.0), Some(4.0)])];
    let functions = descriptors(json!([
        {"def": {"category": "Transform", "name": "fluctuation", "params": []}, "params": []},
        {"def": {"category": "Transform", "name": "scale", "params": [{"name": "factor", "type": "float"}]}, "params": ["10"]}
    ]));

    let out = apply_functions(data, &functions);

    assert_eq!(
        out[0].values.as_scalars().unwrap().values,
        vec![Some(0.0), None, Some(10.0), Some(30.0)]
    );
}

#[test]
fn test_pipeline_is_resolved_once() {
    let functions = descriptors(json!([
        {"def": {"category": "Transform", "name": "offset", "params": [{"name": "delta", "type": "float"}]}, "params": ["1"]},
        {"def": {"category": "Filter Series", "name": "exclude", "params": [{"name": "pattern", "type": "string"}]}, "params": ["^DROP"]},
        {"def": {"category": "Options", "name": "binInterval", "params": [{"name": "interval", "type": "int"}]}, "params": ["10"]}
    ]));
    let pipeline = Pipeline::from_descriptors(&functions);

    for _ in 0..2 {
        let out = pipeline.apply(vec![
            scalar("KEEP", &[Some(1.0)]),
            scalar("DROP:ME", &[Some(1.0)]),
        ]);
        assert_eq!(names(&out), vec!["KEEP"]);
        assert_eq!(out[0].values.as_scalars().unwrap().values, vec![Some(2.0)]);
    }
}

#[test]
fn test_non_scalars_pass_through_transforms() {
    let data = vec![waveform("WF", &[&[1.0]])];
    let functions = descriptors(json!([
        {"def": {"category": "Transform", "name": "scale", "params": [{"name": "factor", "type": "float"}]}, "params": ["10"]}
    ]));

    let out = apply_functions(data.clone(), &functions);

    assert_eq!(out, data);
}
