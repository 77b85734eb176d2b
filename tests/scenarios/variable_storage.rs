//! Test: block outputs are stored per format and read back by inference

use crate::helpers::*;
use blockline::persistence::DATAFRAME_ANALYSIS_KEYS;
use blockline::{DataFrame, VariableData, VariableType};
use serde_json::json;

fn sample_frame() -> DataFrame {
    DataFrame::from_records(&[
        json!({"id": 1, "city": "Lisbon", "score": 0.5}),
        json!({"id": 2, "city": "Porto", "score": null}),
        json!({"id": 3, "city": null, "score": 2}),
    ])
}

#[test]
fn test_dataframe_round_trip_by_inference() {
    let repo = TestRepo::new();
    let pipeline = etl_pipeline(&repo);
    let variables = repo.variables();

    variables
        .add_variable(&pipeline.uuid, "load_csv", "df", &VariableData::DataFrame(sample_frame()))
        .unwrap();

    let parquet = pipeline.variables_path().join("load_csv/df/data.parquet");
    assert!(parquet.is_file());

    let data = variables.get_variable(&pipeline.uuid, "load_csv", "df", None).unwrap();
    let df = data.as_dataframe().expect("inferred as dataframe");
    assert_eq!(df.num_rows(), 3);
    assert_eq!(df.column_names(), vec!["city", "id", "score"]);
    assert_eq!(df.column("city").unwrap()[1], json!("Porto"));
    assert_eq!(df.column("city").unwrap()[2], json!(null));
}

#[test]
fn test_mixed_column_is_coerced_to_first_type() {
    let repo = TestRepo::new();
    let pipeline = etl_pipeline(&repo);
    let variables = repo.variables();

    let df = DataFrame::from_records(&[json!({"code": 10}), json!({"code": "n/a"})]);
    variables
        .add_variable(&pipeline.uuid, "clean", "df", &df.into())
        .unwrap();

    let data = variables.get_variable(&pipeline.uuid, "clean", "df", None).unwrap();
    let code = data.as_dataframe().unwrap().column("code").unwrap().to_vec();
    assert_eq!(code, vec![json!("10"), json!("n/a")]);
}

#[test]
fn test_analysis_with_missing_sections() {
    let repo = TestRepo::new();
    let pipeline = etl_pipeline(&repo);
    let variables = repo.variables();

    let analysis = json!({
        "metadata": {"columns": ["id", "city"]},
        "statistics": {"count": 3},
    });
    variables
        .add_variable_with_type(
            &pipeline.uuid,
            "clean",
            "analysis",
            &analysis.into(),
            Some(VariableType::DataframeAnalysis),
        )
        .unwrap();

    let dir = pipeline.variables_path().join("clean/analysis");
    for key in DATAFRAME_ANALYSIS_KEYS {
        assert!(dir.join(format!("{}.json", key)).is_file(), "missing {}", key);
    }

    let data = variables
        .get_variable(&pipeline.uuid, "clean", "analysis", Some(VariableType::DataframeAnalysis))
        .unwrap();
    let value = data.as_json().unwrap();
    assert_eq!(value["metadata"], json!({"columns": ["id", "city"]}));
    assert_eq!(value["statistics"], json!({"count": 3}));
    assert_eq!(value["insights"], json!(null));
    assert_eq!(value["suggestions"], json!(null));
}

#[test]
fn test_generic_json_round_trip() {
    let repo = TestRepo::new();
    let pipeline = etl_pipeline(&repo);
    let variables = repo.variables();

    let value = json!({"rows_dropped": 4, "columns": ["a", "b"]});
    variables
        .add_variable(&pipeline.uuid, "clean", "summary", &value.clone().into())
        .unwrap();

    assert!(pipeline.variables_path().join("clean/summary.json").is_file());
    let data = variables.get_variable(&pipeline.uuid, "clean", "summary", None).unwrap();
    assert_eq!(data, VariableData::Json(value));
}

#[test]
fn test_missing_variable_reads_empty() {
    let repo = TestRepo::new();
    let pipeline = etl_pipeline(&repo);
    let variables = repo.variables();

    let data = variables.get_variable(&pipeline.uuid, "clean", "nothing", None).unwrap();
    assert_eq!(data, VariableData::Json(json!({})));

    let data = variables
        .get_variable(&pipeline.uuid, "clean", "nothing", Some(VariableType::Dataframe))
        .unwrap();
    assert!(data.as_dataframe().unwrap().is_empty());
}

#[test]
fn test_list_variables_of_block() {
    let repo = TestRepo::new();
    let pipeline = etl_pipeline(&repo);
    let variables = repo.variables();

    assert!(variables.get_variables_by_block(&pipeline.uuid, "clean").unwrap().is_empty());

    variables
        .add_variable(&pipeline.uuid, "clean", "summary", &json!([1, 2]).into())
        .unwrap();
    variables
        .add_variable(&pipeline.uuid, "clean", "df", &sample_frame().into())
        .unwrap();

    assert_eq!(
        variables.get_variables_by_block(&pipeline.uuid, "clean").unwrap(),
        vec!["df", "summary"]
    );
}
