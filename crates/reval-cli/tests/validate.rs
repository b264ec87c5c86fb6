use std::path::{Path, PathBuf};

use reval_cli::load_document;
use reval_cli::validate::{run_validate, validate, ValidateArgs};
use reval_model::Status;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn args(schema: PathBuf, data: PathBuf) -> ValidateArgs {
    ValidateArgs {
        schema,
        data,
        path: "/".into(),
        config: None,
        coerce_types: false,
        remove_additional: false,
        only_dirty: false,
        json: false,
    }
}

const SCHEMA_YAML: &str = r#"
properties:
  name:
    type: string
    filter: trim
    maxLength: 5
  age:
    type: integer
    minimum: 0
required: [name]
"#;

#[test]
fn loads_yaml_and_json_by_extension() {
    let dir = TempDir::new().unwrap();
    let yaml = write(dir.path(), "doc.yml", "a: [1, 2]\n");
    let json_file = write(dir.path(), "doc.json", r#"{"a": [1, 2]}"#);
    let from_yaml: Value = load_document(&yaml).unwrap();
    let from_json: Value = load_document(&json_file).unwrap();
    assert_eq!(from_yaml, json!({"a": [1, 2]}));
    assert_eq!(from_yaml, from_json);

    let broken = write(dir.path(), "broken.json", "{");
    let err = load_document::<Value>(&broken).unwrap_err();
    assert!(format!("{err:#}").contains("invalid JSON"));
}

#[tokio::test]
async fn valid_document_reports_every_path() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yaml", SCHEMA_YAML);
    let data = write(dir.path(), "data.json", r#"{"name": " ada ", "age": 36}"#);

    let report = validate(&args(schema.clone(), data.clone())).await.unwrap();
    assert!(report.valid);
    assert!(report.first_error.is_none());
    let paths: Vec<&str> = report.states.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["/", "/age", "/name"]);
    assert_eq!(report.value, Some(json!({"name": "ada", "age": 36})));
    assert!(report.to_string().ends_with("OK: /\n"));

    assert_eq!(run_validate(&args(schema, data)).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_document_names_first_error() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yaml", SCHEMA_YAML);
    let data = write(dir.path(), "data.json", r#"{"name": "grace hopper", "age": -1}"#);

    let report = validate(&args(schema.clone(), data.clone())).await.unwrap();
    assert!(!report.valid);
    let first = report.first_error.as_ref().unwrap();
    assert_eq!(first.path, "/name");
    assert_eq!(first.state.status, Status::Error);
    assert!(report
        .to_string()
        .contains("FAIL: / (first error at /name: must be at most 5 characters long)"));

    let mut json_args = args(schema, data);
    json_args.json = true;
    assert_eq!(run_validate(&json_args).await.unwrap(), 1);
}

#[tokio::test]
async fn config_and_flags_shape_the_run() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yaml", SCHEMA_YAML);
    let data = write(dir.path(), "data.json", r#"{"name": "ada", "age": "36"}"#);
    let config = write(
        dir.path(),
        "config.yaml",
        "errors:\n  type: wrong kind of value\n",
    );

    let mut with_config = args(schema.clone(), data.clone());
    with_config.config = Some(config);
    with_config.path = "/age".into();
    let report = validate(&with_config).await.unwrap();
    assert!(!report.valid);
    assert_eq!(
        report.first_error.unwrap().state.message.as_deref(),
        Some("wrong kind of value")
    );

    let mut coerced = args(schema, data);
    coerced.coerce_types = true;
    let report = validate(&coerced).await.unwrap();
    assert!(report.valid);
    assert_eq!(report.value, Some(json!({"name": "ada", "age": 36})));
}

#[tokio::test]
async fn schema_that_does_not_compile_is_an_operational_error() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.json", r#"{"maxLenght": 3}"#);
    let data = write(dir.path(), "data.json", "\"x\"");
    let err = run_validate(&args(schema, data)).await.unwrap_err();
    assert!(format!("{err:#}").contains("unknown keyword 'maxLenght'"));
}
