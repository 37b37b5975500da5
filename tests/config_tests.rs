//! Integration tests for mapper configuration and entity metadata loading

use std::io::Write;
use tempfile::NamedTempFile;
use viewton::prelude::*;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_from_file() {
    let file = write_config(
        r#"
default_page_size: 25
sort_convention: minus_ascending
concurrent: true
"#,
    );

    let config = MapperConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.default_page_size, 25);
    assert_eq!(config.sort_convention, SortConvention::MinusAscending);
    assert_eq!(config.execution_mode(), ExecutionMode::Concurrent);
}

#[test]
fn test_missing_file_has_context() {
    let err = MapperConfig::from_yaml_file("/nonexistent/viewton.yaml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/viewton.yaml"));
}

#[test]
fn test_invalid_page_size_rejected() {
    let file = write_config("default_page_size: -7\n");
    let err = MapperConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap_err();
    let query_error = err.downcast_ref::<QueryError>().unwrap();
    assert_eq!(query_error.error_code(), "CONFIG_ERROR");
}

#[test]
fn test_config_drives_mapper() {
    let file = write_config("default_page_size: 10\nsort_convention: minus_ascending\n");
    let config = MapperConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
    let mapper = QueryMapper::builder().config(config).build().unwrap();

    let params: QueryParams = [("page", "4"), ("sorting", "-name,age")].into_iter().collect();
    let spec = mapper.assemble(&params).unwrap();
    assert_eq!(spec.page_size, 10);
    assert_eq!(spec.offset(), 30);
    assert_eq!(spec.sort[0].direction, SortDirection::Ascending);
    assert_eq!(spec.sort[1].direction, SortDirection::Descending);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = MapperConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, MapperConfig::default());
}

#[test]
fn test_entity_metadata_from_yaml() {
    let metadata = EntityMetadata::from_yaml_str(
        r#"
name: product
fields:
  - name: sku
    type: uuid
  - name: title
  - name: stock
    type: long
    avg_alias: avg_stock
  - name: avg_stock
    type: double
"#,
    )
    .unwrap();

    assert_eq!(metadata.field_names(), vec!["sku", "title", "stock", "avg_stock"]);
    assert_eq!(metadata.require("title").unwrap().field_type, FieldType::Text);
    assert_eq!(
        metadata.avg_aliases(&["stock".to_string(), "title".to_string()]),
        vec!["avg_stock", "title"]
    );
}

#[test]
fn test_entity_metadata_rejects_unknown_type() {
    let result = EntityMetadata::from_yaml_str("name: x\nfields:\n  - name: a\n    type: blob\n");
    assert!(result.is_err());
}
