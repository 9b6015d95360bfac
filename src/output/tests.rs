//! Tests for output module

use super::*;
use crate::config::PartitionConfig;
use crate::error::Error;
use crate::types::{Compression, JsonObject, WriteMode};
use arrow::datatypes::DataType;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::tempdir;
use test_case::test_case;

fn records(values: Vec<Value>) -> Vec<JsonObject> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Object(obj) => obj,
            other => panic!("not an object: {other}"),
        })
        .collect()
}

fn ano_mes() -> Vec<String> {
    vec!["ano".to_string(), "mes".to_string()]
}

fn parquet_files(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path.strip_prefix(root).unwrap().display().to_string());
            }
        }
    }
    found.sort();
    found
}

// ============================================================================
// Schema Inference Tests
// ============================================================================

#[test]
fn test_infer_schema_empty() {
    let schema = infer_schema(&[]);
    assert!(schema.fields().is_empty());
}

#[test]
fn test_infer_schema_keeps_first_seen_order() {
    let schema = infer_schema(&records(vec![
        json!({"valor": 1.5, "ano": 2020}),
        json!({"ano": 2021, "orgao": "MEC", "mes": 2}),
    ]));
    assert_eq!(column_names(&schema), vec!["valor", "ano", "orgao", "mes"]);
}

#[test]
fn test_infer_schema_types() {
    let schema = infer_schema(&records(vec![json!({
        "name": "Alice",
        "age": 30,
        "score": 9.5,
        "active": true,
        "tags": ["a"],
        "address": {"city": "Recife"}
    })]));

    let dtype = |name: &str| schema.field_with_name(name).unwrap().data_type().clone();
    assert_eq!(dtype("name"), DataType::Utf8);
    assert_eq!(dtype("age"), DataType::Int64);
    assert_eq!(dtype("score"), DataType::Float64);
    assert_eq!(dtype("active"), DataType::Boolean);
    assert!(matches!(dtype("tags"), DataType::List(_)));
    assert!(matches!(dtype("address"), DataType::Struct(_)));
}

#[test]
fn test_infer_schema_widening() {
    let schema = infer_schema(&records(vec![
        json!({"n": 1, "mixed": 1, "late": null}),
        json!({"n": 2.5, "mixed": "x", "late": 7}),
    ]));
    let dtype = |name: &str| schema.field_with_name(name).unwrap().data_type().clone();
    assert_eq!(dtype("n"), DataType::Float64);
    assert_eq!(dtype("mixed"), DataType::Utf8);
    assert_eq!(dtype("late"), DataType::Int64);
}

#[test]
fn test_infer_schema_merges_nested_objects() {
    let schema = infer_schema(&records(vec![
        json!({"orgao": {"codigo": 1, "nome": null}, "itens": [{"id": 1}]}),
        json!({"orgao": {"nome": "MEC", "codigo": 2.5, "sigla": "ME"}, "itens": [{"qtd": 3}]}),
    ]));

    let DataType::Struct(orgao) = schema.field_with_name("orgao").unwrap().data_type().clone()
    else {
        panic!("orgao is not a struct");
    };
    let fields: Vec<(String, DataType)> = orgao
        .iter()
        .map(|f| (f.name().clone(), f.data_type().clone()))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("codigo".to_string(), DataType::Float64),
            ("nome".to_string(), DataType::Utf8),
            ("sigla".to_string(), DataType::Utf8),
        ]
    );

    match schema.field_with_name("itens").unwrap().data_type() {
        DataType::List(item) => match item.data_type() {
            DataType::Struct(fields) => assert_eq!(fields.len(), 2),
            other => panic!("expected struct items, got {other}"),
        },
        other => panic!("expected list, got {other}"),
    }
}

#[test]
fn test_infer_schema_unstorable_types_become_strings() {
    let schema = infer_schema(&records(vec![json!({
        "always_null": null,
        "empty_obj": {},
        "empty_list": []
    })]));
    let dtype = |name: &str| schema.field_with_name(name).unwrap().data_type().clone();
    assert_eq!(dtype("always_null"), DataType::Utf8);
    assert_eq!(dtype("empty_obj"), DataType::Utf8);
    match dtype("empty_list") {
        DataType::List(item) => assert_eq!(item.data_type(), &DataType::Utf8),
        other => panic!("expected list, got {other}"),
    }
}

// ============================================================================
// JSON <-> Arrow Tests
// ============================================================================

#[test]
fn test_json_to_arrow_missing_keys_are_null() {
    let rows = records(vec![json!({"a": 1, "b": "x"}), json!({"a": 2})]);
    let schema = infer_schema(&rows);
    let refs: Vec<&JsonObject> = rows.iter().collect();

    let batch = json_to_arrow(&refs, &schema).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.column(1).null_count(), 1);
}

#[test]
fn test_arrow_to_json_round_trip() {
    let rows = records(vec![
        json!({"id": 1, "name": "a", "v": 1.25, "ok": true, "tags": ["x", "y"], "meta": {"k": 1}}),
        json!({"id": 2, "name": null, "v": null, "ok": false, "tags": [], "meta": null}),
    ]);
    let schema = infer_schema(&rows);
    let refs: Vec<&JsonObject> = rows.iter().collect();

    let batch = json_to_arrow(&refs, &schema).unwrap();
    let back = arrow_to_json(&batch).unwrap();
    assert_eq!(back, rows);
}

#[test]
fn test_mixed_values_in_string_column_are_stringified() {
    let rows = records(vec![json!({"c": "x"}), json!({"c": 5}), json!({"c": {"k": 1}})]);
    let schema = infer_schema(&rows);
    let refs: Vec<&JsonObject> = rows.iter().collect();

    let back = arrow_to_json(&json_to_arrow(&refs, &schema).unwrap()).unwrap();
    assert_eq!(back[1]["c"], json!("5"));
    assert_eq!(back[2]["c"], json!(r#"{"k":1}"#));
}

// ============================================================================
// Parquet Writer Tests
// ============================================================================

#[test]
fn test_parquet_writer_config_default_is_gzip() {
    let config = ParquetWriterConfig::default();
    assert!(matches!(
        config.compression(),
        parquet::basic::Compression::GZIP(_)
    ));
    assert_eq!(config.row_group_size(), 1024 * 1024);
    assert_eq!(ParquetWriterConfig::new().with_row_group_size(0).row_group_size(), 1);
}

#[test_case(Compression::Gzip ; "gzip")]
#[test_case(Compression::Snappy ; "snappy")]
#[test_case(Compression::Zstd ; "zstd")]
#[test_case(Compression::Uncompressed ; "uncompressed")]
fn test_partition_config_compression_reaches_files(codec: Compression) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let config = PartitionConfig {
        compression: codec,
        ..PartitionConfig::default()
    };
    let rows = records(vec![json!({"ano": 2020, "mes": 1, "orgao": "MEC"})]);

    let summary = PartitionedWriter::from_config(&root, &config).write(&rows).unwrap();

    let file = std::fs::File::open(&summary.partitions[0].path).unwrap();
    let reader = parquet::file::serialized_reader::SerializedFileReader::new(file).unwrap();
    let metadata = parquet::file::reader::FileReader::metadata(&reader);
    let written = metadata.row_group(0).column(0).compression();
    let expected = ParquetWriterConfig::new().with_compression(codec).compression();
    assert_eq!(
        std::mem::discriminant(&written),
        std::mem::discriminant(&expected)
    );
    assert_eq!(read_dataset(&root, &ano_mes()).unwrap(), rows);
}

#[test]
fn test_write_batch_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.parquet");
    let rows = records(vec![json!({"a": 1}), json!({"a": 2})]);
    let refs: Vec<&JsonObject> = rows.iter().collect();
    let batch = json_to_arrow(&refs, &infer_schema(&rows)).unwrap();

    let written = write_batch_to_parquet(&path, &batch, &ParquetWriterConfig::new()).unwrap();

    assert_eq!(written, 2);
    assert_eq!(parquet_files(dir.path()), vec!["data.parquet"]);
    assert_eq!(read_parquet_file(&path).unwrap(), rows);
}

#[test]
fn test_parquet_writer_rows_written() {
    let dir = tempdir().unwrap();
    let rows = records(vec![json!({"a": 1})]);
    let refs: Vec<&JsonObject> = rows.iter().collect();
    let schema = infer_schema(&rows);
    let batch = json_to_arrow(&refs, &schema).unwrap();

    let mut writer = ParquetWriter::new(
        dir.path().join("x.parquet"),
        &schema,
        &ParquetWriterConfig::new().with_compression(Compression::Uncompressed),
    )
    .unwrap();
    writer.write(&batch).unwrap();
    writer.write(&batch).unwrap();
    assert_eq!(writer.rows_written(), 2);
    assert_eq!(writer.close().unwrap(), 2);
}

// ============================================================================
// Partition Coercion Tests
// ============================================================================

#[test_case(json!(2020), Some(2020); "integer")]
#[test_case(json!(3.0), Some(3); "integral float")]
#[test_case(json!(3.5), None; "fractional float")]
#[test_case(json!("3"), Some(3); "numeric string")]
#[test_case(json!(" 12 "), Some(12); "padded string")]
#[test_case(json!("2020.0"), Some(2020); "integral float string")]
#[test_case(json!("marco"), None; "word")]
#[test_case(json!(""), None; "empty string")]
#[test_case(json!(true), Some(1); "boolean")]
#[test_case(json!(null), None; "null")]
#[test_case(json!([1]), None; "array")]
#[test_case(json!(u64::MAX), None; "out of range")]
fn test_coerce_partition_value(value: Value, expected: Option<i64>) {
    assert_eq!(coerce_partition_value(&value), expected);
}

// ============================================================================
// Partitioned Writer Tests
// ============================================================================

#[test]
fn test_partitioned_write_drops_null_and_coerces() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![
        json!({"ano": 2020, "mes": 1}),
        json!({"ano": null, "mes": 2}),
        json!({"ano": 2021, "mes": "3"}),
    ]);

    let summary = PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();

    assert_eq!(summary.rows_in, 3);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.dropped_null, 1);
    assert_eq!(summary.dropped_uncoercible, 0);
    let keys: Vec<String> = summary.partitions.iter().map(|p| p.key.to_string()).collect();
    assert_eq!(keys, vec!["ano=2020/mes=1", "ano=2021/mes=3"]);
    assert_eq!(
        parquet_files(&root),
        vec![
            "ano=2020/mes=1/part-0.parquet",
            "ano=2021/mes=3/part-0.parquet"
        ]
    );
}

#[test]
fn test_partitioned_write_missing_column_writes_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    std::fs::create_dir_all(root.join("ano=1999/mes=1")).unwrap();
    std::fs::write(root.join("ano=1999/mes=1/part-0.parquet"), b"old").unwrap();

    let rows = records(vec![
        json!({"ano": 2020, "valor": 1.0}),
        json!({"ano": 2021, "orgao": "MEC"}),
    ]);
    let err = PartitionedWriter::new(&root, ano_mes())
        .write(&rows)
        .unwrap_err();

    match err {
        Error::MissingPartitionColumns {
            expected,
            available,
        } => {
            assert_eq!(expected, ano_mes());
            assert_eq!(available, vec!["ano", "valor", "orgao"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Destination untouched
    assert_eq!(parquet_files(&root), vec!["ano=1999/mes=1/part-0.parquet"]);
}

#[test]
fn test_partitioned_write_uncoercible_rows_are_dropped() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![
        json!({"ano": "dois mil", "mes": 1}),
        json!({"ano": 2020, "mes": 1.5}),
        json!({"ano": 2020, "mes": 1}),
    ]);

    let summary = PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();

    assert_eq!(summary.dropped_uncoercible, 2);
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.partitions.len(), 1);
}

#[test]
fn test_partitioned_write_no_surviving_rows_writes_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![json!({"ano": null, "mes": 1})]);

    let summary = PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();

    assert!(summary.partitions.is_empty());
    assert_eq!(summary.dropped_null, 1);
    assert!(!root.exists());
}

#[test]
fn test_partitioned_round_trip() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![
        json!({"ano": 2020, "mes": 1, "orgao": "MEC", "valor": 10.5, "pago": true}),
        json!({"ano": 2020, "mes": 2, "orgao": "MS", "valor": 3.25, "pago": false}),
        json!({"ano": 2020, "mes": 1, "orgao": null, "valor": 7.0, "pago": null}),
    ]);

    PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();
    let back = read_dataset(&root, &ano_mes()).unwrap();

    // Partitions come back ordered by key; order inside a partition is kept
    let expected = vec![rows[0].clone(), rows[2].clone(), rows[1].clone()];
    assert_eq!(back, expected);
}

#[test]
fn test_partitioned_round_trip_nested_objects_of_varying_shape() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![
        json!({"ano": 2020, "mes": 1, "orgao": {"codigo": 1, "nome": null},
               "itens": [{"id": 1, "desc": null}]}),
        json!({"ano": 2020, "mes": 1, "orgao": {"nome": "MEC", "codigo": 2},
               "itens": [{"desc": "papel", "id": 2}, {"id": 3, "desc": "caneta"}]}),
        json!({"ano": 2020, "mes": 1, "orgao": null, "itens": []}),
    ]);

    PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();
    let back = read_dataset(&root, &ano_mes()).unwrap();

    assert_eq!(back, rows);
    assert!(back[1]["orgao"].is_object());
    assert_eq!(back[1]["orgao"]["nome"], json!("MEC"));
}

#[test]
fn test_partition_columns_written_as_integers() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![json!({"ano": "2021", "mes": 3.0, "v": 1})]);

    PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();
    let back = read_dataset(&root, &ano_mes()).unwrap();

    assert_eq!(Value::Object(back[0].clone()), json!({"ano": 2021, "mes": 3, "v": 1}));
}

#[test]
fn test_rebuild_replaces_existing_dataset() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let writer = PartitionedWriter::new(&root, ano_mes());

    writer.write(&records(vec![json!({"ano": 2019, "mes": 12})])).unwrap();
    writer.write(&records(vec![json!({"ano": 2020, "mes": 1})])).unwrap();

    assert_eq!(parquet_files(&root), vec!["ano=2020/mes=1/part-0.parquet"]);
    assert_eq!(read_dataset(&root, &ano_mes()).unwrap().len(), 1);
}

#[test]
fn test_rebuild_leaves_non_partition_entries_intact() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("dataset");
    let writer = PartitionedWriter::new(&root, ano_mes());
    writer.write(&records(vec![json!({"ano": 2019, "mes": 12})])).unwrap();

    // raw documents and notes living next to the partition tree
    std::fs::create_dir_all(root.join("raw")).unwrap();
    std::fs::write(root.join("raw/gastos_pagina_1.json"), r#"{"results": []}"#).unwrap();
    std::fs::write(root.join("README"), "notes").unwrap();
    std::fs::create_dir_all(root.join("mes=5")).unwrap();

    writer.write(&records(vec![json!({"ano": 2020, "mes": 1})])).unwrap();

    assert_eq!(
        parquet_files(&root),
        vec![
            "README",
            "ano=2020/mes=1/part-0.parquet",
            "raw/gastos_pagina_1.json"
        ]
    );
    assert!(root.join("mes=5").is_dir());
    assert_eq!(
        std::fs::read_to_string(root.join("raw/gastos_pagina_1.json")).unwrap(),
        r#"{"results": []}"#
    );
}

#[test]
fn test_append_keeps_existing_files() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let writer = PartitionedWriter::new(&root, ano_mes()).with_mode(WriteMode::Append);

    writer.write(&records(vec![json!({"ano": 2020, "mes": 1, "v": 1})])).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    writer.write(&records(vec![json!({"ano": 2020, "mes": 1, "v": 2})])).unwrap();

    let files = parquet_files(&root);
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.starts_with("ano=2020/mes=1/part-")));

    let mut values: Vec<i64> = read_dataset(&root, &ano_mes())
        .unwrap()
        .iter()
        .map(|r| r["v"].as_i64().unwrap())
        .collect();
    values.sort_unstable();
    assert_eq!(values, vec![1, 2]);
}

// ============================================================================
// Dataset Reader Tests
// ============================================================================

#[test]
fn test_read_dataset_restores_columns_from_directories() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let partition = root.join("ano=2022").join("mes=7");
    std::fs::create_dir_all(&partition).unwrap();

    let rows = records(vec![json!({"v": "x"})]);
    let refs: Vec<&JsonObject> = rows.iter().collect();
    let batch = json_to_arrow(&refs, &infer_schema(&rows)).unwrap();
    write_batch_to_parquet(partition.join("part-0.parquet"), &batch, &ParquetWriterConfig::new())
        .unwrap();

    let back = read_dataset(root, &ano_mes()).unwrap();
    assert_eq!(Value::Object(back[0].clone()), json!({"v": "x", "ano": 2022, "mes": 7}));
}

#[test]
fn test_read_dataset_orders_partitions_numerically() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![
        json!({"ano": 2020, "mes": 10}),
        json!({"ano": 2020, "mes": 2}),
    ]);
    PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();

    let files = list_dataset_files(&root).unwrap();
    let labels: Vec<String> = files.iter().map(DatasetFile::partition_label).collect();
    assert_eq!(labels, vec!["ano=2020/mes=2", "ano=2020/mes=10"]);
}

#[test]
fn test_read_dataset_missing_root() {
    let dir = tempdir().unwrap();
    assert!(read_dataset(&dir.path().join("nope"), &ano_mes()).is_err());
}

#[test]
fn test_summarize_dataset() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("bronze");
    let rows = records(vec![
        json!({"ano": 2020, "mes": 1, "codigo_funcao": 1, "valor": 1.0}),
        json!({"ano": 2020, "mes": 1, "codigo_funcao": 2, "valor": null}),
        json!({"ano": 2021, "mes": 5, "codigo_funcao": 3, "valor": 2.0}),
    ]);
    PartitionedWriter::new(&root, ano_mes()).write(&rows).unwrap();

    let summary =
        summarize_dataset(&root, &ano_mes(), &["codigo_funcao".to_string()]).unwrap();

    assert_eq!(summary.rows, 3);
    assert_eq!(summary.files, 2);
    assert_eq!(
        summary.columns,
        vec![
            ColumnSummary { name: "ano".into(), nulls: 0 },
            ColumnSummary { name: "mes".into(), nulls: 0 },
            ColumnSummary { name: "valor".into(), nulls: 1 },
        ]
    );
    assert_eq!(
        summary.partitions,
        vec![
            PartitionCount { partition: "ano=2020/mes=1".into(), rows: 2 },
            PartitionCount { partition: "ano=2021/mes=5".into(), rows: 1 },
        ]
    );
}
