//! Arrow schema inference and JSON/Arrow conversion
//!
//! Columns are the union of all record keys in first-seen order. Every
//! column is nullable; a record lacking a key gets a null in that column.

use crate::error::{Error, Result};
use crate::types::JsonObject;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, ListArray, NullArray,
    StringArray, StructArray,
};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{
    DataType, Field, Fields, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    Schema, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Infer an Arrow schema from a set of JSON records.
///
/// Types are widened across records (`Int64` + `Float64` -> `Float64`,
/// anything else conflicting -> `Utf8`) and then made storable in Parquet:
/// all-null columns, empty structs and lists of nulls become strings.
pub fn infer_schema(records: &[JsonObject]) -> Schema {
    let mut order: Vec<String> = Vec::new();
    let mut types: HashMap<String, DataType> = HashMap::new();

    for record in records {
        for (key, value) in record {
            let inferred = infer_type(value);
            match types.get_mut(key) {
                Some(existing) => *existing = merge_types(existing, &inferred),
                None => {
                    order.push(key.clone());
                    types.insert(key.clone(), inferred);
                }
            }
        }
    }

    let fields: Vec<Field> = order
        .into_iter()
        .map(|name| {
            let dtype = types.remove(&name).unwrap_or(DataType::Utf8);
            Field::new(name, storable_type(dtype), true)
        })
        .collect();

    Schema::new(fields)
}

/// Column names of a schema, in order
pub fn column_names(schema: &Schema) -> Vec<String> {
    schema.fields().iter().map(|f| f.name().clone()).collect()
}

/// Convert JSON records to an Arrow RecordBatch with the given schema
pub fn json_to_arrow(records: &[&JsonObject], schema: &Schema) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let values: Vec<Option<&Value>> = records
            .iter()
            .map(|record| record.get(field.name()).filter(|v| !v.is_null()))
            .collect();
        columns.push(build_array(&values, field.data_type())?);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(records.len()));
    RecordBatch::try_new_with_options(Arc::new(schema.clone()), columns, &options)
        .map_err(|e| Error::output(format!("Failed to create RecordBatch: {e}")))
}

/// Infer Arrow DataType from a JSON value
fn infer_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) => {
            if n.is_i64() {
                DataType::Int64
            } else {
                DataType::Float64
            }
        }
        Value::String(_) => DataType::Utf8,
        Value::Array(arr) => {
            let element_type = arr
                .iter()
                .filter(|v| !v.is_null())
                .map(infer_type)
                .reduce(|a, b| merge_types(&a, &b))
                .unwrap_or(DataType::Null);
            DataType::List(Arc::new(Field::new("item", element_type, true)))
        }
        Value::Object(obj) => {
            let fields: Vec<Field> = obj
                .iter()
                .map(|(k, v)| Field::new(k, infer_type(v), true))
                .collect();
            DataType::Struct(Fields::from(fields))
        }
    }
}

/// Merge two data types into a compatible type
fn merge_types(type1: &DataType, type2: &DataType) -> DataType {
    match (type1, type2) {
        (a, b) if a == b => a.clone(),

        (DataType::Null, other) | (other, DataType::Null) => other.clone(),

        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }

        (DataType::List(a), DataType::List(b)) => DataType::List(Arc::new(Field::new(
            "item",
            merge_types(a.data_type(), b.data_type()),
            true,
        ))),

        (DataType::Struct(a), DataType::Struct(b)) => DataType::Struct(merge_fields(a, b)),

        _ => DataType::Utf8,
    }
}

/// Union of two struct field lists by name, `a` order first
fn merge_fields(a: &Fields, b: &Fields) -> Fields {
    let mut merged: Vec<Field> = a
        .iter()
        .map(|field| {
            let dtype = match b.find(field.name()) {
                Some((_, other)) => merge_types(field.data_type(), other.data_type()),
                None => field.data_type().clone(),
            };
            Field::new(field.name(), dtype, true)
        })
        .collect();

    for field in b.iter() {
        if a.find(field.name()).is_none() {
            merged.push(Field::new(field.name(), field.data_type().clone(), true));
        }
    }

    Fields::from(merged)
}

/// Replace types Parquet cannot hold with ones it can
fn storable_type(dtype: DataType) -> DataType {
    match dtype {
        DataType::Null => DataType::Utf8,
        DataType::List(item) => DataType::List(Arc::new(Field::new(
            "item",
            storable_type(item.data_type().clone()),
            true,
        ))),
        DataType::Struct(fields) if fields.is_empty() => DataType::Utf8,
        DataType::Struct(fields) => DataType::Struct(
            fields
                .iter()
                .map(|f| Field::new(f.name(), storable_type(f.data_type().clone()), true))
                .collect::<Vec<_>>()
                .into(),
        ),
        other => other,
    }
}

/// Build an Arrow array from JSON values
fn build_array(values: &[Option<&Value>], data_type: &DataType) -> Result<ArrayRef> {
    match data_type {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),

        DataType::Boolean => {
            let arr: BooleanArray = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Float64 => {
            let arr: Float64Array = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Utf8 => {
            let arr: StringArray = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        _ => v.to_string(),
                    })
                })
                .collect();
            Ok(Arc::new(arr))
        }

        DataType::List(field) => build_list_array(values, field),

        DataType::Struct(fields) => build_struct_array(values, fields),

        other => Err(Error::output(format!(
            "Cannot build a column of type {other}"
        ))),
    }
}

/// Build a list array from JSON arrays; non-array values become null lists
fn build_list_array(values: &[Option<&Value>], field: &Arc<Field>) -> Result<ArrayRef> {
    let mut items: Vec<Option<&Value>> = Vec::new();
    let mut offsets: Vec<i32> = vec![0];
    let mut validity: Vec<bool> = Vec::with_capacity(values.len());

    for value in values {
        if let Some(Value::Array(arr)) = value {
            items.extend(arr.iter().map(|v| Some(v).filter(|v| !v.is_null())));
            validity.push(true);
        } else {
            validity.push(false);
        }
        let offset = i32::try_from(items.len())
            .map_err(|_| Error::output("Array too large for i32 offset"))?;
        offsets.push(offset);
    }

    let items_array = build_array(&items, field.data_type())?;
    let list = ListArray::try_new(
        Arc::clone(field),
        OffsetBuffer::new(offsets.into()),
        items_array,
        Some(validity.into()),
    )?;
    Ok(Arc::new(list))
}

/// Build a struct array from JSON objects; non-object values become null
fn build_struct_array(values: &[Option<&Value>], fields: &Fields) -> Result<ArrayRef> {
    let mut children: Vec<ArrayRef> = Vec::with_capacity(fields.len());

    for field in fields {
        let child_values: Vec<Option<&Value>> = values
            .iter()
            .map(|v| {
                v.and_then(|v| v.as_object())
                    .and_then(|obj| obj.get(field.name()))
                    .filter(|v| !v.is_null())
            })
            .collect();
        children.push(build_array(&child_values, field.data_type())?);
    }

    let validity: Vec<bool> = values
        .iter()
        .map(|v| matches!(v, Some(Value::Object(_))))
        .collect();
    let array = StructArray::try_new(fields.clone(), children, Some(validity.into()))?;
    Ok(Arc::new(array))
}

/// Convert an Arrow RecordBatch to JSON records, one per row
pub fn arrow_to_json(batch: &RecordBatch) -> Result<Vec<JsonObject>> {
    let schema = batch.schema();
    let mut records = Vec::with_capacity(batch.num_rows());

    for row in 0..batch.num_rows() {
        let mut record = JsonObject::new();
        for (col, field) in schema.fields().iter().enumerate() {
            let value = array_value_to_json(batch.column(col).as_ref(), row)?;
            record.insert(field.name().clone(), value);
        }
        records.push(record);
    }

    Ok(records)
}

/// Convert a single array element to JSON
fn array_value_to_json(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Int8 => Value::from(array.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => Value::from(array.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => Value::from(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::from(array.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => Value::from(array.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => Value::from(array.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => Value::from(array.as_primitive::<UInt64Type>().value(row)),
        DataType::Float32 => {
            float_to_json(f64::from(array.as_primitive::<Float32Type>().value(row)))
        }
        DataType::Float64 => float_to_json(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        DataType::List(_) => {
            let items = array.as_list::<i32>().value(row);
            let values = (0..items.len())
                .map(|i| array_value_to_json(items.as_ref(), i))
                .collect::<Result<Vec<_>>>()?;
            Value::Array(values)
        }
        DataType::Struct(_) => {
            let arr = array.as_struct();
            let mut obj = JsonObject::new();
            for (i, field) in arr.fields().iter().enumerate() {
                obj.insert(
                    field.name().clone(),
                    array_value_to_json(arr.column(i).as_ref(), row)?,
                );
            }
            Value::Object(obj)
        }
        other => {
            return Err(Error::output(format!(
                "Cannot convert column of type {other} to JSON"
            )))
        }
    };

    Ok(value)
}

fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}
