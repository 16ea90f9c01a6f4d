use arrow::array::{
    Array, BooleanArray, Date32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use serde_json::{Number, Value};

pub fn batches_to_json(batches: Vec<RecordBatch>) -> Result<Vec<Value>> {
    let mut json_rows = Vec::new();

    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let mut row = serde_json::Map::new();

            for (col_idx, field) in batch.schema().fields().iter().enumerate() {
                let column = batch.column(col_idx);
                let value = arrow_array_to_json(column, row_idx)?;
                row.insert(field.name().clone(), value);
            }

            json_rows.push(Value::Object(row));
        }
    }

    Ok(json_rows)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::Other(format!(
            "Failed to downcast {:?} array",
            array.data_type()
        ))
    })
}

pub fn arrow_array_to_json(array: &dyn Array, index: usize) -> Result<Value> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }

    Ok(match array.data_type() {
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(array)?.value(index)),
        DataType::Int32 => Value::Number(Number::from(downcast::<Int32Array>(array)?.value(index))),
        DataType::Int64 => Value::Number(Number::from(downcast::<Int64Array>(array)?.value(index))),
        DataType::Float64 => Number::from_f64(downcast::<Float64Array>(array)?.value(index))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        DataType::Utf8 => Value::String(downcast::<StringArray>(array)?.value(index).to_string()),
        DataType::LargeUtf8 => {
            Value::String(downcast::<LargeStringArray>(array)?.value(index).to_string())
        }
        DataType::Date32 => downcast::<Date32Array>(array)?
            .value_as_date(index)
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

/// Values of the named string column across all batches, in row order.
pub fn string_column(batches: &[RecordBatch], name: &str) -> Result<Vec<Option<String>>> {
    let mut values = Vec::new();
    for batch in batches {
        let idx = batch.schema().index_of(name)?;
        let array = downcast::<StringArray>(batch.column(idx).as_ref())?;
        values.extend((0..array.len()).map(|i| {
            if array.is_null(i) {
                None
            } else {
                Some(array.value(i).to_string())
            }
        }));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn converts_rows_to_objects() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("views", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(Int64Array::from(vec![None, Some(7)])),
            ],
        )
        .unwrap();

        assert_eq!(
            batches_to_json(vec![batch.clone()]).unwrap(),
            vec![
                json!({"name": "a", "views": null}),
                json!({"name": null, "views": 7}),
            ]
        );
        assert_eq!(
            string_column(&[batch], "name").unwrap(),
            vec![Some("a".to_string()), None]
        );
    }
}
