use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use chrono::{DateTime, Utc};
use common::{Error, Result, WriteError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Contents of `_table.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TableMetadata {
    pub database: String,
    pub table: String,
    pub format: String,
    pub columns: Vec<ColumnSpec>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl TableMetadata {
    pub fn new(database: &str, table: &str, schema: &Schema) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| ColumnSpec::from_field(field))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            database: database.to_string(),
            table: table.to_string(),
            format: "parquet".to_string(),
            columns,
            created_at: Utc::now(),
            properties: HashMap::new(),
        })
    }

    pub fn arrow_schema(&self) -> Result<SchemaRef> {
        let fields = self
            .columns
            .iter()
            .map(ColumnSpec::to_field)
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(Schema::new(fields)))
    }

    /// Rejects `incoming` unless it lines up column by column with the table.
    /// A non-nullable incoming column may feed a nullable table column.
    pub fn check_compatible(&self, incoming: &Schema) -> Result<()> {
        let table = format!("{}.{}", self.database, self.table);
        let mismatch = |detail: String| -> Error {
            WriteError::SchemaMismatch {
                table: table.clone(),
                detail,
            }
            .into()
        };

        if incoming.fields().len() != self.columns.len() {
            return Err(mismatch(format!(
                "expected {} columns, found {}",
                self.columns.len(),
                incoming.fields().len()
            )));
        }

        for (idx, (column, field)) in self.columns.iter().zip(incoming.fields()).enumerate() {
            if column.name != *field.name() {
                return Err(mismatch(format!(
                    "column {} is `{}`, found `{}`",
                    idx,
                    column.name,
                    field.name()
                )));
            }

            let data_type = type_name(field.data_type())?;
            if column.data_type != data_type {
                return Err(mismatch(format!(
                    "column `{}` has type {}, found {}",
                    column.name, column.data_type, data_type
                )));
            }

            if !column.nullable && field.is_nullable() {
                return Err(mismatch(format!(
                    "column `{}` is not nullable",
                    column.name
                )));
            }
        }

        Ok(())
    }
}

impl ColumnSpec {
    pub fn from_field(field: &Field) -> Result<Self> {
        Ok(Self {
            name: field.name().clone(),
            data_type: type_name(field.data_type())?.to_string(),
            nullable: field.is_nullable(),
        })
    }

    pub fn to_field(&self) -> Result<Field> {
        let data_type = match self.data_type.as_str() {
            "string" => DataType::Utf8,
            "large_string" => DataType::LargeUtf8,
            "boolean" => DataType::Boolean,
            "int" => DataType::Int32,
            "bigint" => DataType::Int64,
            "double" => DataType::Float64,
            "date" => DataType::Date32,
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unsupported column type '{}' for `{}`",
                    other, self.name
                )));
            }
        };
        Ok(Field::new(&self.name, data_type, self.nullable))
    }
}

fn type_name(data_type: &DataType) -> Result<&'static str> {
    Ok(match data_type {
        DataType::Utf8 => "string",
        DataType::LargeUtf8 => "large_string",
        DataType::Boolean => "boolean",
        DataType::Int32 => "int",
        DataType::Int64 => "bigint",
        DataType::Float64 => "double",
        DataType::Date32 => "date",
        other => {
            return Err(Error::InvalidInput(format!(
                "Column type {:?} is not supported by the table store",
                other
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema(fields: Vec<Field>) -> Schema {
        Schema::new(fields)
    }

    #[test]
    fn metadata_round_trips_schema() {
        let declared = schema(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("views", DataType::Int64, false),
        ]);
        let metadata = TableMetadata::new("db", "t", &declared).unwrap();

        assert_eq!(metadata.columns[0].data_type, "string");
        assert_eq!(metadata.columns[1].data_type, "bigint");
        assert_eq!(*metadata.arrow_schema().unwrap(), declared);

        let json = serde_json::to_string(&metadata).unwrap();
        let back: TableMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn compatible_schema_passes() {
        let table = schema(vec![Field::new("name", DataType::Utf8, true)]);
        let metadata = TableMetadata::new("db", "t", &table).unwrap();

        metadata.check_compatible(&table).unwrap();
        metadata
            .check_compatible(&schema(vec![Field::new("name", DataType::Utf8, false)]))
            .unwrap();
    }

    #[test]
    fn incompatible_schemas_are_rejected() {
        let table = schema(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("url", DataType::Utf8, true),
        ]);
        let metadata = TableMetadata::new("db", "t", &table).unwrap();

        let cases = [
            schema(vec![Field::new("name", DataType::Utf8, false)]),
            schema(vec![
                Field::new("name", DataType::Utf8, false),
                Field::new("link", DataType::Utf8, true),
            ]),
            schema(vec![
                Field::new("name", DataType::Utf8, false),
                Field::new("url", DataType::Int32, true),
            ]),
            schema(vec![
                Field::new("name", DataType::Utf8, true),
                Field::new("url", DataType::Utf8, true),
            ]),
        ];

        for incoming in cases {
            let err = metadata.check_compatible(&incoming).unwrap_err();
            assert!(
                matches!(err, Error::Write(WriteError::SchemaMismatch { .. })),
                "unexpected error {err}"
            );
        }
    }

    #[test]
    fn unsupported_types_are_refused() {
        let nested = schema(vec![Field::new(
            "tags",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            true,
        )]);
        assert!(TableMetadata::new("db", "t", &nested).is_err());
    }
}
