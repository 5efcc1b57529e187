use polars::prelude::*;

pub const COL_CODE: &str = "cod";
pub const COL_ASSET: &str = "asset";
pub const COL_TYPE: &str = "type";
pub const COL_PART: &str = "part";
pub const COL_QTY: &str = "theoricalQty";
pub const COL_DATE: &str = "data_referencia";

/// Columns that identify a row and may never be null.
pub const KEY_COLUMNS: [&str; 2] = [COL_CODE, COL_DATE];

/// Column layout of a `portfolio.parquet` partition.
pub struct WarehouseSchema;

impl WarehouseSchema {
    /// Column name and dtype, in file order.
    pub fn schema() -> Schema {
        Schema::from_iter([
            (COL_CODE, DataType::String),
            (COL_ASSET, DataType::String),
            (COL_TYPE, DataType::String),
            (COL_PART, DataType::Float64),
            (COL_QTY, DataType::Float64),
            (COL_DATE, DataType::Date),
        ]
        .into_iter()
        .map(|(name, dtype)| Field::new(name.into(), dtype)))
    }

    /// Every column present with its dtype, and no null keys.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        for field in Self::schema().iter_fields() {
            let column = df
                .column(field.name())
                .map_err(|_| SchemaError::MissingColumn(field.name().to_string()))?;
            if column.dtype() != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: column.dtype().clone(),
                });
            }
        }

        for key in KEY_COLUMNS {
            let nulls = df.column(key).map(|c| c.null_count()).unwrap_or(0);
            if nulls > 0 {
                return Err(SchemaError::NullKey {
                    column: key.to_string(),
                    count: nulls,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has type {actual:?}, expected {expected:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("key column '{column}' has {count} null values")]
    NullKey { column: String, count: usize },
}
