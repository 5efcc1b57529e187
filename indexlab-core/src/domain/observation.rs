//! One constituent of the index on one reference date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single (entity, date) row of index composition.
///
/// Serialized with the warehouse column names (`cod`, `asset`, `type`,
/// `part`, `theoricalQty`, `data_referencia`) so the same struct is used
/// for the Parquet warehouse, CSV import and the prediction API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "cod")]
    pub entity_code: String,
    #[serde(rename = "asset", default)]
    pub asset_name: String,
    #[serde(rename = "type", default)]
    pub asset_type: String,
    #[serde(rename = "data_referencia")]
    pub reference_date: NaiveDate,
    #[serde(rename = "theoricalQty", default)]
    pub theoretical_quantity: Option<f64>,
    #[serde(rename = "part", default)]
    pub part_weight: Option<f64>,
}

impl Observation {
    /// Value of the modelled series for this row.
    pub fn target(&self, column: TargetColumn) -> Option<f64> {
        let value = match column {
            TargetColumn::TheoreticalQuantity => self.theoretical_quantity,
            TargetColumn::PartWeight => self.part_weight,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Which observation column the model forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetColumn {
    #[default]
    TheoreticalQuantity,
    PartWeight,
}

impl TargetColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetColumn::TheoreticalQuantity => "theoretical_quantity",
            TargetColumn::PartWeight => "part_weight",
        }
    }
}

impl fmt::Display for TargetColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "theoretical_quantity" | "theoricalQty" => Ok(TargetColumn::TheoreticalQuantity),
            "part_weight" | "part" => Ok(TargetColumn::PartWeight),
            other => Err(format!(
                "unknown target column '{other}' (expected theoretical_quantity or part_weight)"
            )),
        }
    }
}

/// Sort rows by (entity, date), the order the feature builder expects.
pub fn sort_by_entity_date(observations: &mut [Observation]) {
    observations.sort_by(|a, b| {
        a.entity_code
            .cmp(&b.entity_code)
            .then_with(|| a.reference_date.cmp(&b.reference_date))
    });
}
