use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::{validate_non_empty_string, validate_range};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat text metadata attached to a stored code entry.
pub type Metadata = BTreeMap<String, String>;

/// The two code tables kept in the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum CodeTable {
    HsCodes,
    CountryCodes,
}

impl CodeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HsCodes => "hs-codes",
            Self::CountryCodes => "country-codes",
        }
    }
}

impl std::fmt::Display for CodeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a code table (an HS product or a country).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: Metadata,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.data.get(column).map(String::as_str)
    }
}

/// Column description persisted in the system store, one per code-table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl MetadataColumn {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: "text".to_string(),
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub records: Vec<Record>,
    /// In first-seen order.
    pub columns: Vec<MetadataColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffRequest {
    pub product: String,
    pub partner: String,
    pub reporter: String,
    pub year: i32,
}

impl TariffRequest {
    /// WITS TRAINS data starts in 1988.
    pub const MIN_YEAR: i32 = 1988;
    pub const MAX_YEAR: i32 = 2100;

    pub fn validate(&self) -> Result<()> {
        validate_non_empty_string("product", &self.product)
            .and_then(|_| validate_non_empty_string("partner", &self.partner))
            .and_then(|_| validate_non_empty_string("reporter", &self.reporter))
            .and_then(|_| validate_range("year", self.year, Self::MIN_YEAR, Self::MAX_YEAR))
            .map_err(|e| ServiceError::ValidationError {
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffReason {
    pub hs_code_ref: Option<SearchHit>,
    pub reporter_code_ref: Option<SearchHit>,
    pub partner_code_ref: Option<SearchHit>,
    pub tariff_fallback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffResponse {
    pub hs_code: String,
    pub reason: TariffReason,
    pub tariff: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TariffRequest {
        TariffRequest {
            product: "wireless earbuds".to_string(),
            partner: "Iraq".to_string(),
            reporter: "Brazil".to_string(),
            year: 2021,
        }
    }

    #[test]
    fn test_tariff_request_validation() {
        assert!(request().validate().is_ok());

        let mut blank = request();
        blank.product = "   ".to_string();
        assert!(matches!(
            blank.validate(),
            Err(ServiceError::ValidationError { .. })
        ));

        let mut ancient = request();
        ancient.year = 1950;
        assert!(ancient.validate().is_err());
    }

    #[test]
    fn test_tariff_response_json_shape() {
        let response = TariffResponse {
            hs_code: "851830".to_string(),
            reason: TariffReason {
                hs_code_ref: None,
                reporter_code_ref: None,
                partner_code_ref: None,
                tariff_fallback: "WITS: No fallback needed".to_string(),
            },
            tariff: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["hs_code"], "851830");
        assert!(json["tariff"].is_null());
        assert!(json["reason"]["hs_code_ref"].is_null());
        assert_eq!(json["reason"]["tariff_fallback"], "WITS: No fallback needed");
    }

    #[test]
    fn test_code_table_path_names() {
        let table: CodeTable = serde_json::from_value(serde_json::json!("country-codes")).unwrap();
        assert_eq!(table, CodeTable::CountryCodes);
        assert_eq!(CodeTable::HsCodes.to_string(), "hs-codes");
    }

    #[test]
    fn test_metadata_column_serializes_like_stored_entry() {
        let json = serde_json::to_value(MetadataColumn::text("productcode")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "productcode", "data_type": "text", "nullable": true})
        );
    }
}
