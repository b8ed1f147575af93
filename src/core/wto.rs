//! WTO timeseries API cross-check of WITS rates.

use crate::utils::error::{Result, ServiceError};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const SUBSCRIPTION_HEADER: &str = "Ocp-Apim-Subscription-Key";
const ERROR_EXCERPT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Indicator {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// First tariff-like indicator, unless one is an MFN average.
pub fn select_tariff_indicator(indicators: &[Indicator]) -> Option<&Indicator> {
    let tariff_like: Vec<&Indicator> = indicators
        .iter()
        .filter(|ind| !ind.code.is_empty())
        .filter(|ind| {
            let name = ind.name.to_lowercase();
            name.contains("tariff") || name.contains("duty") || name.contains("tax")
        })
        .collect();

    tariff_like
        .iter()
        .find(|ind| {
            let name = ind.name.to_lowercase();
            name.contains("mfn") && name.contains("average")
        })
        .or_else(|| tariff_like.first())
        .copied()
}

/// Query for `/data`, with partner and product dimensions when the
/// indicator name suggests it has them.
pub fn data_params(
    indicator: &Indicator,
    reporter: &str,
    partner: &str,
    hs_code: &str,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("i", indicator.code.clone()),
        ("r", non_empty_or(reporter, "all")),
        ("fmt", "json".to_string()),
        ("mode", "full".to_string()),
        ("dec", "default".to_string()),
        ("off", "0".to_string()),
        ("max", "500".to_string()),
        ("head", "H".to_string()),
        ("lang", "1".to_string()),
        ("meta", "false".to_string()),
    ];

    let name = indicator.name.to_lowercase();
    if name.contains("bilateral") || name.contains("partner") {
        params.push(("p", non_empty_or(partner, "default")));
        params.push(("ps", "default".to_string()));
    }
    if ["product", "sector", "hs", "harmonized"]
        .iter()
        .any(|word| name.contains(word))
    {
        params.push(("pc", non_empty_or(hs_code, "default")));
        params.push(("spc", "false".to_string()));
    }
    params
}

/// Minimal query used when the indicator rejects extra dimensions.
pub fn basic_params(indicator: &Indicator, reporter: &str) -> Vec<(&'static str, String)> {
    vec![
        ("i", indicator.code.clone()),
        ("r", non_empty_or(reporter, "all")),
        ("fmt", "json".to_string()),
        ("mode", "full".to_string()),
        ("lang", "1".to_string()),
    ]
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// First `Dataset[].Value`.
pub fn first_dataset_value(data: &Value) -> Result<Option<f64>> {
    let Some(items) = data.get("Dataset").and_then(Value::as_array) else {
        return Ok(None);
    };
    match items.iter().find_map(|item| item.get("Value")) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|e| {
            ServiceError::processing(format!("WTO value '{}' is not a number: {}", s, e))
        }),
        Some(other) => Err(ServiceError::processing(format!(
            "WTO value {} is not a number",
            other
        ))),
    }
}

fn is_dimension_error(body: &str) -> bool {
    body.contains("does not have a partner dimension")
        || body.contains("does not have a product/sector dimension")
}

fn excerpt(body: &str) -> String {
    body.chars().take(ERROR_EXCERPT).collect()
}

/// WTO rate, if one was read, and notes for the tariff reason.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WtoCheck {
    pub rate: Option<f64>,
    pub notes: Vec<String>,
}

impl WtoCheck {
    fn note(note: impl Into<String>) -> Self {
        Self {
            rate: None,
            notes: vec![note.into()],
        }
    }
}

pub struct WtoClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WtoClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let key = HeaderValue::from_str(&self.api_key).map_err(|e| {
            ServiceError::InvalidConfigValueError {
                field: "wto.api_key".to_string(),
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;
        headers.insert(SUBSCRIPTION_HEADER, key);
        Ok(headers)
    }

    fn url(&self, path: &str, params: &[(&'static str, String)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}{}", self.base_url, path), params).map_err(|e| {
            ServiceError::InvalidConfigValueError {
                field: "wto.base_url".to_string(),
                value: self.base_url.clone(),
                reason: e.to_string(),
            }
        })
    }

    async fn indicators(&self) -> std::result::Result<Vec<Indicator>, String> {
        let url = self
            .url(
                "/indicators",
                &[
                    ("i", "all".to_string()),
                    ("t", "all".to_string()),
                    ("pc", "all".to_string()),
                    ("tp", "all".to_string()),
                    ("frq", "all".to_string()),
                    ("lang", "1".to_string()),
                ],
            )
            .map_err(|e| format!("Error fetching indicators from WTO API: {}", e))?;
        let headers = self
            .headers()
            .map_err(|e| format!("Error fetching indicators from WTO API: {}", e))?;

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| format!("Error fetching indicators from WTO API: {}", e))?;
        if !response.status().is_success() {
            return Err(format!(
                "Failed to get indicators from WTO API: HTTP {}",
                response.status().as_u16()
            ));
        }
        response
            .json::<Vec<Indicator>>()
            .await
            .map_err(|e| format!("Error fetching indicators from WTO API: {}", e))
    }

    /// Reads the WTO rate for the same lookup and compares it with `wits_rate`.
    pub async fn cross_reference(
        &self,
        hs_code: &str,
        partner: &str,
        reporter: &str,
        wits_rate: f64,
    ) -> WtoCheck {
        let indicators = match self.indicators().await {
            Ok(indicators) => indicators,
            Err(note) => {
                tracing::warn!("{}", note);
                return WtoCheck::note(note);
            }
        };
        let Some(indicator) = select_tariff_indicator(&indicators) else {
            return WtoCheck::note("No suitable tariff indicator found in WTO API response");
        };
        tracing::debug!("Using WTO indicator {} ({})", indicator.code, indicator.name);

        match self
            .query(&data_params(indicator, reporter, partner, hs_code))
            .await
        {
            Ok((url, Ok(Some(rate)))) => {
                let found = format!(
                    "WTO: Rate {:?} for HS {}, partner {} at {}",
                    rate, hs_code, partner, url
                );
                let note = if rate != wits_rate {
                    format!("Discrepancy detected! {}", found)
                } else {
                    format!("WTO confirms rate: {}", found)
                };
                WtoCheck {
                    rate: Some(rate),
                    notes: vec![note],
                }
            }
            Ok((_, Ok(None))) => WtoCheck::default(),
            Ok((_, Err(e))) => WtoCheck::note(format!("Failed to parse WTO response: {}", e)),
            Err(QueryError::Status { body, .. }) if is_dimension_error(&body) => {
                tracing::info!("WTO indicator lacks requested dimensions; retrying with basic parameters");
                self.retry_basic(indicator, reporter).await
            }
            Err(QueryError::Status { body, status }) if body.is_empty() => {
                WtoCheck::note(format!("WTO API error: Status {}", status))
            }
            Err(QueryError::Status { body, .. }) => {
                WtoCheck::note(format!("WTO API error: {}", excerpt(&body)))
            }
            Err(QueryError::Failed(e)) => WtoCheck::note(format!("WTO API check failed: {}", e)),
        }
    }

    async fn retry_basic(&self, indicator: &Indicator, reporter: &str) -> WtoCheck {
        match self.query(&basic_params(indicator, reporter)).await {
            Ok((url, Ok(Some(rate)))) => WtoCheck {
                rate: Some(rate),
                notes: vec![format!(
                    "Used general tariff rate: WTO: General rate {:?} at {}",
                    rate, url
                )],
            },
            Ok((_, Ok(None))) => WtoCheck::default(),
            Ok((_, Err(e))) => {
                tracing::warn!("Error processing simplified WTO response: {}", e);
                WtoCheck::default()
            }
            Err(QueryError::Status { body, status }) => WtoCheck::note(if body.is_empty() {
                format!("WTO API error: Status {}", status)
            } else {
                format!("WTO API error: {}", excerpt(&body))
            }),
            Err(QueryError::Failed(e)) => WtoCheck::note(format!("WTO API check failed: {}", e)),
        }
    }

    async fn query(
        &self,
        params: &[(&'static str, String)],
    ) -> std::result::Result<(Url, Result<Option<f64>>), QueryError> {
        let url = self.url("/data", params).map_err(QueryError::Failed)?;
        tracing::debug!("Making WTO API request to: {}", url);

        let response = self
            .client
            .get(url.clone())
            .headers(self.headers().map_err(QueryError::Failed)?)
            .send()
            .await
            .map_err(|e| QueryError::Failed(e.into()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::Failed(e.into()))?;
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value = serde_json::from_str::<Value>(&body)
            .map_err(ServiceError::from)
            .and_then(|data| first_dataset_value(&data));
        Ok((url, value))
    }
}

enum QueryError {
    Status { status: u16, body: String },
    Failed(ServiceError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn indicator(code: &str, name: &str) -> Indicator {
        Indicator {
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_select_tariff_indicator_prefers_mfn_average() {
        let indicators = vec![
            indicator("ITS_MTV_AX", "Merchandise exports by product"),
            indicator("TP_E_0030", "Tariff lines with duty free"),
            indicator("TP_A_0010", "MFN - Simple average ad valorem duty"),
        ];
        assert_eq!(select_tariff_indicator(&indicators).unwrap().code, "TP_A_0010");

        let fallback = vec![indicator("X", "Exports"), indicator("TAX", "Export tax revenue")];
        assert_eq!(select_tariff_indicator(&fallback).unwrap().code, "TAX");

        assert!(select_tariff_indicator(&[indicator("X", "Exports")]).is_none());
    }

    #[test]
    fn test_data_params_dimensions() {
        let plain = data_params(&indicator("A", "MFN average duty"), "076", "368", "851830");
        assert!(!plain.iter().any(|(key, _)| *key == "p" || *key == "pc"));

        let bilateral = data_params(
            &indicator("B", "Bilateral applied duty by product"),
            "076",
            "368",
            "851830",
        );
        assert!(bilateral.contains(&("p", "368".to_string())));
        assert!(bilateral.contains(&("pc", "851830".to_string())));
        assert!(bilateral.contains(&("spc", "false".to_string())));
    }

    #[test]
    fn test_first_dataset_value() {
        assert_eq!(
            first_dataset_value(&json!({"Dataset": [{"Year": 2021}, {"Value": 11.4}]})).unwrap(),
            Some(11.4)
        );
        assert_eq!(first_dataset_value(&json!({"Dataset": []})).unwrap(), None);
        assert!(first_dataset_value(&json!({"Dataset": [{"Value": "abc"}]})).is_err());
    }

    #[tokio::test]
    async fn test_cross_reference_reports_discrepancy() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/indicators")
                .header("ocp-apim-subscription-key", "secret");
            then.status(200).json_body(json!([
                {"code": "TP_A_0010", "name": "MFN - Simple average ad valorem duty"}
            ]));
        });
        let data = server.mock(|when, then| {
            when.method(GET)
                .path("/data")
                .query_param("i", "TP_A_0010")
                .query_param("r", "076");
            then.status(200).json_body(json!({"Dataset": [{"Value": 12.0}]}));
        });

        let client = WtoClient::new(Client::new(), server.base_url(), "secret");
        let check = client.cross_reference("851830", "368", "076", 0.0).await;

        data.assert();
        assert_eq!(check.rate, Some(12.0));
        assert!(check.notes[0].starts_with("Discrepancy detected! WTO: Rate 12.0 for HS 851830"));
    }

    #[tokio::test]
    async fn test_cross_reference_retries_without_dimensions() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/indicators");
            then.status(200).json_body(json!([
                {"code": "TP_B_0090", "name": "Bilateral tariff by partner"}
            ]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/data").query_param("p", "368");
            then.status(400)
                .body("Indicator TP_B_0090 does not have a partner dimension");
        });
        let basic = server.mock(|when, then| {
            when.method(GET)
                .path("/data")
                .query_param("i", "TP_B_0090")
                .query_param("lang", "1");
            then.status(200).json_body(json!({"Dataset": [{"Value": "5.5"}]}));
        });

        let client = WtoClient::new(Client::new(), server.base_url(), "secret");
        let check = client.cross_reference("851830", "368", "076", 0.0).await;

        basic.assert();
        assert_eq!(check.rate, Some(5.5));
        assert!(check.notes[0].starts_with("Used general tariff rate"));
    }

    #[tokio::test]
    async fn test_cross_reference_indicator_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/indicators");
            then.status(401);
        });

        let client = WtoClient::new(Client::new(), server.base_url(), "bad");
        let check = client.cross_reference("851830", "368", "076", 3.0).await;

        assert_eq!(check.rate, None);
        assert_eq!(check.notes, vec!["Failed to get indicators from WTO API: HTTP 401"]);
    }
}
