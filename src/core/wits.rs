//! World Bank WITS (TRAINS) tariff queries.

use crate::utils::error::{Result, ServiceError};
use reqwest::Client;
use roxmltree::Document;
use serde_json::Value;
use std::collections::BTreeMap;

/// Partner code for "World", i.e. the MFN rate.
pub const WORLD: &str = "000";

/// Year -> partner codes with reported data for that year.
pub type Availability = BTreeMap<i32, Vec<String>>;

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Parses the `dataavailability` XML of one reporter.
pub fn parse_availability(xml: &str) -> Result<Availability> {
    let doc = Document::parse(xml.trim_start_matches('\u{feff}'))?;
    let reporters: Vec<_> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "reporter")
        .collect();

    if reporters.is_empty() {
        let snippet: String = xml.chars().take(500).collect();
        return Err(ServiceError::processing(format!(
            "No reporter elements found in WITS XML. Snippet: {}",
            snippet
        )));
    }

    let mut available = Availability::new();
    for reporter in reporters {
        let Some(year) = child_text(reporter, "year").and_then(|y| y.parse::<i32>().ok()) else {
            continue;
        };

        let mut partners: Vec<String> = child_text(reporter, "partnerlist")
            .map(|list| {
                list.split(';')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !partners.iter().any(|p| p == WORLD) {
            partners.push(WORLD.to_string());
        }
        available.insert(year, partners);
    }

    if available.is_empty() {
        return Err(ServiceError::processing(
            "No availability data found in WITS XML response",
        ));
    }
    Ok(available)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearChoice {
    pub year: i32,
    pub partner: String,
    pub notes: Vec<String>,
}

/// Newest year not after `target` that lists `partner`; failing that, the
/// newest such year for the World partner.
pub fn select_year(available: &Availability, partner: &str, target: i32) -> Option<YearChoice> {
    let mut notes = Vec::new();
    let mut years = available.range(..=target).rev();

    let (year, partner) = match years
        .clone()
        .find(|(_, partners)| partner == WORLD || partners.iter().any(|p| p == partner))
    {
        Some((year, _)) => (*year, partner.to_string()),
        None => {
            notes.push(format!("partner {}", WORLD));
            let (year, _) = years.next()?;
            (*year, WORLD.to_string())
        }
    };

    if year != target {
        notes.push(format!("year {}", year));
    }
    Some(YearChoice {
        year,
        partner,
        notes,
    })
}

/// Six, four and two digit prefixes of `hs_code`, without repeats.
pub fn hs_levels(hs_code: &str) -> Vec<String> {
    let mut levels: Vec<String> = Vec::with_capacity(3);
    for digits in [6, 4, 2] {
        let level: String = hs_code.chars().take(digits).collect();
        if !level.is_empty() && !levels.contains(&level) {
            levels.push(level);
        }
    }
    levels
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Found(f64),
    Missing,
    Invalid(String),
}

/// Reads `dataSets[0].series.<first>.observations["0"][0]` of an SDMX-JSON payload.
pub fn parse_sdmx_rate(data: &Value) -> Observation {
    let first = data
        .get("dataSets")
        .and_then(|sets| sets.get(0))
        .and_then(|set| set.get("series"))
        .and_then(Value::as_object)
        .and_then(|series| series.values().next())
        .and_then(|series| series.get("observations"))
        .and_then(|observations| observations.get("0"))
        .and_then(|observation| observation.get(0));

    match first {
        None | Some(Value::Null) => Observation::Missing,
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Observation::Found)
            .unwrap_or_else(|| Observation::Invalid(n.to_string())),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Observation::Found)
            .unwrap_or_else(|_| Observation::Invalid(s.clone())),
        Some(other) => Observation::Invalid(other.to_string()),
    }
}

pub fn tariff_url(base_url: &str, reporter: &str, partner: &str, hs: &str, year: i32) -> String {
    format!(
        "{}/SDMX/V21/datasource/TRN/reporter/{}/partner/{}/product/{}/year/{}/datatype/reported?format=JSON",
        base_url, reporter, partner, hs, year
    )
}

/// Rate found in WITS (if any) and how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct WitsOutcome {
    pub rate: Option<f64>,
    pub reason: String,
}

impl WitsOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            rate: None,
            reason: reason.into(),
        }
    }
}

struct Hit {
    rate: f64,
    hs: String,
    partner: String,
    url: String,
}

pub struct WitsClient {
    client: Client,
    base_url: String,
}

impl WitsClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn availability(&self, reporter: &str) -> Result<Availability> {
        let url = format!(
            "{}/wits/datasource/trn/dataavailability/country/{}/year/all",
            self.base_url, reporter
        );
        tracing::debug!("Fetching WITS availability: {}", url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::UpstreamStatusError {
                url,
                status: response.status().as_u16(),
            });
        }
        parse_availability(&response.text().await?)
    }

    async fn fetch_rate(&self, url: &str) -> Result<Option<Observation>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::debug!("WITS returned {} for {}", response.status(), url);
            return Ok(None);
        }
        let data: Value = response.json().await?;
        Ok(Some(parse_sdmx_rate(&data)))
    }

    /// Looks up the reported rate, falling back on year, partner and HS level.
    pub async fn request_tariff(
        &self,
        hs_code: &str,
        partner: &str,
        reporter: &str,
        target_year: i32,
    ) -> WitsOutcome {
        let available = match self.availability(reporter).await {
            Ok(available) => available,
            Err(ServiceError::ProcessingError { message }) => return WitsOutcome::failed(message),
            Err(ServiceError::XmlError(e)) => {
                return WitsOutcome::failed(format!("WITS XML parsing failed: {}", e))
            }
            Err(e) => return WitsOutcome::failed(format!("WITS availability check failed: {}", e)),
        };

        let Some(choice) = select_year(&available, partner, target_year) else {
            return WitsOutcome::failed("No available year found in WITS");
        };
        let mut notes = choice.notes;

        let partners: Vec<&str> = if choice.partner == WORLD {
            vec![WORLD]
        } else {
            vec![choice.partner.as_str(), WORLD]
        };
        let levels = hs_levels(hs_code);

        let mut hit: Option<Hit> = None;
        let mut last_url = String::new();

        'partners: for p in partners {
            for hs in &levels {
                let url = tariff_url(&self.base_url, reporter, p, hs, choice.year);
                last_url = url.clone();

                match self.fetch_rate(&url).await {
                    Ok(Some(Observation::Found(rate))) => {
                        hit = Some(Hit {
                            rate,
                            hs: hs.clone(),
                            partner: p.to_string(),
                            url,
                        });
                        if rate == 0.0 && p != WORLD {
                            notes.push(format!("zero WITS rate for HS {}, partner {}", hs, p));
                            continue 'partners;
                        }
                        break 'partners;
                    }
                    Ok(Some(Observation::Invalid(value))) => {
                        return WitsOutcome::failed(format!(
                            "Invalid WITS tariff rate format for HS {}, partner {}: {} at {}",
                            hs, p, value, url
                        ));
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("WITS query {} failed: {}", url, e),
                }
            }
        }

        let Some(hit) = hit else {
            return WitsOutcome::failed(format!(
                "No tariff data found in WITS after all fallbacks at {}",
                last_url
            ));
        };

        if hit.hs != hs_code {
            notes.push(format!("HS code {}", hit.hs));
        }
        if hit.partner != partner {
            notes.push(format!("partner {}", hit.partner));
        }
        let mut unique: Vec<String> = Vec::with_capacity(notes.len());
        for note in notes {
            if !unique.contains(&note) {
                unique.push(note);
            }
        }

        let reason = if unique.is_empty() {
            "WITS: No fallback needed".to_string()
        } else {
            format!("WITS: Fallback to {} at {}", unique.join(" and "), hit.url)
        };
        tracing::info!(
            "WITS rate {} for HS {} reporter {} partner {} year {}",
            hit.rate,
            hit.hs,
            reporter,
            hit.partner,
            choice.year
        );

        WitsOutcome {
            rate: Some(hit.rate),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AVAILABILITY: &str = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>
<wits:datasource xmlns:wits=\"http://wits.worldbank.org\">
  <wits:dataavailability>
    <wits:reporter countrycode=\"076\">
      <wits:year>2019</wits:year>
      <wits:partnerlist>368;840</wits:partnerlist>
    </wits:reporter>
    <wits:reporter countrycode=\"076\">
      <wits:year>2020</wits:year>
      <wits:partnerlist>840; 156</wits:partnerlist>
    </wits:reporter>
    <wits:reporter countrycode=\"076\">
      <wits:year>2023</wits:year>
      <wits:partnerlist>368</wits:partnerlist>
    </wits:reporter>
  </wits:dataavailability>
</wits:datasource>";

    #[test]
    fn test_parse_availability() {
        let available = parse_availability(AVAILABILITY).unwrap();
        assert_eq!(available.len(), 3);
        assert_eq!(available[&2019], vec!["368", "840", "000"]);
        assert_eq!(available[&2020], vec!["840", "156", "000"]);
    }

    #[test]
    fn test_parse_availability_without_reporters() {
        let err = parse_availability("<wits:datasource xmlns:wits=\"http://wits.worldbank.org\"/>")
            .unwrap_err();
        assert!(err.to_string().contains("No reporter elements found"));
    }

    #[test]
    fn test_select_year() {
        let available = parse_availability(AVAILABILITY).unwrap();

        let exact = select_year(&available, "368", 2023).unwrap();
        assert_eq!((exact.year, exact.partner.as_str()), (2023, "368"));
        assert!(exact.notes.is_empty());

        let older = select_year(&available, "368", 2021).unwrap();
        assert_eq!(older.year, 2019);
        assert_eq!(older.notes, vec!["year 2019"]);

        let world = select_year(&available, "999", 2021).unwrap();
        assert_eq!((world.year, world.partner.as_str()), (2020, WORLD));
        assert_eq!(world.notes, vec!["partner 000", "year 2020"]);

        assert!(select_year(&available, "368", 2010).is_none());
    }

    #[test]
    fn test_hs_levels() {
        assert_eq!(hs_levels("851830"), vec!["851830", "8518", "85"]);
        assert_eq!(hs_levels("85"), vec!["85"]);
    }

    #[test]
    fn test_parse_sdmx_rate() {
        let found = json!({"dataSets": [{"series": {"0:0:0": {"observations": {"0": [12.5, 0]}}}}]});
        assert_eq!(parse_sdmx_rate(&found), Observation::Found(12.5));

        let text = json!({"dataSets": [{"series": {"0:0:0": {"observations": {"0": ["7.2"]}}}}]});
        assert_eq!(parse_sdmx_rate(&text), Observation::Found(7.2));

        let invalid = json!({"dataSets": [{"series": {"0:0:0": {"observations": {"0": ["n/a"]}}}}]});
        assert_eq!(parse_sdmx_rate(&invalid), Observation::Invalid("n/a".to_string()));

        assert_eq!(parse_sdmx_rate(&json!({"dataSets": []})), Observation::Missing);
    }
}
