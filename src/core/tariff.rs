use crate::core::repo::{DataInput, VectorRepo};
use crate::core::sources::{CountryCodeSource, HsCodeSource};
use crate::core::wits::{WitsClient, WORLD};
use crate::core::wto::{WtoCheck, WtoClient};
use crate::domain::model::{
    CodeTable, Metadata, SearchHit, TariffReason, TariffRequest, TariffResponse,
};
use crate::utils::error::Result;
use std::sync::Arc;

pub const UNKNOWN_HS_CODE: &str = "000000";
pub const UNKNOWN_COUNTRY_CODE: &str = "000";

const ZERO_RATE_WARNING: &str = "Warning: Zero rate may indicate duty-free status (e.g., WTO ITA for electronics) or missing data; verify with WTO Tariff Download Facility (ttd.wto.org) or Transcustoms.com.";

/// Folds the WTO check into the WITS result and picks the final rate.
///
/// A non-zero WTO rate that differs from WITS wins.
pub fn reconcile(wits_rate: Option<f64>, reason: String, wto: Option<WtoCheck>) -> (Option<f64>, String) {
    let mut reason = reason;
    let wto = wto.unwrap_or_default();
    for note in &wto.notes {
        reason.push_str(". ");
        reason.push_str(note);
    }

    if wits_rate == Some(0.0) {
        reason.push_str(". ");
        reason.push_str(ZERO_RATE_WARNING);
    }

    let final_rate = match (wto.rate, wits_rate) {
        (Some(wto_rate), Some(wits)) if wto_rate != 0.0 && wto_rate != wits => Some(wto_rate),
        _ => wits_rate,
    };
    if final_rate != wits_rate {
        if let Some(rate) = final_rate {
            reason.push_str(&format!(". Using WTO rate {:?} due to non-zero value.", rate));
        }
    }
    (final_rate, reason)
}

pub struct TariffService {
    hs_codes: Arc<VectorRepo<HsCodeSource>>,
    countries: Arc<VectorRepo<CountryCodeSource>>,
    wits: WitsClient,
    wto: Option<WtoClient>,
}

impl TariffService {
    pub fn new(
        hs_codes: Arc<VectorRepo<HsCodeSource>>,
        countries: Arc<VectorRepo<CountryCodeSource>>,
        wits: WitsClient,
        wto: Option<WtoClient>,
    ) -> Self {
        Self {
            hs_codes,
            countries,
            wits,
            wto,
        }
    }

    pub async fn connect(&self) -> Result<()> {
        self.hs_codes.connect().await?;
        self.countries.connect().await
    }

    pub async fn close(&self) {
        self.hs_codes.close().await;
        self.countries.close().await;
    }

    pub async fn find_hs_code(&self, product: &str) -> Result<(String, Option<SearchHit>)> {
        let hit = self
            .hs_codes
            .find_items(product, 1, &Metadata::new())
            .await?
            .into_iter()
            .next();
        let code = hit
            .as_ref()
            .and_then(|hit| hit.metadata.get("productcode"))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_HS_CODE.to_string());
        Ok((code, hit))
    }

    pub async fn find_country_code(
        &self,
        name: &str,
        is_reporter: bool,
    ) -> Result<(String, Option<SearchHit>)> {
        let flag = if is_reporter { "isreporter" } else { "ispartner" };
        let filter: Metadata = [(flag.to_string(), "1".to_string())].into();
        let hit = self
            .countries
            .find_items(name, 1, &filter)
            .await?
            .into_iter()
            .next();
        let code = hit
            .as_ref()
            .and_then(|hit| hit.metadata.get("countrycode"))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_COUNTRY_CODE.to_string());
        Ok((code, hit))
    }

    /// WITS lookup plus the optional WTO cross-check.
    pub async fn request_tariff(
        &self,
        hs_code: &str,
        partner: &str,
        reporter: &str,
        year: i32,
    ) -> (Option<f64>, String) {
        let outcome = self.wits.request_tariff(hs_code, partner, reporter, year).await;

        let check = match (outcome.rate, &self.wto) {
            (Some(rate), Some(wto)) if rate == 0.0 || partner != WORLD => {
                Some(wto.cross_reference(hs_code, partner, reporter, rate).await)
            }
            _ => None,
        };
        reconcile(outcome.rate, outcome.reason, check)
    }

    pub async fn get_tariff(&self, request: &TariffRequest) -> Result<TariffResponse> {
        request.validate()?;

        let (hs_code, hs_code_ref) = self.find_hs_code(&request.product).await?;
        let (reporter_code, reporter_code_ref) =
            self.find_country_code(&request.reporter, true).await?;
        let (partner_code, partner_code_ref) =
            self.find_country_code(&request.partner, false).await?;
        tracing::info!(
            "Resolved '{}' -> HS {}, reporter '{}' -> {}, partner '{}' -> {}",
            request.product,
            hs_code,
            request.reporter,
            reporter_code,
            request.partner,
            partner_code
        );

        let (tariff, tariff_fallback) = self
            .request_tariff(&hs_code, &partner_code, &reporter_code, request.year)
            .await;

        Ok(TariffResponse {
            hs_code,
            reason: TariffReason {
                hs_code_ref,
                reporter_code_ref,
                partner_code_ref,
                tariff_fallback,
            },
            tariff,
        })
    }

    pub async fn refresh(&self, table: CodeTable, input: DataInput) -> Result<usize> {
        match table {
            CodeTable::HsCodes => self.hs_codes.refresh(input).await,
            CodeTable::CountryCodes => self.countries.refresh(input).await,
        }
    }

    pub async fn drop_table(&self, table: CodeTable) -> Result<()> {
        match table {
            CodeTable::HsCodes => self.hs_codes.drop_table().await,
            CodeTable::CountryCodes => self.countries.drop_table().await,
        }
    }
}
