use air_supply::core::wits::WitsClient;
use httpmock::prelude::*;
use reqwest::Client;

fn availability(entries: &[(i32, &str)]) -> String {
    let reporters: String = entries
        .iter()
        .map(|(year, partners)| {
            format!(
                "<wits:reporter countrycode=\"076\"><wits:year>{}</wits:year><wits:partnerlist>{}</wits:partnerlist></wits:reporter>",
                year, partners
            )
        })
        .collect();
    format!(
        "\u{feff}<wits:datasource xmlns:wits=\"http://wits.worldbank.org\"><wits:dataavailability>{}</wits:dataavailability></wits:datasource>",
        reporters
    )
}

fn sdmx(value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "dataSets": [{"series": {"0:0:0:0:0": {"observations": {"0": [value, 0, 0]}}}}]
    })
}

fn rate_path(partner: &str, hs: &str, year: i32) -> String {
    format!(
        "/SDMX/V21/datasource/TRN/reporter/076/partner/{}/product/{}/year/{}/datatype/reported",
        partner, hs, year
    )
}

fn mock_availability(server: &MockServer, entries: &[(i32, &str)]) {
    let body = availability(entries);
    server.mock(|when, then| {
        when.method(GET)
            .path("/wits/datasource/trn/dataavailability/country/076/year/all");
        then.status(200).body(body);
    });
}

fn mock_rate(server: &MockServer, partner: &str, hs: &str, year: i32, value: serde_json::Value) {
    let path = rate_path(partner, hs, year);
    server.mock(|when, then| {
        when.method(GET).path(path).query_param("format", "JSON");
        then.status(200).json_body(sdmx(value));
    });
}

#[tokio::test]
async fn test_direct_hit_needs_no_fallback() {
    let server = MockServer::start();
    mock_availability(&server, &[(2021, "368;840")]);
    mock_rate(&server, "368", "851830", 2021, serde_json::json!(12.5));

    let wits = WitsClient::new(Client::new(), server.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2021).await;

    assert_eq!(outcome.rate, Some(12.5));
    assert_eq!(outcome.reason, "WITS: No fallback needed");
}

#[tokio::test]
async fn test_falls_back_to_shorter_hs_code_and_older_year() {
    let server = MockServer::start();
    mock_availability(&server, &[(2019, "368"), (2024, "368")]);
    mock_rate(&server, "368", "8518", 2019, serde_json::json!("9.75"));

    let wits = WitsClient::new(Client::new(), server.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2022).await;

    assert_eq!(outcome.rate, Some(9.75));
    assert_eq!(
        outcome.reason,
        format!(
            "WITS: Fallback to year 2019 and HS code 8518 at {}?format=JSON",
            server.url(rate_path("368", "8518", 2019))
        )
    );
}

#[tokio::test]
async fn test_zero_bilateral_rate_tries_world_partner() {
    let server = MockServer::start();
    mock_availability(&server, &[(2021, "368")]);
    mock_rate(&server, "368", "851830", 2021, serde_json::json!(0.0));
    mock_rate(&server, "000", "851830", 2021, serde_json::json!(5.0));

    let wits = WitsClient::new(Client::new(), server.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2021).await;

    assert_eq!(outcome.rate, Some(5.0));
    assert!(outcome
        .reason
        .starts_with("WITS: Fallback to zero WITS rate for HS 851830, partner 368 and partner 000 at "));
    assert!(outcome.reason.ends_with(&format!(
        "{}?format=JSON",
        rate_path("000", "851830", 2021)
    )));
}

#[tokio::test]
async fn test_unlisted_partner_uses_world() {
    let server = MockServer::start();
    mock_availability(&server, &[(2021, "840")]);
    let bilateral = server.mock(|when, then| {
        when.method(GET).path(rate_path("368", "851830", 2021));
        then.status(200).json_body(sdmx(serde_json::json!(1.0)));
    });
    mock_rate(&server, "000", "851830", 2021, serde_json::json!(14.0));

    let wits = WitsClient::new(Client::new(), server.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2021).await;

    bilateral.assert_hits(0);
    assert_eq!(outcome.rate, Some(14.0));
    assert!(outcome.reason.starts_with("WITS: Fallback to partner 000 at "));
}

#[tokio::test]
async fn test_no_data_after_all_fallbacks() {
    let server = MockServer::start();
    mock_availability(&server, &[(2021, "368")]);

    let wits = WitsClient::new(Client::new(), server.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2021).await;

    assert_eq!(outcome.rate, None);
    assert_eq!(
        outcome.reason,
        format!(
            "No tariff data found in WITS after all fallbacks at {}?format=JSON",
            server.url(rate_path("000", "85", 2021))
        )
    );
}

#[tokio::test]
async fn test_invalid_rate_aborts() {
    let server = MockServer::start();
    mock_availability(&server, &[(2021, "368")]);
    mock_rate(&server, "368", "851830", 2021, serde_json::json!("n/a"));

    let wits = WitsClient::new(Client::new(), server.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2021).await;

    assert_eq!(outcome.rate, None);
    assert!(outcome
        .reason
        .starts_with("Invalid WITS tariff rate format for HS 851830, partner 368: n/a at "));
}

#[tokio::test]
async fn test_availability_failures() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/wits/datasource/trn/dataavailability/country/076/year/all");
        then.status(500);
    });

    let wits = WitsClient::new(Client::new(), server.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2021).await;
    assert_eq!(outcome.rate, None);
    assert!(outcome.reason.starts_with("WITS availability check failed"));

    let empty = MockServer::start();
    mock_availability(&empty, &[(2025, "368")]);
    let wits = WitsClient::new(Client::new(), empty.base_url());
    let outcome = wits.request_tariff("851830", "368", "076", 2021).await;
    assert_eq!(outcome.reason, "No available year found in WITS");
}
