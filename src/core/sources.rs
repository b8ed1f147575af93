use crate::domain::model::{MetadataColumn, Record, TransformResult};
use crate::utils::error::{Result, ServiceError};
use roxmltree::Document;

/// Where a code table comes from and how its payload is read.
pub trait CodeSource: Send + Sync {
    /// Used in logs and error messages.
    fn name(&self) -> &'static str;
    /// System-store key holding the table's column list.
    fn metadata_key(&self) -> &'static str;
    /// Path below the WITS API base URL.
    fn api_path(&self) -> &'static str;
    /// Column that gets embedded and searched.
    fn content_column(&self) -> &'static str;
    fn parse_response(&self, body: &str) -> Result<TransformResult>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HsCodeSource;

impl CodeSource for HsCodeSource {
    fn name(&self) -> &'static str {
        "HS codes"
    }

    fn metadata_key(&self) -> &'static str {
        "hs_code_metadata_columns"
    }

    fn api_path(&self) -> &'static str {
        "/wits/datasource/trn/product/all"
    }

    fn content_column(&self) -> &'static str {
        "productdescription"
    }

    fn parse_response(&self, body: &str) -> Result<TransformResult> {
        flatten_entities(body, "product")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CountryCodeSource;

impl CodeSource for CountryCodeSource {
    fn name(&self) -> &'static str {
        "country codes"
    }

    fn metadata_key(&self) -> &'static str {
        "country_code_metadata_columns"
    }

    fn api_path(&self) -> &'static str {
        "/wits/datasource/trn/country/ALL"
    }

    fn content_column(&self) -> &'static str {
        "name"
    }

    fn parse_response(&self, body: &str) -> Result<TransformResult> {
        flatten_entities(body, "country")
    }
}

#[derive(Default)]
struct ColumnSet {
    columns: Vec<MetadataColumn>,
}

impl ColumnSet {
    fn see(&mut self, name: &str) {
        if !self.columns.iter().any(|column| column.name == name) {
            self.columns.push(MetadataColumn::text(name));
        }
    }
}

/// Turns every `<entity>` element into a record.
///
/// Attributes and child elements are keyed by their local name, so
/// `<wits:country countrycode="076"><wits:iso3Code>BRA</wits:iso3Code>`
/// yields `countrycode = 076` and `iso3Code = BRA`.
pub fn flatten_entities(xml: &str, entity: &str) -> Result<TransformResult> {
    let doc = Document::parse(xml.trim_start_matches('\u{feff}'))?;
    let mut columns = ColumnSet::default();
    let mut records = Vec::new();

    for node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == entity)
    {
        let mut record = Record::default();

        for attribute in node.attributes() {
            columns.see(attribute.name());
            record
                .data
                .insert(attribute.name().to_string(), attribute.value().trim().to_string());
        }

        for child in node.children().filter(|n| n.is_element()) {
            let name = child.tag_name().name();
            columns.see(name);
            let text = child.text().map(str::trim).unwrap_or_default();
            record.data.insert(name.to_string(), text.to_string());
        }

        records.push(record);
    }

    Ok(TransformResult {
        records,
        columns: columns.columns,
    })
}

/// Reads a CSV export with a header row; every column is kept as text.
pub fn parse_csv(content: &str) -> Result<TransformResult> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ServiceError::processing("CSV file has no header row"));
    }

    let mut columns = ColumnSet::default();
    headers.iter().for_each(|header| columns.see(header));

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let data = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        records.push(Record { data });
    }

    Ok(TransformResult {
        records,
        columns: columns.columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTRY_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<wits:datasource xmlns:wits="http://wits.worldbank.org">
  <wits:countries>
    <wits:country countrycode="076" isreporter="1" ispartner="1" isgroup="No" grouptype="N/A">
      <wits:iso3Code>BRA</wits:iso3Code>
      <wits:name>Brazil</wits:name>
      <wits:notes />
    </wits:country>
    <wits:country countrycode="368" isreporter="0" ispartner="1" isgroup="No" grouptype="N/A">
      <wits:iso3Code>IRQ</wits:iso3Code>
      <wits:name>Iraq</wits:name>
      <wits:notes />
    </wits:country>
  </wits:countries>
</wits:datasource>"#;

    const PRODUCT_XML: &str = "\u{feff}<wits:datasource xmlns:wits=\"http://wits.worldbank.org\">
  <wits:products>
    <wits:product productcode=\"851830\" isgroup=\"No\" nomenclaturecode=\"HS\" grouptype=\"N/A\">
      <wits:productdescription>  - Headphones and earphones, whether or not combined with a microphone</wits:productdescription>
    </wits:product>
  </wits:products>
</wits:datasource>";

    #[test]
    fn test_flatten_country_xml() {
        let result = CountryCodeSource.parse_response(COUNTRY_XML).unwrap();

        assert_eq!(result.records.len(), 2);
        let brazil = &result.records[0];
        assert_eq!(brazil.get("countrycode"), Some("076"));
        assert_eq!(brazil.get("iso3Code"), Some("BRA"));
        assert_eq!(brazil.get("name"), Some("Brazil"));
        assert_eq!(brazil.get("notes"), Some(""));
        assert_eq!(result.records[1].get("isreporter"), Some("0"));

        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["countrycode", "isreporter", "ispartner", "isgroup", "grouptype", "iso3Code", "name", "notes"]
        );
    }

    #[test]
    fn test_flatten_product_xml_with_bom() {
        let result = HsCodeSource.parse_response(PRODUCT_XML).unwrap();

        assert_eq!(result.records.len(), 1);
        let product = &result.records[0];
        assert_eq!(product.get("productcode"), Some("851830"));
        assert_eq!(product.get("nomenclaturecode"), Some("HS"));
        assert!(product
            .get("productdescription")
            .unwrap()
            .starts_with("- Headphones and earphones"));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = HsCodeSource.parse_response("<wits:datasource>");
        assert!(matches!(result, Err(ServiceError::XmlError(_))));
    }

    #[test]
    fn test_parse_csv() {
        let csv = "productcode,productdescription,isgroup\n851830, Headphones and earphones ,No\n010121,Horses,No\n";
        let result = parse_csv(csv).unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].get("productdescription"), Some("Headphones and earphones"));
        assert_eq!(result.records[1].get("productcode"), Some("010121"));
        assert_eq!(result.columns.len(), 3);
    }
}
