//! B3 index portfolio provider.
//!
//! Fetches the day's theoretical portfolio of an index (IBOV by default) from
//! the exchange's `GetPortfolioDay` endpoint. The query is a base64-encoded
//! JSON document appended to the URL path. Results are paginated; every page
//! is fetched. Numbers arrive as pt-BR formatted strings.
//!
//! There is no retry logic: a failed request fails the whole fetch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::ingest::parse_pt_br;
use super::provider::{DataError, DataSource, FetchResult, PortfolioProvider};
use crate::domain::Observation;

pub const DEFAULT_B3_URL: &str =
    "https://sistemaswebb3-listados.b3.com.br/indexProxy/indexCall/GetPortfolioDay";

/// Connection settings for the B3 portfolio endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct B3Config {
    pub base_url: String,
    pub index: String,
    pub language: String,
    pub segment: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for B3Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_B3_URL.to_string(),
            index: "IBOV".to_string(),
            language: "pt-br".to_string(),
            segment: "1".to_string(),
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Query document, serialized then base64-encoded into the URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PortfolioQuery<'a> {
    language: &'a str,
    page_number: u32,
    page_size: u32,
    index: &'a str,
    segment: &'a str,
}

#[derive(Debug, Deserialize)]
struct PortfolioResponse {
    page: Option<PageInfo>,
    header: Option<PortfolioHeader>,
    #[serde(default)]
    results: Vec<PortfolioEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PortfolioHeader {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PortfolioEntry {
    #[serde(alias = "code")]
    cod: Option<String>,
    asset: Option<String>,
    #[serde(rename = "type")]
    asset_type: Option<String>,
    part: Option<NumericField>,
    #[serde(rename = "theoricalQty", alias = "theoreticalQty")]
    theoretical_qty: Option<NumericField>,
}

/// The endpoint has shipped both JSON numbers and formatted strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    fn value(&self) -> Option<f64> {
        match self {
            NumericField::Number(v) => Some(*v).filter(|v| v.is_finite()),
            NumericField::Text(s) => parse_pt_br(s),
        }
    }
}

/// One decoded page.
#[derive(Debug)]
struct ParsedPage {
    reference_date: NaiveDate,
    total_pages: u32,
    observations: Vec<Observation>,
}

/// B3 portfolio provider.
pub struct B3Provider {
    client: reqwest::blocking::Client,
    config: B3Config,
}

impl B3Provider {
    pub fn new(config: B3Config) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) indexlab/0.1")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &B3Config {
        &self.config
    }

    /// Build the request URL for one page.
    fn page_url(&self, index: &str, page_number: u32) -> Result<String, DataError> {
        let query = PortfolioQuery {
            language: &self.config.language,
            page_number,
            page_size: self.config.page_size,
            index,
            segment: &self.config.segment,
        };
        let json = serde_json::to_string(&query)
            .map_err(|e| DataError::Other(format!("query serialization: {e}")))?;
        let token = STANDARD.encode(json.as_bytes());
        Ok(format!(
            "{}/{token}",
            self.config.base_url.trim_end_matches('/')
        ))
    }

    fn fetch_page(&self, index: &str, page_number: u32) -> Result<ParsedPage, DataError> {
        let url = self.page_url(index, page_number)?;
        debug!(index, page_number, "requesting portfolio page");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::UpstreamStatus {
                status: status.as_u16(),
                context: format!("{index} page {page_number}"),
            });
        }

        let body = resp.text().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to read body for {index}: {e}"))
        })?;

        parse_page(&body)
    }
}

impl PortfolioProvider for B3Provider {
    fn name(&self) -> &str {
        "b3_portfolio"
    }

    fn fetch_portfolio(&self, index: &str) -> Result<FetchResult, DataError> {
        let first = self.fetch_page(index, 1)?;
        let reference_date = first.reference_date;
        let total_pages = first.total_pages.max(1);
        let mut observations = first.observations;

        for page_number in 2..=total_pages {
            let page = self.fetch_page(index, page_number)?;
            if page.reference_date != reference_date {
                return Err(DataError::ResponseFormatChanged(format!(
                    "page {page_number} is dated {} but page 1 is dated {reference_date}",
                    page.reference_date
                )));
            }
            observations.extend(page.observations);
        }

        if observations.is_empty() {
            return Err(DataError::NoData(format!(
                "{index} portfolio for {reference_date} has no constituents"
            )));
        }

        info!(
            index,
            %reference_date,
            pages = total_pages,
            rows = observations.len(),
            "fetched index portfolio"
        );

        Ok(FetchResult {
            index: index.to_string(),
            reference_date,
            observations,
            source: DataSource::B3Portfolio,
        })
    }
}

/// Decode one page of the portfolio response.
fn parse_page(body: &str) -> Result<ParsedPage, DataError> {
    let resp: PortfolioResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("invalid portfolio JSON: {e}")))?;

    let raw_date = resp
        .header
        .and_then(|h| h.date)
        .ok_or_else(|| DataError::ResponseFormatChanged("missing header.date".into()))?;
    let reference_date = parse_header_date(&raw_date)?;

    let total_pages = resp.page.and_then(|p| p.total_pages).unwrap_or(1);

    let observations = resp
        .results
        .into_iter()
        .filter_map(|entry| {
            let code = entry.cod?;
            Some(Observation {
                entity_code: code,
                asset_name: entry.asset.unwrap_or_default(),
                asset_type: entry.asset_type.unwrap_or_default(),
                reference_date,
                theoretical_quantity: entry.theoretical_qty.as_ref().and_then(NumericField::value),
                part_weight: entry.part.as_ref().and_then(NumericField::value),
            })
        })
        .collect();

    Ok(ParsedPage {
        reference_date,
        total_pages,
        observations,
    })
}

/// Parse the header date, day first: `17/10/25` or `17/10/2025`.
pub fn parse_header_date(raw: &str) -> Result<NaiveDate, DataError> {
    let raw = raw.trim();
    let year_len = raw.rsplit('/').next().map(str::len).unwrap_or(0);
    let format = if year_len == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(raw, format)
        .map_err(|e| DataError::ResponseFormatChanged(format!("bad header date '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_ONE: &str = r#"{
        "page": {"pageNumber": 1, "pageSize": 2, "totalRecords": 3, "totalPages": 2},
        "header": {"date": "17/10/25", "text": "Quantidade Teórica Total", "part": "100,000"},
        "results": [
            {"segment": null, "cod": "ALOS3", "asset": "ALLOS", "type": "ON  NM",
             "part": "0,456", "partAcum": null, "theoricalQty": "476.976.044"},
            {"segment": null, "code": "ABEV3", "asset": "AMBEV S/A", "type": "ON",
             "part": 2.5, "theoreticalQty": 4394492490}
        ]
    }"#;

    #[test]
    fn parses_pt_br_page() {
        let page = parse_page(PAGE_ONE).unwrap();
        assert_eq!(page.reference_date, NaiveDate::from_ymd_opt(2025, 10, 17).unwrap());
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.observations.len(), 2);

        let alos = &page.observations[0];
        assert_eq!(alos.entity_code, "ALOS3");
        assert_eq!(alos.part_weight, Some(0.456));
        assert_eq!(alos.theoretical_quantity, Some(476_976_044.0));

        let abev = &page.observations[1];
        assert_eq!(abev.entity_code, "ABEV3");
        assert_eq!(abev.part_weight, Some(2.5));
        assert_eq!(abev.theoretical_quantity, Some(4_394_492_490.0));
    }

    #[test]
    fn single_dot_quantity_is_thousands() {
        let body = r#"{"header": {"date": "02/01/2024"},
                       "results": [{"cod": "X", "part": "1,5", "theoricalQty": "123.456"}]}"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.observations[0].theoretical_quantity, Some(123_456.0));
        assert_eq!(page.observations[0].part_weight, Some(1.5));
    }

    #[test]
    fn unparseable_numbers_become_null() {
        let body = r#"{"header": {"date": "02/01/2024"},
                       "results": [{"cod": "X", "part": "--", "theoricalQty": ""}]}"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.observations[0].part_weight, None);
        assert_eq!(page.observations[0].theoretical_quantity, None);
    }

    #[test]
    fn missing_header_date_is_format_error() {
        let err = parse_page(r#"{"results": []}"#).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn header_date_two_and_four_digit_years() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        assert_eq!(parse_header_date("17/10/25").unwrap(), expected);
        assert_eq!(parse_header_date("17/10/2025").unwrap(), expected);
        assert!(parse_header_date("2025-10-17").is_err());
    }

    #[test]
    fn page_url_encodes_query() {
        let provider = B3Provider::new(B3Config {
            base_url: "http://localhost/GetPortfolioDay/".into(),
            ..B3Config::default()
        })
        .unwrap();
        let url = provider.page_url("IBOV", 3).unwrap();
        let token = url.rsplit('/').next().unwrap();
        let decoded = String::from_utf8(STANDARD.decode(token).unwrap()).unwrap();
        assert!(url.starts_with("http://localhost/GetPortfolioDay/"));
        assert!(decoded.contains(r#""pageNumber":3"#));
        assert!(decoded.contains(r#""index":"IBOV""#));
        assert!(decoded.contains(r#""pageSize":100"#));
    }
}
