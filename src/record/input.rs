use super::Record;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;

/// Value of the `data_source` column for every record this tool writes
pub const DATA_SOURCE: &str = "enrich:web";

const DEFAULT_COUNTRY: &str = "United States";

/// Leading house number on a one-line street, e.g. `123 W Main St`
static HOUSE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+[A-Za-z\-]*)\s+(.*)$").expect("valid regex"));

const STREET_COLUMNS: &[&str] = &[
    "street",
    "street_name",
    "address1",
    "address_1",
    "addr:street",
    "address",
];
const HOUSE_NUMBER_COLUMNS: &[&str] = &[
    "housenumber",
    "house_number",
    "addr:housenumber",
    "street_number",
    "no",
    "number",
];
const CITY_COLUMNS: &[&str] = &["city", "town"];
const STATE_COLUMNS: &[&str] = &["state", "region", "province"];
const POSTAL_COLUMNS: &[&str] = &["postal_code", "zip", "zipcode", "postcode"];
const WEBSITE_COLUMNS: &[&str] = &["website_url", "website", "url", "site"];
const PHONE_COLUMNS: &[&str] = &["phone", "telephone", "tel"];
const LATITUDE_COLUMNS: &[&str] = &["latitude", "lat"];
const LONGITUDE_COLUMNS: &[&str] = &["longitude", "lon", "lng", "long"];
const NAME_COLUMNS: &[&str] = &["name", "business_name"];

/// First non-empty value among the candidate columns
fn first(row: &HashMap<String, String>, columns: &[&str]) -> String {
    columns
        .iter()
        .filter_map(|column| row.get(*column))
        .find(|value| !value.is_empty())
        .cloned()
        .unwrap_or_default()
}

impl Record {
    /// Maps an input row into the output schema
    ///
    /// Each field is taken from the first non-empty column among its known
    /// historical names; unknown columns are ignored and missing ones stay
    /// empty. When no house number column is present, a leading number is
    /// split off the street line so the address reads `housenumber street`.
    ///
    /// # Arguments
    ///
    /// * `row` - Header name to cell value for one input row
    pub fn from_input_row(row: &HashMap<String, String>) -> Self {
        let mut street = first(row, STREET_COLUMNS);
        let mut house_number = first(row, HOUSE_NUMBER_COLUMNS);

        if house_number.is_empty() && !street.is_empty() {
            if let Some(caps) = HOUSE_NUMBER_RE.captures(street.trim()) {
                house_number = caps[1].to_string();
                street = caps[2].to_string();
            }
        }

        let address = if house_number.is_empty() {
            street.trim().to_string()
        } else {
            format!("{} {}", house_number, street).trim().to_string()
        };

        let country = match first(row, &["country"]) {
            c if c.is_empty() => DEFAULT_COUNTRY.to_string(),
            c => c,
        };

        Record {
            business_name: first(row, NAME_COLUMNS).trim().to_string(),
            address,
            city: first(row, CITY_COLUMNS),
            state: first(row, STATE_COLUMNS),
            country,
            postal_code: first(row, POSTAL_COLUMNS),
            latitude: first(row, LATITUDE_COLUMNS),
            longitude: first(row, LONGITUDE_COLUMNS),
            website: first(row, WEBSITE_COLUMNS),
            email_status: "missing".to_string(),
            phone: first(row, PHONE_COLUMNS),
            data_source: DATA_SOURCE.to_string(),
            lead_score: 0,
            lead_grade: "C".to_string(),
            ..Default::default()
        }
    }
}

/// Streaming reader over the input CSV
///
/// Yields one header-keyed map per data row. Cells are decoded lossily so
/// a stray Latin-1 byte never stops a run, and rows with fewer or more
/// cells than the header are accepted.
pub struct InputReader {
    reader: csv::Reader<File>,
    headers: Vec<String>,
    row: csv::ByteRecord,
}

impl InputReader {
    /// Opens the input file and reads its header row
    pub fn open(path: &Path) -> crate::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        let headers = reader
            .byte_headers()?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();

        Ok(Self {
            reader,
            headers,
            row: csv::ByteRecord::new(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for InputReader {
    type Item = crate::Result<HashMap<String, String>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.row) {
            Ok(true) => Some(Ok(self
                .headers
                .iter()
                .cloned()
                .zip(
                    self.row
                        .iter()
                        .map(|cell| String::from_utf8_lossy(cell).trim().to_string()),
                )
                .collect())),
            Ok(false) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}
