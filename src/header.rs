//! The ten canonical ARC header fields and field-set version detection.
//!
//! A header line is whitespace-tokenized: exactly 5 tokens is a version-1
//! header, exactly 10 a version-2 header, anything else version 0 with all
//! fields null.  Each field is held twice, the raw token and its parsed
//! typed value, because the two are independently nullable: a token can be
//! present yet fail its grammar (raw kept, typed null), or carry the ARC
//! absence marker `-` (both null, no diagnosis for optional fields).

use std::net::IpAddr;

use chrono::NaiveDateTime;
use url::Url;

use crate::diagnostics::{Diagnosis, DiagnosisType, Diagnostics};
use crate::error::{ArcError, Result};
use crate::fields::{ContentType, FieldParsers};

pub const FN_URL:            &str = "URL";
pub const FN_IP_ADDRESS:     &str = "IP-address";
pub const FN_ARCHIVE_DATE:   &str = "Archive-date";
pub const FN_CONTENT_TYPE:   &str = "Content-type";
pub const FN_RESULT_CODE:    &str = "Result-code";
pub const FN_CHECKSUM:       &str = "Checksum";
pub const FN_LOCATION:       &str = "Location";
pub const FN_OFFSET:         &str = "Offset";
pub const FN_FILENAME:       &str = "Filename";
pub const FN_ARCHIVE_LENGTH: &str = "Archive-length";

/// Field names of the 5-field (version 1) layout, in order.
pub const VERSION_1_FIELDS: [&str; 5] = [
    FN_URL,
    FN_IP_ADDRESS,
    FN_ARCHIVE_DATE,
    FN_CONTENT_TYPE,
    FN_ARCHIVE_LENGTH,
];

/// Field names of the 10-field (version 2) layout, in order.
pub const VERSION_2_FIELDS: [&str; 10] = [
    FN_URL,
    FN_IP_ADDRESS,
    FN_ARCHIVE_DATE,
    FN_CONTENT_TYPE,
    FN_RESULT_CODE,
    FN_CHECKSUM,
    FN_LOCATION,
    FN_OFFSET,
    FN_FILENAME,
    FN_ARCHIVE_LENGTH,
];

/// The ARC token marking an absent field value.
pub const ABSENT_FIELD: &str = "-";

/// The ARC token marking an absent content type.
pub const NO_TYPE: &str = "no-type";

/// One record's header fields, raw and typed.
#[derive(Debug, Clone, Default)]
pub struct RecordHeader {
    pub url_str:          Option<String>,
    pub url:              Option<Url>,
    pub ip_address_str:   Option<String>,
    pub ip_address:       Option<IpAddr>,
    pub archive_date_str: Option<String>,
    pub archive_date:     Option<NaiveDateTime>,
    pub content_type_str: Option<String>,
    pub content_type:     Option<ContentType>,
    pub result_code_str:  Option<String>,
    pub result_code:      Option<i32>,
    pub checksum_str:     Option<String>,
    pub location_str:     Option<String>,
    pub offset_str:       Option<String>,
    pub offset:           Option<i64>,
    pub filename_str:     Option<String>,
    pub archive_length_str: Option<String>,
    pub archive_length:   Option<i64>,

    /// 1 for the 5-field layout, 2 for the 10-field layout, 0 when the
    /// header line did not tokenize into either.  Fixed once parsing of the
    /// header line succeeds.
    pub record_field_version: u8,
}

impl RecordHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tokenized header line.
    ///
    /// Returns the detected field-set version (0, 1 or 2).  For version 0
    /// every field stays null and no diagnosis is emitted here; the caller
    /// decides which fields were expected (see
    /// [`add_missing_field_diagnoses`](Self::add_missing_field_diagnoses)).
    pub fn parse_tokens(
        &mut self,
        tokens: &[&str],
        parsers: &FieldParsers,
        diag: &mut Diagnostics,
    ) -> u8 {
        self.record_field_version = match tokens.len() {
            5 => {
                self.parse_common(tokens[0], tokens[1], tokens[2], tokens[3], parsers, diag);
                self.parse_length(tokens[4], parsers, diag);
                1
            }
            10 => {
                self.parse_common(tokens[0], tokens[1], tokens[2], tokens[3], parsers, diag);
                let result_code = normalize(tokens[4]);
                self.result_code_str = result_code.map(str::to_string);
                self.result_code =
                    parsers.parse_integer(result_code, FN_RESULT_CODE, true, diag);
                let checksum = normalize(tokens[5]);
                self.checksum_str =
                    parsers.parse_string(checksum, FN_CHECKSUM, true, diag);
                let location = normalize(tokens[6]);
                self.location_str =
                    parsers.parse_string(location, FN_LOCATION, true, diag);
                let offset = normalize(tokens[7]);
                self.offset_str = offset.map(str::to_string);
                self.offset = parsers.parse_long(offset, FN_OFFSET, true, diag);
                let filename = normalize(tokens[8]);
                self.filename_str =
                    parsers.parse_string(filename, FN_FILENAME, true, diag);
                self.parse_length(tokens[9], parsers, diag);
                2
            }
            _ => 0,
        };
        self.record_field_version
    }

    fn parse_common(
        &mut self,
        url: &str,
        ip: &str,
        date: &str,
        content_type: &str,
        parsers: &FieldParsers,
        diag: &mut Diagnostics,
    ) {
        let url = normalize(url);
        self.url_str = url.map(str::to_string);
        self.url = parsers.parse_uri(url, FN_URL, false, diag);

        let ip = normalize(ip);
        self.ip_address_str = ip.map(str::to_string);
        self.ip_address = parsers.parse_ip_address(ip, FN_IP_ADDRESS, false, diag);

        let date = normalize(date);
        self.archive_date_str = date.map(str::to_string);
        self.archive_date = parsers.parse_date(date, FN_ARCHIVE_DATE, false, diag);

        // "no-type" keeps its raw token but never reaches the grammar.
        self.content_type_str = Some(content_type.to_string());
        if content_type == NO_TYPE {
            self.content_type = None;
        } else {
            self.content_type =
                parsers.parse_content_type(Some(content_type), FN_CONTENT_TYPE, false, diag);
        }
    }

    fn parse_length(&mut self, token: &str, parsers: &FieldParsers, diag: &mut Diagnostics) {
        let token = normalize(token);
        self.archive_length_str = token.map(str::to_string);
        self.archive_length = parsers.parse_long(token, FN_ARCHIVE_LENGTH, false, diag);
    }

    /// Emit one `Empty` error per field of `expected_version`, used when the
    /// header line failed to tokenize into a known field-set but the version
    /// block declared which one to expect.  Version 0 emits nothing.
    pub fn add_missing_field_diagnoses(expected_version: u8, diag: &mut Diagnostics) {
        let fields: &[&str] = match expected_version {
            1 => &VERSION_1_FIELDS,
            2 => &VERSION_2_FIELDS,
            _ => return,
        };
        for field in fields {
            diag.add_error(Diagnosis::new(
                DiagnosisType::Empty,
                format!("'{field}' field"),
                &[],
            ));
        }
    }

    /// The payload byte count this header declares, when parseable.
    pub fn declared_length(&self) -> Option<i64> {
        self.archive_length
            .or_else(|| self.archive_length_str.as_deref()?.parse().ok())
    }

    /// Serialize the header line (`\n`-terminated) in the layout
    /// `record_field_version` declares.  Absent fields are written as `-`.
    pub fn header_line(&self) -> Result<Vec<u8>> {
        let fields: Vec<&str> = match self.record_field_version {
            1 => vec![
                raw(&self.url_str),
                raw(&self.ip_address_str),
                raw(&self.archive_date_str),
                raw(&self.content_type_str),
                raw(&self.archive_length_str),
            ],
            2 => vec![
                raw(&self.url_str),
                raw(&self.ip_address_str),
                raw(&self.archive_date_str),
                raw(&self.content_type_str),
                raw(&self.result_code_str),
                raw(&self.checksum_str),
                raw(&self.location_str),
                raw(&self.offset_str),
                raw(&self.filename_str),
                raw(&self.archive_length_str),
            ],
            v => {
                return Err(ArcError::InvalidArgument {
                    context: "header serialization",
                    reason:  format!("record field version {v} is not serializable"),
                })
            }
        };
        let mut line = fields.join(" ").into_bytes();
        line.push(b'\n');
        Ok(line)
    }
}

/// Map the ARC absence marker to a missing token.
fn normalize(token: &str) -> Option<&str> {
    if token == ABSENT_FIELD {
        None
    } else {
        Some(token)
    }
}

fn raw(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or(ABSENT_FIELD)
}
