//! Typed value parsers for ARC header fields.
//!
//! Every parser follows one contract:
//!
//! - absent token (`None`): returns `None`; when the field is not nullable a
//!   `RequiredMissing` error with zero info items is recorded.
//! - empty token (`Some("")`): returns `None` with no diagnosis; empty is
//!   absent, not malformed (the string parser returns the empty string).
//! - present but malformed: returns `None` and records an `InvalidExpected`
//!   error with exactly two info items, the attempted value and the
//!   expected form, against the entity `'<field>' value`.
//!
//! Failures are diagnoses, never faults: a malformed field does not stop
//! record parsing.

use std::fmt;
use std::net::IpAddr;

use chrono::NaiveDateTime;
use url::Url;

use crate::diagnostics::{Diagnosis, DiagnosisType, Diagnostics};

/// Archive-date layout: 14 digits, `yyyyMMddHHmmss`.
pub const ARC_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// A parsed `type/subtype` media type with optional verbatim parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub type_name:  String,
    pub subtype:    String,
    /// Everything after the first `;`, trimmed, carried verbatim.
    pub parameters: Option<String>,
}

impl ContentType {
    /// Parse a media type using a conservative RFC 2045 token grammar:
    /// token characters on both sides of exactly one `/`, optional
    /// `;`-prefixed parameters.
    pub fn parse(raw: &str) -> Option<Self> {
        let (mediatype, parameters) = match raw.find(';') {
            Some(idx) => {
                let params = raw[idx + 1..].trim();
                if params.is_empty() {
                    return None;
                }
                (&raw[..idx], Some(params.to_string()))
            }
            None => (raw, None),
        };
        let mediatype = mediatype.trim();
        let mut parts = mediatype.split('/');
        let type_name = parts.next()?;
        let subtype = parts.next()?;
        if parts.next().is_some() || !is_token(type_name) || !is_token(subtype) {
            return None;
        }
        Some(Self {
            type_name: type_name.to_ascii_lowercase(),
            subtype:   subtype.to_ascii_lowercase(),
            parameters,
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.subtype)?;
        if let Some(params) = &self.parameters {
            write!(f, "; {params}")?;
        }
        Ok(())
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// The field parser set shared by header and version-block parsing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldParsers;

impl FieldParsers {
    fn missing(&self, field: &str, nullable: bool, diag: &mut Diagnostics) {
        if !nullable {
            diag.add_error(Diagnosis::new(
                DiagnosisType::RequiredMissing,
                format!("'{field}' value"),
                &[],
            ));
        }
    }

    fn invalid(&self, field: &str, attempted: &str, expected: &str, diag: &mut Diagnostics) {
        diag.add_error(Diagnosis::new(
            DiagnosisType::InvalidExpected,
            format!("'{field}' value"),
            &[attempted, expected],
        ));
    }

    pub fn parse_string(
        &self,
        raw: Option<&str>,
        field: &str,
        nullable: bool,
        diag: &mut Diagnostics,
    ) -> Option<String> {
        match raw {
            None => {
                self.missing(field, nullable, diag);
                None
            }
            Some(s) => Some(s.to_string()),
        }
    }

    pub fn parse_integer(
        &self,
        raw: Option<&str>,
        field: &str,
        nullable: bool,
        diag: &mut Diagnostics,
    ) -> Option<i32> {
        let s = match raw {
            None => {
                self.missing(field, nullable, diag);
                return None;
            }
            Some("") => return None,
            Some(s) => s,
        };
        match s.parse::<i32>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.invalid(field, s, "Numeric format", diag);
                None
            }
        }
    }

    pub fn parse_long(
        &self,
        raw: Option<&str>,
        field: &str,
        nullable: bool,
        diag: &mut Diagnostics,
    ) -> Option<i64> {
        let s = match raw {
            None => {
                self.missing(field, nullable, diag);
                return None;
            }
            Some("") => return None,
            Some(s) => s,
        };
        match s.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.invalid(field, s, "Numeric format", diag);
                None
            }
        }
    }

    pub fn parse_content_type(
        &self,
        raw: Option<&str>,
        field: &str,
        nullable: bool,
        diag: &mut Diagnostics,
    ) -> Option<ContentType> {
        let s = match raw {
            None => {
                self.missing(field, nullable, diag);
                return None;
            }
            Some("") => return None,
            Some(s) => s,
        };
        match ContentType::parse(s) {
            Some(ct) => Some(ct),
            None => {
                self.invalid(field, s, "ContentType format", diag);
                None
            }
        }
    }

    pub fn parse_ip_address(
        &self,
        raw: Option<&str>,
        field: &str,
        nullable: bool,
        diag: &mut Diagnostics,
    ) -> Option<IpAddr> {
        let s = match raw {
            None => {
                self.missing(field, nullable, diag);
                return None;
            }
            Some("") => return None,
            Some(s) => s,
        };
        match s.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                self.invalid(field, s, "IPv4 or IPv6 format", diag);
                None
            }
        }
    }

    pub fn parse_uri(
        &self,
        raw: Option<&str>,
        field: &str,
        nullable: bool,
        diag: &mut Diagnostics,
    ) -> Option<Url> {
        let s = match raw {
            None => {
                self.missing(field, nullable, diag);
                return None;
            }
            Some("") => return None,
            Some(s) => s,
        };
        match Url::parse(s) {
            Ok(url) => Some(url),
            Err(_) => {
                self.invalid(field, s, "Absolute URI format", diag);
                None
            }
        }
    }

    /// Parse a 14-digit `yyyyMMddHHmmss` archive date.
    ///
    /// The input must be exactly 14 ASCII digits *and* survive a
    /// format-back round trip: a value whose re-formatted representation
    /// differs from the input is rejected even if chrono accepted it.
    pub fn parse_date(
        &self,
        raw: Option<&str>,
        field: &str,
        nullable: bool,
        diag: &mut Diagnostics,
    ) -> Option<NaiveDateTime> {
        let s = match raw {
            None => {
                self.missing(field, nullable, diag);
                return None;
            }
            Some("") => return None,
            Some(s) => s,
        };
        let parsed = if s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit()) {
            NaiveDateTime::parse_from_str(s, ARC_DATE_FORMAT)
                .ok()
                .filter(|dt| dt.format(ARC_DATE_FORMAT).to_string() == s)
        } else {
            None
        };
        match parsed {
            Some(dt) => Some(dt),
            None => {
                self.invalid(field, s, "yyyyMMddHHmmss", diag);
                None
            }
        }
    }
}
