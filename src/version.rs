//! The version block, the mandatory first record of an ARC file.
//!
//! Its payload opens with `"<versionNumber> <reserved> <originCode>\n"`,
//! optionally followed by a block-definition line declaring which header
//! field-set subsequent records use, optionally followed by metadata bytes.
//! Validity is two independent flags: the version pair must map to a known
//! release and the definition line must match one of the two canonical
//! strings verbatim.  The sole fully-clean outcome is both flags set with
//! zero diagnoses recorded.

use std::fmt;

use crate::diagnostics::{Diagnosis, DiagnosisType, Diagnostics};
use crate::fields::FieldParsers;

/// Diagnosis entity for version-block problems.
pub const ENTITY_VERSION_BLOCK: &str = "ARC version block";

/// The 5-field block-definition line.
pub const VERSION_1_BLOCK_DEF: &str =
    "URL IP-address Archive-date Content-type Archive-length";

/// The 10-field block-definition line.
pub const VERSION_2_BLOCK_DEF: &str =
    "URL IP-address Archive-date Content-type Result-code Checksum Location \
     Offset Filename Archive-length";

/// Known ARC releases, keyed by the `(versionNumber, reserved)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcVersion {
    V1_0,
    V1_1,
    V2_0,
}

impl ArcVersion {
    pub fn from_pair(version_number: i32, reserved: i32) -> Option<Self> {
        match (version_number, reserved) {
            (1, 0) => Some(ArcVersion::V1_0),
            (1, 1) => Some(ArcVersion::V1_1),
            (2, 0) => Some(ArcVersion::V2_0),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArcVersion::V1_0 => "1.0",
            ArcVersion::V1_1 => "1.1",
            ArcVersion::V2_0 => "2.0",
        }
    }
}

impl fmt::Display for ArcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed contents of the version-block payload.
#[derive(Debug, Clone, Default)]
pub struct VersionHeader {
    pub version_number: Option<i32>,
    pub reserved:       Option<i32>,
    pub origin_code:    Option<String>,
    pub version:        Option<ArcVersion>,

    pub is_version_valid:    bool,
    pub is_valid_block_desc: bool,
    /// Field-set version the definition line declares: 1, 2, or 0 when no
    /// valid definition line was present.
    pub block_desc_version:  u8,

    /// Payload bytes consumed by the version and definition lines;
    /// anything beyond is metadata.
    pub parsed_len: usize,
}

impl VersionHeader {
    /// Both the release pair and the definition line checked out.
    pub fn is_valid(&self) -> bool {
        self.is_version_valid && self.is_valid_block_desc
    }

    /// Parse the version-block payload.
    ///
    /// Reads up to two lines, then judges any remaining metadata bytes:
    /// permitted under the 1.1/2.0 informational profiles, flagged
    /// `UndesiredData` under plain 1.0.
    pub fn process_payload(
        payload: &[u8],
        parsers: &FieldParsers,
        diag: &mut Diagnostics,
    ) -> VersionHeader {
        let mut header = VersionHeader::default();

        let mut pos = 0usize;
        let line1 = next_line(payload, &mut pos);
        match line1 {
            None => {
                diag.add_error(Diagnosis::new(
                    DiagnosisType::Invalid,
                    ENTITY_VERSION_BLOCK,
                    &["Version line missing"],
                ));
                diag.add_error(Diagnosis::new(
                    DiagnosisType::Error,
                    ENTITY_VERSION_BLOCK,
                    &["Version block is empty"],
                ));
                return header;
            }
            Some(line) => {
                let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
                if tokens.len() == 3 {
                    header.version_number = tokens[0].parse().ok();
                    header.reserved = tokens[1].parse().ok();
                    header.origin_code =
                        parsers.parse_string(Some(tokens[2]), "Origin-code", true, diag);
                }
                match (header.version_number, header.reserved) {
                    (Some(vn), Some(rsv)) => {
                        header.version = ArcVersion::from_pair(vn, rsv);
                        header.is_version_valid = header.version.is_some();
                    }
                    _ => {
                        header.is_version_valid = false;
                    }
                }
                if !header.is_version_valid {
                    diag.add_error(Diagnosis::new(
                        DiagnosisType::Invalid,
                        ENTITY_VERSION_BLOCK,
                        &[&line],
                    ));
                }
            }
        }
        header.parsed_len = pos;

        if let Some(line) = next_line(payload, &mut pos) {
            if line == VERSION_1_BLOCK_DEF {
                header.is_valid_block_desc = true;
                header.block_desc_version = 1;
                header.parsed_len = pos;
            } else if line == VERSION_2_BLOCK_DEF {
                header.is_valid_block_desc = true;
                header.block_desc_version = 2;
                header.parsed_len = pos;
            } else {
                diag.add_error(Diagnosis::new(
                    DiagnosisType::Invalid,
                    ENTITY_VERSION_BLOCK,
                    &[&line],
                ));
                // The mismatched line still belongs to the block payload.
                header.parsed_len = pos;
            }
        }

        if header.parsed_len < payload.len() && header.version == Some(ArcVersion::V1_0) {
            diag.add_warning(Diagnosis::new(
                DiagnosisType::UndesiredData,
                "version block metadata payload",
                &[],
            ));
        }

        header
    }
}

/// Pull the next `\n`-terminated line out of `payload`, advancing `pos`.
/// A trailing unterminated line is returned as-is; `\r\n` is tolerated.
fn next_line(payload: &[u8], pos: &mut usize) -> Option<String> {
    if *pos >= payload.len() {
        return None;
    }
    let rest = &payload[*pos..];
    let (line, advance) = match rest.iter().position(|&b| b == b'\n') {
        Some(idx) => (&rest[..idx], idx + 1),
        None => (rest, rest.len()),
    };
    *pos += advance;
    let line = if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
    };
    Some(String::from_utf8_lossy(line).into_owned())
}
