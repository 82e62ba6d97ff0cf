//! Incremental block/payload digest computation.
//!
//! Digests are configured per reader or writer, independently for the block
//! digest (sub-header + payload bytes) and the payload digest (bytes after
//! the sub-header).  Disabling either leaves the record's computed-digest
//! field null with no error.  Encoding names are accepted as configured; an
//! unknown name is only flagged, as `InvalidData`, once a digest is
//! actually computed with it, and the raw hash bytes are produced
//! regardless.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use digest::{Digest, DynDigest};
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use crate::diagnostics::{Diagnosis, DiagnosisType, Diagnostics};
use crate::error::{ArcError, Result};

/// Default digest encoding scheme.
pub const DEFAULT_ENCODING: &str = "base32";

/// Digest algorithms available in this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Resolve a case-insensitive algorithm name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Some(DigestAlgorithm::Sha1),
            "md5" => Some(DigestAlgorithm::Md5),
            "sha256" | "sha-256" => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    fn hasher(self) -> Box<dyn DynDigest> {
        match self {
            DigestAlgorithm::Sha1 => Box::new(Sha1::new()),
            DigestAlgorithm::Md5 => Box::new(Md5::new()),
            DigestAlgorithm::Sha256 => Box::new(Sha256::new()),
        }
    }
}

/// Configuration for one digest slot.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    algorithm: Option<DigestAlgorithm>,
    encoding:  String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            algorithm: None,
            encoding:  DEFAULT_ENCODING.to_string(),
        }
    }
}

impl DigestConfig {
    /// Select the algorithm by name.  `None` or the empty string disables
    /// computation; an unknown name is a fault.
    pub fn set_algorithm(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            None | Some("") => {
                self.algorithm = None;
                Ok(())
            }
            Some(name) => match DigestAlgorithm::from_name(name) {
                Some(algorithm) => {
                    self.algorithm = Some(algorithm);
                    Ok(())
                }
                None => Err(ArcError::UnknownDigestAlgorithm(name.to_string())),
            },
        }
    }

    /// Set the encoding scheme name.  Unknown names are accepted here and
    /// flagged only when a digest is computed.
    pub fn set_encoding(&mut self, encoding: &str) {
        self.encoding = encoding.to_string();
    }

    pub fn algorithm(&self) -> Option<DigestAlgorithm> {
        self.algorithm
    }

    pub fn is_enabled(&self) -> bool {
        self.algorithm.is_some()
    }

    /// Start an incremental computation, or `None` when disabled.
    pub fn start(&self) -> Option<DigestComputation> {
        self.algorithm.map(|algorithm| DigestComputation {
            algorithm,
            encoding: self.encoding.clone(),
            hasher:   algorithm.hasher(),
        })
    }
}

/// An in-flight incremental digest.
pub struct DigestComputation {
    algorithm: DigestAlgorithm,
    encoding:  String,
    hasher:    Box<dyn DynDigest>,
}

impl DigestComputation {
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Finish the computation.  The raw hash bytes are always produced;
    /// the encoded form is left unset, with an `InvalidData` diagnosis,
    /// when the configured encoding scheme is not recognised.
    pub fn finish(self, diag: &mut Diagnostics) -> DigestValue {
        let bytes = self.hasher.finalize().to_vec();
        let encoded = match self.encoding.to_ascii_lowercase().as_str() {
            "base16" => Some(hex::encode(&bytes)),
            "base32" => Some(base32::encode(
                base32::Alphabet::RFC4648 { padding: false },
                &bytes,
            )),
            "base64" => Some(BASE64.encode(&bytes)),
            _ => {
                diag.add_error(Diagnosis::new(
                    DiagnosisType::InvalidData,
                    format!("'{}' digest encoding scheme", self.encoding),
                    &[],
                ));
                None
            }
        };
        DigestValue {
            algorithm: self.algorithm,
            bytes,
            encoded,
        }
    }
}

/// A completed digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestValue {
    pub algorithm: DigestAlgorithm,
    /// Raw hash bytes.
    pub bytes:     Vec<u8>,
    /// Encoded form, unset when the configured encoding was unknown.
    pub encoded:   Option<String>,
}
