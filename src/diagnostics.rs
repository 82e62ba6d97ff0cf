//! Non-fatal format problems, accumulated instead of thrown.
//!
//! Every recoverable problem a reader or writer observes (a missing field,
//! a malformed value, undesired trailing data) is recorded as a
//! [`Diagnosis`] against the current record or the reader itself.  Parsing
//! never stops for one.  Severity is a property of the collection, not the
//! kind: the call site decides whether a diagnosis lands in the error or the
//! warning list.  A record or reader is *compliant* iff it has accumulated
//! zero errors; warnings do not affect compliance.

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisType {
    /// A required value was absent.
    RequiredMissing,
    /// An expected field was empty or missing from the header line.
    Empty,
    /// Structurally invalid data.
    Invalid,
    /// Data present but invalid for its role.
    InvalidData,
    /// A value failed its grammar; info carries `[attempted, expected]`.
    InvalidExpected,
    /// A hard problem observed while processing an entity.
    Error,
    /// Something other than the expected entity was found;
    /// info carries `[expected, found]`.
    ErrorExpected,
    /// Data that is permitted to be absent and should be.
    UndesiredData,
}

/// One recorded format problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub kind:   DiagnosisType,
    /// The entity the problem is recorded against, e.g. `'URL' value`
    /// or `ARC version block`.
    pub entity: String,
    /// Contextual values; the *length* of this list is part of the
    /// contract for each kind.
    pub info:   Vec<String>,
}

impl Diagnosis {
    pub fn new(kind: DiagnosisType, entity: impl Into<String>, info: &[&str]) -> Self {
        Self {
            kind,
            entity: entity.into(),
            info: info.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Ordered accumulator of [`Diagnosis`] entries, split by severity.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors:   Vec<Diagnosis>,
    warnings: Vec<Diagnosis>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, diagnosis: Diagnosis) {
        self.errors.push(diagnosis);
    }

    pub fn add_warning(&mut self, diagnosis: Diagnosis) {
        self.warnings.push(diagnosis);
    }

    /// Append all of `other`'s entries, preserving order and severity.
    pub fn add_all(&mut self, other: &Diagnostics) {
        self.errors.extend(other.errors.iter().cloned());
        self.warnings.extend(other.warnings.iter().cloned());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[Diagnosis] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnosis] {
        &self.warnings
    }

    /// Clear both lists.
    pub fn reset(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }
}
