pub mod diagnostics;
pub mod digest;
pub mod error;
pub mod fields;
pub mod gzip;
pub mod header;
pub mod reader;
pub mod record;
pub mod stream;
pub mod version;
pub mod writer;

pub use diagnostics::{Diagnosis, DiagnosisType, Diagnostics};
pub use digest::{DigestAlgorithm, DigestValue};
pub use error::{ArcError, Result};
pub use fields::{ContentType, FieldParsers};
pub use header::RecordHeader;
pub use reader::ArcReader;
pub use record::{Payload, Record, RecordType};
pub use version::{ArcVersion, VersionHeader};
pub use writer::{ArcWriter, DefaultNamingStrategy, MultiFileConfig, MultiFileWriter};
