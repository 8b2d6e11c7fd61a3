//! Error types for the ESIOS response parsers
//!
//! Two failure families exist:
//! - Structural parse errors (malformed horizon, unknown series role,
//!   series placed off the time axis, broken XML/JSON)
//! - Archive errors (corrupt zip container, unreadable spreadsheet)
//!
//! "No data" situations are never errors: a zip without a recognized entry
//! yields `Ok(None)`, unrecognized price cost-term codes and the reserved
//! directory sentinel are silently skipped.

use std::fmt;

/// Top-level error type for the ESIOS parsers
///
/// Supports automatic conversion from the specific error types via From.
#[derive(Debug)]
pub enum EsiosError {
    /// Structural parse error in an XML/JSON payload or its time axis
    Parse(ParseError),

    /// Zip container or spreadsheet error in an archive bundle
    Archive(ArchiveError),
}

impl fmt::Display for EsiosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EsiosError::Parse(e) => write!(f, "Parse error: {}", e),
            EsiosError::Archive(e) => write!(f, "Archive error: {}", e),
        }
    }
}

impl std::error::Error for EsiosError {}

impl From<ParseError> for EsiosError {
    fn from(err: ParseError) -> Self {
        EsiosError::Parse(err)
    }
}

impl From<ArchiveError> for EsiosError {
    fn from(err: ArchiveError) -> Self {
        EsiosError::Archive(err)
    }
}

/// Structural parse errors
///
/// Raised while decoding XML schedule/price documents, JSON indicator
/// payloads, or while building the time axis they align to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Horizon is malformed: bad ordering (end <= start) or a step that
    /// does not evenly divide the span. Truncation is never applied.
    InvalidHorizon(String),

    /// Series role element is neither the generation nor the demand tag
    ///
    /// Example: a third, unrecognized role must abort the parse rather than
    /// default to a sign.
    UnknownSeriesRole(String),

    /// A series' sub-horizon start is not a point on the document's axis
    SeriesOutsideHorizon(String),

    /// Root namespace does not resolve to a known document family
    UnknownDocumentFamily(String),

    /// A required element is absent
    ///
    /// Example: document without a `Horizonte` element.
    MissingElement(String),

    /// A required `v` attribute is absent on the named element
    MissingAttribute(String),

    /// Timestamp text could not be parsed as ISO-8601 with offset
    InvalidTimestamp(String),

    /// Numeric text (position or quantity) could not be parsed
    InvalidNumber(String),

    /// A kept price series does not span the declared horizon
    SeriesLengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },

    /// Low-level XML error (encoding, nesting, attribute syntax)
    Xml(String),

    /// Low-level JSON error from the indicator payload
    Json(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidHorizon(v) => {
                write!(f, "Invalid horizon: '{}' (expected start/end with end > start and an evenly dividing step)", v)
            }
            ParseError::UnknownSeriesRole(tag) => {
                write!(
                    f,
                    "Unknown series role: '{}' (expected UPEntrada or UPSalida)",
                    tag
                )
            }
            ParseError::SeriesOutsideHorizon(ts) => {
                write!(f, "Series start '{}' is not on the document's time axis", ts)
            }
            ParseError::UnknownDocumentFamily(ns) => {
                write!(f, "Unknown document family: '{}'", ns)
            }
            ParseError::MissingElement(name) => {
                write!(f, "Missing required element: '{}'", name)
            }
            ParseError::MissingAttribute(elem) => {
                write!(f, "Missing 'v' attribute on element: '{}'", elem)
            }
            ParseError::InvalidTimestamp(ts) => {
                write!(
                    f,
                    "Invalid timestamp: '{}' (expected ISO-8601 with offset)",
                    ts
                )
            }
            ParseError::InvalidNumber(v) => {
                write!(f, "Invalid numeric value: '{}'", v)
            }
            ParseError::SeriesLengthMismatch {
                series,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Series '{}' has {} intervals but the horizon has {}",
                    series, actual, expected
                )
            }
            ParseError::Xml(msg) => write!(f, "XML error: {}", msg),
            ParseError::Json(msg) => write!(f, "JSON error: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// Archive bundle errors
///
/// Raised when a zip container or the spreadsheet inside it is structurally
/// unreadable. Absence of a recognized entry is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveError {
    /// Zip container could not be opened or an entry could not be read
    Zip(String),

    /// Spreadsheet could not be opened or a range could not be decoded
    Spreadsheet(String),

    /// The directory sheet references a sub-sheet that does not exist
    MissingSheet(String),

    /// The recognized spreadsheet contains no sheets at all
    EmptyWorkbook,
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Zip(msg) => write!(f, "Zip error: {}", msg),
            ArchiveError::Spreadsheet(msg) => write!(f, "Spreadsheet error: {}", msg),
            ArchiveError::MissingSheet(name) => {
                write!(f, "Directory references missing sheet: '{}'", name)
            }
            ArchiveError::EmptyWorkbook => write!(f, "Workbook contains no sheets"),
        }
    }
}

impl std::error::Error for ArchiveError {}
