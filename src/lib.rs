//! esios-parsers - Response parsers for the Spanish ESIOS electricity market API
//!
//! ESIOS (the system operator's information service) publishes the same market
//! data through several wire shapes. This crate turns each of them into a
//! uniform in-memory representation:
//!
//! # Features
//! - P48 schedule XML: role-signed series placed onto the document's hourly
//!   axis, with optional daily roll-up
//! - PVPC price XML: cost-term filtered series scaled to native units
//! - Daily report bundles: zip-packaged spreadsheets decoded into
//!   label-keyed sheets
//! - Indicator JSON: flat observation lists pivoted into timestamp x zone
//!   tables
//!
//! All timestamps are placed by instant and presented in the service's
//! display offset (UTC+1); see [`display_offset`].

pub mod archive_parser;
mod error;
pub mod indicator_parser;
mod time_axis;
mod types;
pub mod xml_parsers;

// Re-export public types for easier access
pub use archive_parser::parse_archive;
pub use error::{ArchiveError, EsiosError, ParseError};
pub use indicator_parser::{parse_indicator_json, parse_indicator_records, IndicatorRecord};
pub use time_axis::{Horizon, TimeAxis};
pub use types::{ArchiveBundle, PriceSeries, Sheet, SheetCell, Table};
pub use xml_parsers::{parse_prices, parse_schedule, DocumentFamily};

use chrono::FixedOffset;

/// The fixed UTC offset used to present timestamps: Spain standard time (UTC+1)
///
/// Presentation only. Every lookup and placement in the crate compares
/// instants, so callers may query tables with timestamps in any offset.
pub fn display_offset() -> FixedOffset {
    // one hour east is always within the valid offset range
    FixedOffset::east_opt(3600).expect("in-range offset")
}

/// The wire shape of an ESIOS response body
///
/// Callers know the shape from the endpoint they queried; the parsers never
/// guess it from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Indicator endpoint JSON payload
    IndicatorJson,
    /// P48 schedule XML document
    ScheduleXml,
    /// PVPC price XML document
    PriceXml,
    /// Zip archive holding a daily report spreadsheet
    ZipBundle,
}

/// A parsed ESIOS response, one variant per [`ResponseKind`]
#[derive(Debug, Clone)]
pub enum ResponseData {
    /// Signed schedule table, hourly or rolled up daily
    Schedule(Table),
    /// Per-metric price vectors
    Prices(PriceSeries),
    /// Labelled sheets, or `None` when the zip held no recognized report
    Bundle(Option<ArchiveBundle>),
    /// Pivoted indicator observations
    Indicators(Table),
}

/// Parse a raw response body according to its declared wire shape
///
/// `aggregate_daily` only affects [`ResponseKind::ScheduleXml`]; the other
/// shapes ignore it.
pub fn parse_response(
    kind: ResponseKind,
    data: &[u8],
    aggregate_daily: bool,
) -> Result<ResponseData, EsiosError> {
    match kind {
        ResponseKind::IndicatorJson => parse_indicator_json(data).map(ResponseData::Indicators),
        ResponseKind::ScheduleXml => {
            parse_schedule(data, aggregate_daily).map(ResponseData::Schedule)
        }
        ResponseKind::PriceXml => parse_prices(data).map(ResponseData::Prices),
        ResponseKind::ZipBundle => parse_archive(data).map(ResponseData::Bundle),
    }
}
