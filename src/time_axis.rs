//! Horizon validation and time-axis construction
//!
//! Every XML document declares a half-open `[start, end)` horizon; the axis
//! derived from it is the canonical row index all series must align to.
//! Placement happens by instant, so documents and callers may use different
//! UTC offsets for the same moment.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};

use crate::error::ParseError;

/// A validated half-open time interval `[start, end)` with a sampling step
///
/// Construction fails with [`ParseError::InvalidHorizon`] when `end <= start`
/// or when the step does not evenly divide the span. Silent truncation is
/// rejected on purpose so malformed documents surface early.
#[derive(Debug, Clone, PartialEq)]
pub struct Horizon {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    step: Duration,
}

impl Horizon {
    /// Validate and create a horizon
    pub fn new(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        step: Duration,
    ) -> Result<Self, ParseError> {
        if step <= Duration::zero() {
            return Err(ParseError::InvalidHorizon(format!(
                "{}/{} with non-positive step",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        if end <= start {
            return Err(ParseError::InvalidHorizon(format!(
                "{}/{}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        let span = end - start;
        if span.num_seconds() % step.num_seconds() != 0 {
            return Err(ParseError::InvalidHorizon(format!(
                "{}/{} not divisible by step of {}s",
                start.to_rfc3339(),
                end.to_rfc3339(),
                step.num_seconds()
            )));
        }
        Ok(Horizon { start, end, step })
    }

    /// Create an hourly horizon, the granularity of all observed documents
    pub fn hourly(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Self, ParseError> {
        Horizon::new(start, end, Duration::hours(1))
    }

    /// Interval start (inclusive)
    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    /// Interval end (exclusive)
    pub fn end(&self) -> DateTime<FixedOffset> {
        self.end
    }

    /// Sampling step
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Number of axis entries, `(end - start) / step`
    pub fn num_steps(&self) -> usize {
        ((self.end - self.start).num_seconds() / self.step.num_seconds()) as usize
    }

    /// Build the axis for this horizon
    pub fn axis(&self) -> TimeAxis {
        TimeAxis::from_horizon(self)
    }
}

/// The canonical ordered timestamp sequence derived from a [`Horizon`]
///
/// Strictly increasing, constant step, left-inclusive and right-exclusive.
/// Immutable once built. An instant-keyed map backs O(1) reverse lookup
/// from a timestamp to its offset on the axis.
#[derive(Debug, Clone)]
pub struct TimeAxis {
    stamps: Vec<DateTime<FixedOffset>>,
    positions: HashMap<DateTime<Utc>, usize>,
    step: Duration,
}

impl TimeAxis {
    fn from_horizon(horizon: &Horizon) -> Self {
        let n = horizon.num_steps();
        let mut stamps = Vec::with_capacity(n);
        let mut positions = HashMap::with_capacity(n);
        for i in 0..n {
            let ts = horizon.start + horizon.step * i as i32;
            positions.insert(ts.with_timezone(&Utc), i);
            stamps.push(ts);
        }
        TimeAxis {
            stamps,
            positions,
            step: horizon.step,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether the axis is empty (never true for a valid horizon)
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// The ordered timestamps
    pub fn stamps(&self) -> &[DateTime<FixedOffset>] {
        &self.stamps
    }

    /// Entry at a given offset
    pub fn get(&self, pos: usize) -> Option<DateTime<FixedOffset>> {
        self.stamps.get(pos).copied()
    }

    /// Sampling step between consecutive entries
    pub fn step(&self) -> Duration {
        self.step
    }

    /// O(1) reverse lookup: axis offset of a timestamp, compared by instant
    pub fn position_of(&self, ts: &DateTime<FixedOffset>) -> Option<usize> {
        self.positions.get(&ts.with_timezone(&Utc)).copied()
    }

    /// Every n-th entry, starting at the first
    ///
    /// With hourly steps, `every(24)` yields one entry per calendar day:
    /// the daily roll-up row index.
    pub fn every(&self, n: usize) -> Vec<DateTime<FixedOffset>> {
        self.stamps.iter().step_by(n.max(1)).copied().collect()
    }

    /// The full axis re-expressed in the given UTC offset
    ///
    /// Presentation only; `position_of` keeps resolving by instant.
    pub fn to_offset(&self, offset: FixedOffset) -> Vec<DateTime<FixedOffset>> {
        self.stamps
            .iter()
            .map(|ts| ts.with_timezone(&offset))
            .collect()
    }
}

/// Parse a wire timestamp as ISO-8601
///
/// Accepts second precision (`2021-06-01T22:00:00Z`), the minute-precision
/// form some documents carry (`2021-06-01T22:00Z`), explicit offsets
/// (`+02:00`), and naive timestamps, which are taken as UTC.
pub(crate) fn parse_wire_timestamp(text: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let trimmed = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts);
    }
    if let Some(expanded) = expand_minute_precision(trimmed) {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&expanded) {
            return Ok(ts);
        }
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc().fixed_offset());
    }
    Err(ParseError::InvalidTimestamp(text.to_string()))
}

/// Insert the seconds field into a minute-precision timestamp, keeping the
/// offset suffix intact. Returns None when the form is already complete.
fn expand_minute_precision(s: &str) -> Option<String> {
    let t_pos = s.find('T')?;
    let (date, rest) = s.split_at(t_pos + 1);
    let offset_pos = rest
        .find(|c| c == 'Z' || c == '+' || c == '-')
        .unwrap_or(rest.len());
    let (time, offset) = rest.split_at(offset_pos);
    if time.matches(':').count() == 1 {
        Some(format!("{}{}:00{}", date, time, offset))
    } else {
        None
    }
}
