//! Parsers for ESIOS XML documents
//!
//! This module decodes the `SeriesTemporales` document family:
//! - Schedule (P48 programming) documents: every series is placed onto the
//!   document's hourly axis, signed by its role (generation vs. demand),
//!   optionally rolled up to daily rows.
//! - Price (PVPC) documents: series are filtered down to the recognized
//!   cost-term codes and returned as flat per-metric vectors.
//!
//! Both parsers share the same scaffold: the root namespace resolves to an
//! explicit [`DocumentFamily`], the `Horizonte` declaration builds the
//! [`TimeAxis`](crate::TimeAxis), and `SeriesTemporales` blocks are walked
//! from an in-memory element tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::display_offset;
use crate::error::{EsiosError, ParseError};
use crate::time_axis::{parse_wire_timestamp, Horizon, TimeAxis};
use crate::types::{PriceSeries, Table};

/// Role element marking a generation series (positive sign)
pub const GENERATION_ROLE: &str = "UPEntrada";

/// Role element marking a demand series (negative sign)
pub const DEMAND_ROLE: &str = "UPSalida";

/// Cost-term codes kept by the price parser; all others are expected noise
pub const PRICE_TERMS: [&str; 2] = ["TCUh", "FEU"];

/// Native-unit scaling applied to every price quantity
pub const PRICE_UNIT_SCALE: f64 = 1000.0;

/// Axis entries per daily roll-up row
pub const HOURS_PER_DAY: usize = 24;

/// Document family, resolved once from the root element's namespace
///
/// The second-to-last `/`-segment of the namespace discriminates the
/// family. Unrecognized namespaces are an error, never a silent fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFamily {
    /// P48 programming schedule documents
    Program,
    /// PVPC regulated-price documents
    Price,
}

impl DocumentFamily {
    fn from_namespace(ns: &str) -> Result<Self, ParseError> {
        let mut segments = ns.rsplit('/');
        let discriminator = match (segments.next(), segments.next()) {
            (Some(_), Some(d)) if !d.is_empty() => d,
            _ => return Err(ParseError::UnknownDocumentFamily(ns.to_string())),
        };
        if discriminator.starts_with("P48") {
            Ok(DocumentFamily::Program)
        } else if discriminator.starts_with("PVPC") {
            Ok(DocumentFamily::Price)
        } else {
            Err(ParseError::UnknownDocumentFamily(discriminator.to_string()))
        }
    }
}

/// One XML element: local name, attributes, child elements
///
/// ESIOS documents carry all payload data in `v` attributes, so text
/// content is not retained.
#[derive(Debug, Clone)]
pub(crate) struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `v` attribute every ESIOS data element carries
    fn v(&self) -> Result<&str, ParseError> {
        self.attr("v")
            .ok_or_else(|| ParseError::MissingAttribute(self.name.clone()))
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn node_from_event(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
) -> Result<XmlNode, ParseError> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|err| ParseError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(reader)
            .map_err(|err| ParseError::Xml(err.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(XmlNode {
        name,
        attrs,
        children: Vec::new(),
    })
}

/// Build the element tree for a whole document
fn parse_tree(data: &[u8]) -> Result<XmlNode, ParseError> {
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                stack.push(node_from_event(&reader, e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let node = node_from_event(&reader, e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| ParseError::Xml("unbalanced end tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(ParseError::Xml(err.to_string())),
        }
        buf.clear();
    }
    root.ok_or_else(|| ParseError::Xml("document has no root element".to_string()))
}

/// A decoded ESIOS XML document with its family resolved
#[derive(Debug)]
pub struct EsiosDocument {
    family: DocumentFamily,
    root: XmlNode,
}

impl EsiosDocument {
    /// Parse a raw XML buffer and resolve its document family
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let root = parse_tree(data)?;
        let ns = root
            .attr("xmlns")
            .ok_or_else(|| ParseError::UnknownDocumentFamily("(no xmlns)".to_string()))?;
        let family = DocumentFamily::from_namespace(ns)?;
        Ok(EsiosDocument { family, root })
    }

    /// The resolved document family
    pub fn family(&self) -> DocumentFamily {
        self.family
    }

    /// The declared horizon, from the root-level `Horizonte` element
    ///
    /// The `v` attribute is `"<ISO8601-start>/<ISO8601-end>"`; the step is
    /// hourly in every observed document.
    pub fn horizon(&self) -> Result<Horizon, ParseError> {
        let elem = self
            .root
            .child("Horizonte")
            .ok_or_else(|| ParseError::MissingElement("Horizonte".to_string()))?;
        let v = elem.v()?;
        let (start_text, end_text) = v
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidHorizon(v.to_string()))?;
        let start = parse_wire_timestamp(start_text)?;
        let end = parse_wire_timestamp(end_text)?;
        Horizon::hourly(start, end)
    }

    fn series(&self) -> impl Iterator<Item = &XmlNode> {
        self.root.children_named("SeriesTemporales")
    }
}

/// The third child of a series block is its role element; its `v` attribute
/// is the series identifier (programming-unit code).
fn role_element(serie: &XmlNode) -> Result<&XmlNode, ParseError> {
    serie
        .children
        .get(2)
        .ok_or_else(|| ParseError::MissingElement("series role".to_string()))
}

fn role_sign(role: &XmlNode) -> Result<f64, ParseError> {
    match role.name.as_str() {
        GENERATION_ROLE => Ok(1.0),
        DEMAND_ROLE => Ok(-1.0),
        other => Err(ParseError::UnknownSeriesRole(other.to_string())),
    }
}

fn interval_quantity(intervalo: &XmlNode) -> Result<f64, ParseError> {
    let ctd = intervalo
        .child("Ctd")
        .ok_or_else(|| ParseError::MissingElement("Ctd".to_string()))?
        .v()?;
    ctd.trim()
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(ctd.to_string()))
}

fn interval_position(intervalo: &XmlNode) -> Result<usize, ParseError> {
    let pos = intervalo
        .child("Pos")
        .ok_or_else(|| ParseError::MissingElement("Pos".to_string()))?
        .v()?;
    let parsed = pos
        .trim()
        .parse::<usize>()
        .map_err(|_| ParseError::InvalidNumber(pos.to_string()))?;
    if parsed == 0 {
        // positions are 1-based on the wire
        return Err(ParseError::InvalidNumber(pos.to_string()));
    }
    Ok(parsed)
}

/// Locate a series' sub-horizon start on the axis
fn series_base(
    serie: &XmlNode,
    axis: &TimeAxis,
) -> Result<(usize, String), ParseError> {
    let periodo = serie
        .child("Periodo")
        .ok_or_else(|| ParseError::MissingElement("Periodo".to_string()))?;
    let interval_time = periodo
        .child("IntervaloTiempo")
        .ok_or_else(|| ParseError::MissingElement("IntervaloTiempo".to_string()))?
        .v()?;
    let start_text = interval_time.split('/').next().unwrap_or(interval_time);
    let start = parse_wire_timestamp(start_text)?;
    let base = axis
        .position_of(&start)
        .ok_or_else(|| ParseError::SeriesOutsideHorizon(start_text.to_string()))?;
    Ok((base, start_text.to_string()))
}

/// Parse an ESIOS programming-schedule document into a time-indexed table
///
/// One column per distinct series identifier, rows spanning the declared
/// horizon at hourly steps (or one row per calendar day when
/// `aggregate_daily` is set). Generation series contribute positive values,
/// demand series negative ones; a third role aborts with
/// [`ParseError::UnknownSeriesRole`]. Cells start at zero and writes
/// overwrite in place, except that the daily path writes each block's
/// summed quantities.
///
/// The row index is re-expressed in [`display_offset`](crate::display_offset)
/// as the final step; placement is by instant and unaffected.
pub fn parse_schedule(data: &[u8], aggregate_daily: bool) -> Result<Table, EsiosError> {
    let doc = EsiosDocument::parse(data)?;
    let axis = doc.horizon()?.axis();
    let series: Vec<&XmlNode> = doc.series().collect();
    tracing::debug!(
        series = series.len(),
        hours = axis.len(),
        "parsing schedule document"
    );

    // distinct identifiers, first-seen order
    let mut columns: Vec<String> = Vec::new();
    for serie in &series {
        let id = role_element(serie)?.v()?;
        if !columns.iter().any(|c| c == id) {
            columns.push(id.to_string());
        }
    }

    let index = if aggregate_daily {
        axis.every(HOURS_PER_DAY)
    } else {
        axis.stamps().to_vec()
    };
    let index = index
        .iter()
        .map(|ts| ts.with_timezone(&display_offset()))
        .collect();
    let mut table = Table::zeroed(index, columns);

    for serie in &series {
        let role = role_element(serie)?;
        let sign = role_sign(role)?;
        let id = role.v()?;
        let col = match table.column_position(id) {
            Some(c) => c,
            None => continue,
        };
        let (base, start_text) = series_base(serie, &axis)?;
        let periodo = serie
            .child("Periodo")
            .ok_or_else(|| ParseError::MissingElement("Periodo".to_string()))?;

        if aggregate_daily {
            // two-day rolling-schedule convention: offset 0 is today's
            // block, anything later belongs to the second day
            let row = if base == 0 { 0 } else { 1 };
            if row >= table.num_rows() {
                return Err(ParseError::SeriesOutsideHorizon(start_text).into());
            }
            let mut total = 0.0;
            for intervalo in periodo.children_named("Intervalo") {
                total += interval_quantity(intervalo)?;
            }
            table.set(row, col, sign * total);
        } else {
            for intervalo in periodo.children_named("Intervalo") {
                let pos = interval_position(intervalo)?;
                let quantity = interval_quantity(intervalo)?;
                let row = base + pos - 1;
                if row >= table.num_rows() {
                    return Err(ParseError::SeriesOutsideHorizon(format!(
                        "{} position {}",
                        start_text, pos
                    ))
                    .into());
                }
                table.set(row, col, sign * quantity);
            }
        }
    }
    Ok(table)
}

/// Parse an ESIOS price document into flat per-metric vectors
///
/// Series are kept only when both `TipoPrecio` and `TerminoCosteHorario`
/// are present and the cost term is one of [`PRICE_TERMS`]; everything else
/// is skipped without error. Quantities are scaled by [`PRICE_UNIT_SCALE`].
/// A kept series whose interval count differs from the horizon length fails
/// with [`ParseError::SeriesLengthMismatch`]. The returned index stays in
/// the document's native offsets.
pub fn parse_prices(data: &[u8]) -> Result<PriceSeries, EsiosError> {
    let doc = EsiosDocument::parse(data)?;
    let axis = doc.horizon()?.axis();
    let mut series = PriceSeries {
        index: axis.stamps().to_vec(),
        values: Default::default(),
    };

    for serie in doc.series() {
        let (tipo, termino) = match (
            serie.child("TipoPrecio"),
            serie.child("TerminoCosteHorario"),
        ) {
            (Some(t), Some(c)) => (t, c),
            _ => continue,
        };
        let term_code = termino.v()?;
        if !PRICE_TERMS.contains(&term_code) {
            continue;
        }
        let key = format!("{}_{}", tipo.v()?, term_code);

        let periodo = serie
            .child("Periodo")
            .ok_or_else(|| ParseError::MissingElement("Periodo".to_string()))?;
        let mut values = Vec::new();
        for intervalo in periodo.children_named("Intervalo") {
            values.push(interval_quantity(intervalo)? * PRICE_UNIT_SCALE);
        }
        if values.len() != axis.len() {
            return Err(ParseError::SeriesLengthMismatch {
                series: key,
                expected: axis.len(),
                actual: values.len(),
            }
            .into());
        }
        series.values.insert(key, values);
    }
    Ok(series)
}
