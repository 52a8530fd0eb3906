//! OpenDSS text command builders and reply parsers.
//!
//! Property queries use `? class.element.property`, edits use
//! `class.element.property=value`. The `voltages` command replies with
//! comma-separated magnitude/angle pairs for the active bus, one pair per
//! node in the bus's node order. That order is not necessarily 1, 2, 3 and
//! a bus only lists the nodes it defines, so node numbers come from the
//! `export voltages` file, which writes each bus's nodes in the same order.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use vds_core::ObjectName;

use crate::{EngineError, EngineResult};

/// Reply fragments the simulator uses to report a failed command.
const ERROR_MARKERS: &[&str] = &[
    "error",
    "property unknown",
    "not found",
    "did not converge",
    "unknown command",
];

pub fn clear() -> String {
    "clearall".to_string()
}

pub fn redirect(master: &Path) -> String {
    format!("redirect ({})", master.display())
}

/// Put the solver in single-snapshot mode so each `solve` is one timestep.
pub fn snapshot_mode(max_control_iter: u32) -> String {
    format!("set mode=snapshot maxcontroliter={max_control_iter}")
}

pub fn solve() -> String {
    "solve".to_string()
}

pub fn export_loads() -> String {
    "export loads".to_string()
}

pub fn export_voltages() -> String {
    "export voltages".to_string()
}

pub fn query(element: &ObjectName, key: &str) -> String {
    format!("? {}.{key}", element.object())
}

pub fn set_load_kw(load: &str, kw: f64) -> String {
    format!("load.{load}.kW={kw}")
}

/// Make `element`'s terminal the active terminal (and its bus the active bus).
pub fn select(element: &ObjectName, terminal: u32) -> String {
    format!("select {} {terminal}", element.object())
}

pub fn voltages() -> String {
    "voltages".to_string()
}

/// Turn a reply containing an error marker into [`EngineError::Command`].
pub fn check_reply(command: &str, reply: String) -> EngineResult<String> {
    let lower = reply.to_lowercase();
    if ERROR_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return Err(EngineError::Command {
            command: command.to_string(),
            message: reply.trim().to_string(),
        });
    }
    Ok(reply)
}

/// Bus names from a terminal bus property.
///
/// Accepts a single bus (`bus1` replies such as `b1.2.3`) or a bracketed
/// list (`buses` replies such as `[hv.1.2.3, lv.1.2.3, ]`) and strips the
/// node suffixes.
pub fn parse_bus_names(reply: &str) -> Vec<String> {
    reply
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|bus| bus.split('.').next().unwrap_or(bus).to_string())
        .collect()
}

/// Check the reply to an `export` command, which is the path of the written file.
///
/// Paths may legitimately contain error markers, so only an empty reply is
/// rejected here; a failed export surfaces when the named file cannot be opened.
pub fn check_export_reply(command: &str, reply: String) -> EngineResult<String> {
    if reply.trim().is_empty() {
        return Err(EngineError::Command {
            command: command.to_string(),
            message: "no export file reported".to_string(),
        });
    }
    Ok(reply)
}

/// Parse a numeric property reply such as `0.208` or `[ 12.5]`.
pub fn parse_number(command: &str, reply: &str) -> EngineResult<f64> {
    reply
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .parse()
        .map_err(|_| EngineError::Parse {
            command: command.to_string(),
            reply: reply.to_string(),
        })
}

/// Magnitudes from a `voltages` reply (`mag, angle, mag, angle, ...`).
pub fn parse_voltage_magnitudes(command: &str, reply: &str) -> EngineResult<Vec<f64>> {
    let parse_err = || EngineError::Parse {
        command: command.to_string(),
        reply: reply.to_string(),
    };
    let values = reply
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|_| parse_err()))
        .collect::<EngineResult<Vec<f64>>>()?;
    if values.is_empty() || values.len() % 2 != 0 {
        return Err(parse_err());
    }
    Ok(values.iter().step_by(2).copied().collect())
}

/// Node numbers of every bus from an `export voltages` CSV.
///
/// Rows are `bus, basekV` followed by `node, magnitude, angle, pu` groups.
/// Buses with fewer nodes than the widest bus are padded with zero groups,
/// which are skipped. Keys are case-folded bus names.
pub fn parse_exported_bus_nodes<R: Read>(reader: R) -> EngineResult<HashMap<String, Vec<u32>>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut buses = HashMap::new();
    for record in csv.records() {
        let record = record.map_err(|e| EngineError::Protocol(format!("voltage export: {e}")))?;
        let Some(bus) = record.get(0).map(|s| s.trim_matches('"')).filter(|s| !s.is_empty())
        else {
            continue;
        };
        let mut nodes = Vec::new();
        for field in record.iter().skip(2).step_by(4) {
            if field.is_empty() {
                continue;
            }
            let node: u32 = field.parse().map_err(|_| {
                EngineError::Protocol(format!("voltage export: invalid node '{field}' for bus '{bus}'"))
            })?;
            if node != 0 {
                nodes.push(node);
            }
        }
        buses.insert(bus.to_lowercase(), nodes);
    }
    Ok(buses)
}

/// Load names from an `export loads` CSV, in file order.
///
/// The first column holds the element name, with or without a `Load.`
/// prefix.
pub fn parse_exported_load_names<R: Read>(reader: R) -> EngineResult<Vec<String>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut names = Vec::new();
    for record in csv.records() {
        let record = record.map_err(|e| EngineError::Protocol(format!("load export: {e}")))?;
        let Some(first) = record.get(0).filter(|s| !s.is_empty()) else {
            continue;
        };
        let name = match first.split_once('.') {
            Some((class, element)) if class.eq_ignore_ascii_case("load") => element,
            _ => first,
        };
        names.push(name.trim_matches('"').to_string());
    }
    Ok(names)
}
