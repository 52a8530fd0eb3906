//! Phase and connection of a single-terminal power conversion element.
//!
//! A load's phase is derived from its phase count and the node suffixes of
//! its `bus1` property (`bus.1.2` is connected to nodes 1 and 2). A
//! line-to-line load is a one-phase load at √3 higher voltage but records two
//! voltage channels, so `meter_count` and `phase_count` differ.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{VdsError, VdsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    A,
    B,
    C,
    AB,
    AC,
    BC,
    ABC,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::A,
            Phase::B,
            Phase::C,
            Phase::AB,
            Phase::AC,
            Phase::BC,
            Phase::ABC,
        ]
    }

    /// Stable numeric code written to the labels table.
    pub fn value(&self) -> i32 {
        match self {
            Phase::A => 0,
            Phase::B => 1,
            Phase::C => 2,
            Phase::AB => 3,
            Phase::AC => 4,
            Phase::BC => 5,
            Phase::ABC => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
            Phase::AB => "AB",
            Phase::AC => "AC",
            Phase::BC => "BC",
            Phase::ABC => "ABC",
        }
    }

    /// Number of voltage channels a terminal monitor records for this phase.
    pub fn meter_count(&self) -> usize {
        match self {
            Phase::A | Phase::B | Phase::C => 1,
            Phase::AB | Phase::AC | Phase::BC => 2,
            Phase::ABC => 3,
        }
    }

    /// Conductor nodes (1-based) the phase is connected to.
    pub fn nodes(&self) -> &'static [usize] {
        match self {
            Phase::A => &[1],
            Phase::B => &[2],
            Phase::C => &[3],
            Phase::AB => &[1, 2],
            Phase::AC => &[1, 3],
            Phase::BC => &[2, 3],
            Phase::ABC => &[1, 2, 3],
        }
    }

    /// Determine the phase from the element's phase count and `bus1` value.
    ///
    /// Assumes the element is only connected at `bus1`, node order is
    /// irrelevant, and there are at most three conductors. A fourth (neutral)
    /// node, when present, is ignored.
    pub fn from_bus(phase_count: usize, bus1: &str) -> VdsResult<Self> {
        if phase_count == 3 {
            return Ok(Phase::ABC);
        }

        let mut nodes = BTreeSet::new();
        for part in bus1.trim().split('.').skip(1) {
            let node: usize = part.trim().parse().map_err(|_| {
                VdsError::Parse(format!("invalid node '{part}' in bus '{bus1}'"))
            })?;
            if node != 0 && node <= 3 {
                nodes.insert(node);
            }
        }

        Phase::all()
            .iter()
            .copied()
            .find(|phase| phase.nodes().iter().copied().collect::<BTreeSet<_>>() == nodes)
            .ok_or_else(|| {
                VdsError::Parse(format!(
                    "cannot determine phase of {phase_count}-phase element on bus '{bus1}'"
                ))
            })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Wye,
    Delta,
}

impl Connection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connection::Wye => "wye",
            Connection::Delta => "delta",
        }
    }
}

impl FromStr for Connection {
    type Err = VdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wye" | "y" | "ln" => Ok(Connection::Wye),
            "delta" | "d" | "ll" => Ok(Connection::Delta),
            other => Err(VdsError::Parse(format!(
                "'{other}' is an invalid connection type"
            ))),
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_phase_ignores_bus_suffix() {
        assert_eq!(Phase::from_bus(3, "sourcebus").unwrap(), Phase::ABC);
        assert_eq!(Phase::ABC.meter_count(), 3);
    }

    #[test]
    fn test_single_and_line_to_line() {
        assert_eq!(Phase::from_bus(1, "b12.2").unwrap(), Phase::B);
        assert_eq!(Phase::from_bus(1, "b12.3.1").unwrap(), Phase::AC);
        assert_eq!(Phase::AC.meter_count(), 2);
        assert_eq!(Phase::from_bus(2, "b12.2.3.0").unwrap(), Phase::BC);
    }

    #[test]
    fn test_unresolvable_bus() {
        assert!(Phase::from_bus(1, "b12").is_err());
        assert!(Phase::from_bus(1, "b12.x").is_err());
    }

    #[test]
    fn test_phase_values_are_stable() {
        let values: Vec<i32> = Phase::all().iter().map(Phase::value).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_connection_aliases() {
        assert_eq!("Y".parse::<Connection>().unwrap(), Connection::Wye);
        assert_eq!("ln".parse::<Connection>().unwrap(), Connection::Wye);
        assert_eq!(" Delta ".parse::<Connection>().unwrap(), Connection::Delta);
        assert_eq!("LL".parse::<Connection>().unwrap(), Connection::Delta);
        assert!("zigzag".parse::<Connection>().is_err());
    }
}
