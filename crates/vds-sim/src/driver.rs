//! Timestep loop: apply profiles, solve, read voltages.
//!
//! Every step sets each bound load's kW, issues one solve, and records the
//! voltage magnitudes at terminal 1 of every load. Channels are picked by
//! node number, so a load reads the nodes it is connected to whatever nodes
//! its bus defines and in whatever order the bus lists them. Steps run strictly in
//! order against the single engine session. Any engine failure ends the run
//! with the step index attached and no partial table.

use std::time::Instant;

use tracing::{debug, info};
use vds_core::{
    ObjectName, VdsError, VdsResult, VoltageTable, CHANNEL_DELIMITER, TIMESTEPS_PER_YEAR,
};
use vds_engine::{NodeVoltage, PowerFlowEngine};

use crate::BoundLoad;

/// Transformer windings monitored for the transformer table.
const WINDINGS: [(&str, u32); 2] = [("primary", 1), ("secondary", 2)];

/// Nodes recorded per transformer winding.
const WINDING_NODES: [usize; 3] = [1, 2, 3];

/// Receives a callback before each timestep is simulated.
pub trait StepObserver {
    fn on_step(&mut self, step: usize, total: usize) -> VdsResult<()>;
}

impl<F> StepObserver for F
where
    F: FnMut(usize, usize) -> VdsResult<()>,
{
    fn on_step(&mut self, step: usize, total: usize) -> VdsResult<()> {
        self(step, total)
    }
}

/// Logs progress every 5% of the run.
#[derive(Debug)]
pub struct LogProgress {
    circuit: String,
    started: Instant,
}

impl LogProgress {
    pub fn new(circuit: impl Into<String>) -> Self {
        Self {
            circuit: circuit.into(),
            started: Instant::now(),
        }
    }
}

impl StepObserver for LogProgress {
    fn on_step(&mut self, step: usize, total: usize) -> VdsResult<()> {
        let every = (total / 20).max(1);
        if step > 0 && step % every == 0 {
            info!(
                "{}: simulated {step}/{total} timesteps ({:.0}%) in {:.1}s",
                self.circuit,
                step as f64 * 100.0 / total as f64,
                self.started.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }
}

/// Tables produced by a complete run.
#[derive(Debug)]
pub struct SimulationOutput {
    pub loads: VoltageTable,
    /// Present when transformers were monitored.
    pub transformers: Option<VoltageTable>,
}

/// Simulate every timestep of the year.
pub fn simulate<E>(
    engine: &mut E,
    loads: &[BoundLoad<'_>],
    transformers: &[String],
    observer: &mut dyn StepObserver,
) -> VdsResult<SimulationOutput>
where
    E: PowerFlowEngine + ?Sized,
{
    let total = TIMESTEPS_PER_YEAR;
    let load_elements: Vec<ObjectName> = loads.iter().map(BoundLoad::element).collect();
    let load_columns: Vec<String> = load_elements.iter().map(ObjectName::object).collect();
    let mut load_table = VoltageTable::for_elements(
        load_columns
            .iter()
            .zip(loads)
            .map(|(column, load)| (column.as_str(), load.meter_count())),
    )?;

    let xfmr_elements: Vec<ObjectName> =
        transformers.iter().map(ObjectName::transformer).collect();
    let winding_names: Vec<String> = xfmr_elements
        .iter()
        .flat_map(|xfmr| {
            WINDINGS.into_iter().map(move |(winding, _)| {
                format!("{}{CHANNEL_DELIMITER}{winding}", xfmr.object())
            })
        })
        .collect();
    let mut xfmr_table = if transformers.is_empty() {
        None
    } else {
        Some(VoltageTable::for_elements(
            winding_names
                .iter()
                .map(|n| (n.as_str(), WINDING_NODES.len())),
        )?)
    };

    debug!(
        "Simulating {total} timesteps for {} loads and {} transformers",
        loads.len(),
        transformers.len()
    );
    let mut load_row = Vec::with_capacity(load_table.width());
    let mut xfmr_row = Vec::with_capacity(winding_names.len() * WINDING_NODES.len());
    for step in 0..total {
        observer.on_step(step, total)?;

        for load in loads {
            engine
                .set_load_kw(&load.name, load.kw_at(step))
                .map_err(|e| VdsError::from(e).at_step(step))?;
        }
        engine
            .solve()
            .map_err(|e| VdsError::from(e).at_step(step))?;

        load_row.clear();
        for ((load, element), column) in loads.iter().zip(&load_elements).zip(&load_columns) {
            let readings = engine
                .node_voltages(element, 1)
                .map_err(|e| VdsError::from(e).at_step(step))?;
            pick_nodes(column, load.phase.nodes(), &readings, &mut load_row)?;
        }
        load_table.push_row(&load_row)?;

        if let Some(table) = xfmr_table.as_mut() {
            xfmr_row.clear();
            for (element, names) in xfmr_elements.iter().zip(winding_names.chunks(WINDINGS.len())) {
                for ((_, terminal), name) in WINDINGS.into_iter().zip(names) {
                    let readings = engine
                        .node_voltages(element, terminal)
                        .map_err(|e| VdsError::from(e).at_step(step))?;
                    pick_nodes(name, &WINDING_NODES, &readings, &mut xfmr_row)?;
                }
            }
            table.push_row(&xfmr_row)?;
        }
    }

    Ok(SimulationOutput {
        loads: load_table,
        transformers: xfmr_table,
    })
}

/// Append the magnitudes at `nodes`, in that order, to `row`.
///
/// Fails with [`VdsError::ChannelMismatch`] when the bus does not define
/// every requested node; `row` is left unchanged then.
fn pick_nodes(
    element: &str,
    nodes: &[usize],
    readings: &[NodeVoltage],
    row: &mut Vec<f64>,
) -> VdsResult<()> {
    let picked: Vec<f64> = nodes
        .iter()
        .filter_map(|&node| {
            readings
                .iter()
                .find(|r| r.node as usize == node)
                .map(|r| r.magnitude)
        })
        .collect();
    if picked.len() != nodes.len() {
        return Err(VdsError::ChannelMismatch {
            element: element.to_string(),
            expected: nodes.len(),
            actual: picked.len(),
        });
    }
    row.extend(picked);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vds_core::{Connection, LoadProfile, Phase, ProfileUnits};

    fn load(profile: &LoadProfile, phase: Phase) -> BoundLoad<'_> {
        BoundLoad {
            name: profile.load().to_string(),
            profile,
            phase,
            connection: Connection::Wye,
            phase_count: 1,
            base_kv: 0.24,
            nominal_kw: 2.0,
            units: ProfileUnits::Kw,
        }
    }

    fn bus(readings: &[(u32, f64)]) -> Vec<NodeVoltage> {
        readings
            .iter()
            .map(|&(node, magnitude)| NodeVoltage::new(node, magnitude))
            .collect()
    }

    fn pick(phase: Phase, readings: &[(u32, f64)]) -> VdsResult<Vec<f64>> {
        let mut row = Vec::new();
        pick_nodes("load.l1", phase.nodes(), &bus(readings), &mut row)?;
        Ok(row)
    }

    #[test]
    fn test_single_node_on_three_phase_bus() {
        let picked = pick(Phase::B, &[(1, 120.0), (2, 119.0), (3, 118.0)]).unwrap();
        assert_eq!(picked, vec![119.0]);
    }

    #[test]
    fn test_phase_b_on_bc_bus() {
        let picked = pick(Phase::B, &[(2, 222.0), (3, 333.0)]).unwrap();
        assert_eq!(picked, vec![222.0]);
    }

    #[test]
    fn test_phase_c_on_ac_bus() {
        let picked = pick(Phase::C, &[(1, 111.0), (3, 333.0)]).unwrap();
        assert_eq!(picked, vec![333.0]);
    }

    #[test]
    fn test_line_to_line_load_on_permuted_bus() {
        let picked = pick(Phase::BC, &[(3, 239.0), (2, 240.0)]).unwrap();
        assert_eq!(picked, vec![240.0, 239.0]);
    }

    #[test]
    fn test_missing_node_is_a_mismatch() {
        let err = pick(Phase::ABC, &[(1, 120.0), (2, 119.0)]).unwrap_err();
        assert!(matches!(
            err,
            VdsError::ChannelMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        let err = pick(Phase::A, &[(2, 120.0), (3, 119.0)]).unwrap_err();
        assert!(err.to_string().contains("load.l1"));
    }

    #[test]
    fn test_multiplier_units() {
        let profile = LoadProfile::new("l1", vec![0.5; TIMESTEPS_PER_YEAR]).unwrap();
        let mut bound = load(&profile, Phase::A);
        assert_eq!(bound.kw_at(10), 0.5);
        bound.units = ProfileUnits::Multiplier;
        assert_eq!(bound.kw_at(10), 1.0);
    }
}
