//! End-to-end run for one circuit: load, bind, simulate, write.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use vds_core::{ProfileUnits, Stage, VdsError, VdsResult};
use vds_engine::PowerFlowEngine;
use vds_io::{load_profiles, DatasetWriter, OutputFormat};

use crate::{bind, simulate, StepObserver};

/// Everything needed to produce the dataset of one circuit.
#[derive(Debug, Clone)]
pub struct CircuitPlan {
    /// Prefix of every output file.
    pub name: String,
    /// Master DSS file that compiles the circuit.
    pub master: PathBuf,
    /// Directory holding the circuit's load profiles.
    pub profiles: PathBuf,
    /// Transformers monitored on both windings; empty for none.
    pub transformers: Vec<String>,
    pub units: ProfileUnits,
    pub out_dir: PathBuf,
    pub format: OutputFormat,
}

/// Result of a successful circuit run.
#[derive(Debug, Clone)]
pub struct CircuitSummary {
    pub circuit: String,
    pub loads: usize,
    pub channels: usize,
    pub files: Vec<PathBuf>,
}

/// A circuit run that stopped before completing.
#[derive(Debug, Error)]
#[error("circuit '{circuit}' failed while {stage}: {source}")]
pub struct PipelineError {
    pub circuit: String,
    /// Stage that was active when the error occurred.
    pub stage: Stage,
    #[source]
    pub source: VdsError,
}

/// Run every stage for `plan` against `engine`.
///
/// Profiles are read and validated before the engine is touched, so a bad
/// profile fails before the circuit is compiled. Nothing is written to the
/// output directory unless every stage succeeds.
pub fn run_circuit<E>(
    engine: &mut E,
    plan: &CircuitPlan,
    progress: &mut dyn StepObserver,
) -> Result<CircuitSummary, PipelineError>
where
    E: PowerFlowEngine + ?Sized,
{
    let mut stage = Stage::Idle;
    match run_stages(engine, plan, &mut stage, progress) {
        Ok(summary) => Ok(summary),
        Err(source) => {
            let failed_at = stage;
            // Failed is reachable from every live stage
            let _ = stage.advance(Stage::Failed);
            Err(PipelineError {
                circuit: plan.name.clone(),
                stage: failed_at,
                source,
            })
        }
    }
}

fn run_stages<E>(
    engine: &mut E,
    plan: &CircuitPlan,
    stage: &mut Stage,
    progress: &mut dyn StepObserver,
) -> VdsResult<CircuitSummary>
where
    E: PowerFlowEngine + ?Sized,
{
    enter(stage, Stage::Loading, &plan.name)?;
    let profiles = load_profiles(&plan.profiles)?;
    let mut writer = DatasetWriter::new(&plan.out_dir, &plan.name, plan.format)?;
    let master = resolve_master(&plan.master)?;
    engine.load_circuit(&master)?;

    enter(stage, Stage::Binding, &plan.name)?;
    let loads = bind(engine, &profiles, plan.units)?;

    info!("{}: simulating", plan.name);
    let output = {
        let mut observer = |step: usize, total: usize| -> VdsResult<()> {
            stage.advance(Stage::Simulating { step })?;
            progress.on_step(step, total)
        };
        simulate(engine, &loads, &plan.transformers, &mut observer)?
    };

    enter(stage, Stage::Writing, &plan.name)?;
    writer.write_voltage_table("load", &output.loads)?;
    if let Some(table) = &output.transformers {
        writer.write_voltage_table("transformer", table)?;
    }
    let labels: Vec<_> = loads.iter().map(|load| load.label()).collect();
    writer.write_labels(&labels)?;
    let shape_names: Vec<String> = loads.iter().map(|load| load.loadshape().object()).collect();
    writer.write_loadshapes(
        shape_names
            .iter()
            .zip(&loads)
            .map(|(name, load)| (name.as_str(), load.profile.values())),
    )?;
    writer.write_channel_map(output.loads.channel_map())?;
    let files = writer.commit()?;

    enter(stage, Stage::Done, &plan.name)?;
    Ok(CircuitSummary {
        circuit: plan.name.clone(),
        loads: loads.len(),
        channels: output.loads.width(),
        files,
    })
}

fn enter(stage: &mut Stage, next: Stage, circuit: &str) -> VdsResult<()> {
    stage.advance(next)?;
    info!("{circuit}: {stage}");
    Ok(())
}

/// Absolute path of the master file; the engine resolves relative paths
/// against its own working directory.
fn resolve_master(master: &Path) -> VdsResult<PathBuf> {
    if !master.is_file() {
        return Err(VdsError::Config(format!(
            "circuit master file '{}' does not exist",
            master.display()
        )));
    }
    let resolved = if master.is_absolute() {
        master.to_path_buf()
    } else {
        std::env::current_dir()?.join(master)
    };
    debug!("Resolved master file {}", resolved.display());
    Ok(resolved)
}
