use anyhow::Result;
use tracing::{error, info};
use vds_engine::{DssTextEngine, LazyProcess};
use vds_sim::{run_circuit, CircuitSummary, LogProgress};

use crate::DatasetConfig;

/// Generate the dataset of every configured circuit, in order.
///
/// All circuits share one console session; each run starts by clearing the
/// previous circuit. The first failing circuit stops the run.
pub fn run_all(config: &DatasetConfig) -> Result<Vec<CircuitSummary>> {
    let channel = LazyProcess::new(config.engine.binary.clone(), config.engine.prompt.as_str());
    let mut engine =
        DssTextEngine::new(channel).with_max_control_iter(config.engine.max_control_iter);

    let plans = config.plans();
    let mut summaries = Vec::with_capacity(plans.len());
    for plan in &plans {
        info!(
            "Generating dataset for circuit {} from {}",
            plan.name,
            plan.master.display()
        );
        let mut progress = LogProgress::new(plan.name.as_str());
        match run_circuit(&mut engine, plan, &mut progress) {
            Ok(summary) => {
                for file in &summary.files {
                    info!("  {}", file.display());
                }
                summaries.push(summary);
            }
            Err(err) => {
                error!("{err}");
                return Err(err.into());
            }
        }
    }
    Ok(summaries)
}
