//! # vds-sim: Profile Binding and Yearly Simulation
//!
//! Drives a [`PowerFlowEngine`](vds_engine::PowerFlowEngine) through one
//! year of 15-minute timesteps and hands the recorded voltages to the
//! dataset writer.
//!
//! ```text
//! Loading ──> Binding ──> Simulating(0..35040) ──> Writing ──> Done
//! load_profiles  bind       simulate                DatasetWriter
//! ```
//!
//! [`run_circuit`] walks these stages for one [`CircuitPlan`] and reports
//! the stage a failure happened in through [`PipelineError`].

pub mod binder;
pub mod driver;
pub mod pipeline;

pub use binder::{bind, BoundLoad};
pub use driver::{simulate, LogProgress, SimulationOutput, StepObserver};
pub use pipeline::{run_circuit, CircuitPlan, CircuitSummary, PipelineError};
