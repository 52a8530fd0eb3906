//! Boundary to the external OpenDSS circuit simulator.
//!
//! The simulator is treated as an opaque, stateful, synchronous command
//! interpreter. This crate layers three pieces over it:
//!
//! ```text
//! vds-sim ──> PowerFlowEngine ──> DssTextEngine<C> ──> CommandChannel
//!                                                        └─ DssProcess (opendsscmd)
//! ```
//!
//! - [`PowerFlowEngine`] is the operation set the pipeline needs: load a
//!   circuit, list and query loads, set a load's kW, solve, and read the
//!   voltage magnitude of each node at a terminal.
//! - [`DssTextEngine`] implements it with OpenDSS text commands.
//! - [`CommandChannel`] carries one command and returns its result string;
//!   [`DssProcess`] does so over the stdin/stdout of an `opendsscmd` child.
//!
//! The simulator keeps a single mutable circuit. Every type here takes
//! `&mut self` and none of them are `Sync`-shared: exactly one caller owns a
//! session at a time.
//!
//! A solve that never returns blocks its caller; there is no timeout. This
//! mirrors the simulator's own behavior, where a stuck solution also freezes
//! its progress display.

pub mod channel;
pub mod commands;
pub mod engine;
pub mod error;
pub mod process;

pub use channel::CommandChannel;
pub use engine::{DssTextEngine, NodeVoltage, PowerFlowEngine};
pub use error::{EngineError, EngineResult};
pub use process::{DssProcess, LazyProcess};

/// Default name of the OpenDSS console executable.
pub const DEFAULT_BINARY: &str = "opendsscmd";

/// Default interactive prompt printed by the console before each command.
pub const DEFAULT_PROMPT: &str = ">>";
