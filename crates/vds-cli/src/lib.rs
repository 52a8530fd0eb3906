pub mod cli;
pub mod config;
pub mod run;

pub use cli::Cli;
pub use config::DatasetConfig;
pub use run::run_all;
