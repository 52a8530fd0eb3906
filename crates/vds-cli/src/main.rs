use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use vds_cli::{run_all, Cli, DatasetConfig};

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let config = match DatasetConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration failed: {err:#}");
            std::process::exit(1);
        }
    };

    match run_all(&config) {
        Ok(summaries) => {
            let loads: usize = summaries.iter().map(|s| s.loads).sum();
            info!(
                "Generated {} circuit datasets covering {loads} loads in {}",
                summaries.len(),
                config.output.dir.display()
            );
        }
        Err(_) => std::process::exit(1),
    }
}
