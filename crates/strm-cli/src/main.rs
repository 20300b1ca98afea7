use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::plan::PlanArgs;
use commands::UnusedKeys;

#[derive(Parser)]
#[command(name = "strm")]
#[command(about = "Stream-state reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> deployment -> local overrides)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Dry-run one reconciliation pass and print the plan as JSON
    Plan {
        /// Starting state JSON. Omit to start from an empty state.
        #[arg(long)]
        starting: Option<PathBuf>,

        /// Change list JSON: [{"upsert": <definition>} | {"delete": "<name>"}]
        #[arg(long)]
        changes: PathBuf,

        /// Backing-store facts snapshot JSON. Omit for an empty store.
        #[arg(long)]
        facts: Option<PathBuf>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        /// What to do with config keys the reconciler does not read
        #[arg(long, value_enum, default_value_t = UnusedKeys::Warn)]
        unused_keys: UnusedKeys,

        /// Apply the plan to the facts snapshot and include the result
        #[arg(long, default_value_t = false)]
        simulate: bool,

        /// Exit non-zero when any record is rejected
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            commands::init_tracing(None);
            let loaded = strm_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Plan {
            starting,
            changes,
            facts,
            config_paths,
            unused_keys,
            simulate,
            strict,
        } => commands::plan::run(PlanArgs {
            starting,
            changes,
            facts,
            config_paths,
            unused_keys,
            simulate,
            strict,
        })?,
    }

    Ok(())
}
