use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use strm_plan::ExecutionPlan;
use strm_state::{InFlightRegistry, PassContext, RecordPlan, State};
use strm_testkit::{load_changes_json, load_state_json, load_store_json, InMemoryBackingStore};
use tracing::info;

use super::{check_unused_keys, init_tracing, load_config, UnusedKeys};

pub struct PlanArgs {
    pub starting: Option<PathBuf>,
    pub changes: PathBuf,
    pub facts: Option<PathBuf>,
    pub config_paths: Vec<PathBuf>,
    pub unused_keys: UnusedKeys,
    pub simulate: bool,
    pub strict: bool,
}

#[derive(Serialize)]
struct PlanReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_hash: Option<&'a str>,
    plan: &'a ExecutionPlan,
    records: &'a [RecordPlan],
    rejected: Vec<String>,
    /// State the next pass starts from once the plan is applied.
    next_state: State,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<InMemoryBackingStore>,
}

pub fn run(args: PlanArgs) -> Result<()> {
    let (loaded, config) = load_config(&args.config_paths)?;
    init_tracing(config.logging.filter.as_deref());
    if let Some(loaded) = &loaded {
        check_unused_keys(loaded, args.unused_keys)?;
        info!(config_hash = %loaded.config_hash, "config loaded");
    }

    let starting = match &args.starting {
        Some(path) => load_state_json(path)?,
        None => State::default(),
    };
    let changes = load_changes_json(&args.changes)?;
    let store = match &args.facts {
        Some(path) => load_store_json(path)?,
        None => InMemoryBackingStore::new(),
    };

    let registry = InFlightRegistry::new();
    let ctx = PassContext::new(&store, &config.deployment);
    let outcome = starting
        .attempt_changes(changes, &ctx, &registry)
        .context("reconciliation pass aborted")?;

    let simulated = args.simulate.then(|| {
        let mut applied = store.clone();
        applied.apply_plan(&outcome.plan);
        applied
    });

    let report = PlanReport {
        config_hash: loaded.as_ref().map(|l| l.config_hash.as_str()),
        plan: &outcome.plan,
        records: &outcome.records,
        rejected: outcome.rejected.iter().map(ToString::to_string).collect(),
        next_state: outcome.desired_state.committed(),
        store: simulated,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize plan report")?
    );

    if args.strict && !outcome.rejected.is_empty() {
        bail!(
            "REJECTED_CHANGES: {} change(s) rejected; first: {}",
            outcome.rejected.len(),
            report.rejected[0]
        );
    }
    Ok(())
}
