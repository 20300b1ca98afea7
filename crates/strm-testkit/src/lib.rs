//! Test support: an in-memory backing store and JSON fixture loaders.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use strm_state::{State, StreamChange};

mod store;

pub use store::{InMemoryBackingStore, StoredDataStream, StoredIndexTemplate};

pub fn load_state_json(path: &Path) -> Result<State> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read starting state: {}", path.display()))?;
    serde_json::from_str(&s).context("parse starting state json")
}

pub fn load_changes_json(path: &Path) -> Result<Vec<StreamChange>> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read change list: {}", path.display()))?;
    serde_json::from_str(&s).context("parse change list json")
}

pub fn load_store_json(path: &Path) -> Result<InMemoryBackingStore> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read facts snapshot: {}", path.display()))?;
    serde_json::from_str(&s).context("parse facts snapshot json")
}
