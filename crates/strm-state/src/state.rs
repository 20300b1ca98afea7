use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strm_schemas::StreamDefinition;

use crate::record::StreamRecord;

/// Immutable snapshot of every managed stream, keyed by name.
///
/// Every derivation returns a new snapshot with a bumped version. The version
/// is an opaque token for the persistence layer's optimistic concurrency; the
/// engine itself never compares versions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StateDocument", into = "StateDocument")]
pub struct State {
    version: u64,
    records: BTreeMap<String, StreamRecord>,
}

impl State {
    pub fn from_records(records: impl IntoIterator<Item = StreamRecord>) -> Self {
        Self {
            version: 0,
            records: records
                .into_iter()
                .map(|r| (r.name().to_string(), r))
                .collect(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, name: &str) -> Option<&StreamRecord> {
        self.records.get(name)
    }

    /// Like [`State::get`] but hides records deleted in this pass.
    pub fn live(&self, name: &str) -> Option<&StreamRecord> {
        self.get(name).filter(|r| !r.is_deleted())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &StreamRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn with_record(&self, record: StreamRecord) -> State {
        let mut records = self.records.clone();
        records.insert(record.name().to_string(), record);
        State {
            version: self.version + 1,
            records,
        }
    }

    pub fn without(&self, name: &str) -> State {
        let mut records = self.records.clone();
        records.remove(name);
        State {
            version: self.version + 1,
            records,
        }
    }

    /// The snapshot the next pass starts from once this one is applied:
    /// deleted records drop out and upserted definitions become their own
    /// base. Untouched records are carried over as loaded.
    pub fn committed(&self) -> State {
        State {
            version: self.version + 1,
            records: self
                .records
                .iter()
                .filter(|(_, r)| !r.is_deleted())
                .map(|(name, r)| (name.clone(), r.committed()))
                .collect(),
        }
    }
}

// -----------------------------
// Persisted form
// -----------------------------

#[derive(Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    streams: Vec<StreamDocument>,
}

#[derive(Serialize, Deserialize)]
struct StreamDocument {
    definition: StreamDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_applied: Option<StreamDefinition>,
    #[serde(default)]
    customized: bool,
}

impl From<StateDocument> for State {
    fn from(doc: StateDocument) -> Self {
        let records = doc.streams.into_iter().map(|s| {
            StreamRecord::persisted(s.definition, s.last_applied, s.customized)
        });
        State {
            version: doc.version,
            ..State::from_records(records)
        }
    }
}

impl From<State> for StateDocument {
    fn from(state: State) -> Self {
        StateDocument {
            version: state.version,
            streams: state
                .records
                .into_values()
                .filter(|r| !r.is_deleted())
                .map(|r| StreamDocument {
                    customized: r.customized(),
                    last_applied: r.last_applied().cloned(),
                    definition: r.definition().clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strm_schemas::{ClassicDefinition, Lifecycle};

    fn classic(name: &str) -> StreamRecord {
        StreamRecord::new(
            ClassicDefinition {
                name: name.into(),
                processing: vec![],
                lifecycle: Lifecycle::Inherit,
            }
            .into(),
        )
    }

    #[test]
    fn derivations_leave_the_original_untouched() {
        let start = State::from_records([classic("logs-a")]);
        let next = start.with_record(classic("logs-b"));

        assert_eq!(start.len(), 1);
        assert_eq!(next.len(), 2);
        assert_eq!(next.version(), start.version() + 1);
    }

    #[test]
    fn commit_moves_the_base_only_for_upserted_records() {
        let drifted = StreamRecord::persisted(
            ClassicDefinition {
                name: "logs-a".into(),
                processing: vec![],
                lifecycle: Lifecycle::Dsl {
                    data_retention: Some("30d".into()),
                },
            }
            .into(),
            Some(classic("logs-a").definition().clone()),
            true,
        );
        let start = State::from_records([drifted.clone()]);

        let next = start.committed();

        let record = next.get("logs-a").unwrap();
        assert_eq!(record.last_applied(), drifted.last_applied());
        assert!(record.customized());
        assert_eq!(record.definition(), drifted.definition());
    }

    #[test]
    fn document_form_parses() {
        let json = r#"{
            "version": 7,
            "streams": [
                { "definition": { "kind": "classic", "name": "logs-a", "lifecycle": { "type": "inherit" } },
                  "customized": true }
            ]
        }"#;

        let state: State = serde_json::from_str(json).unwrap();
        assert_eq!(state.version(), 7);
        let record = state.get("logs-a").unwrap();
        assert!(record.customized());
        assert!(record.last_applied().is_none());
    }
}
