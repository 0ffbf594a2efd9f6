use serde_json::Value;
use tracing::{debug, info, warn};

use super::migration::{SchemaVersion, migrate, parse_number, record_from_map};
use super::query::QueryParams;
use super::store::KeyValueStore;
use crate::core::{Field, PrimaryInputs, clamp_non_negative};

/// Key under which the pre-URL calculator kept its inputs.
pub const LEGACY_STORAGE_KEY: &str = "scottishPropertyCalculator";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Query,
    MigratedBlob(SchemaVersion),
    Defaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub inputs: PrimaryInputs,
    pub source: LoadSource,
}

#[derive(Debug, Clone)]
pub struct StateCodec {
    defaults: PrimaryInputs,
    storage_key: String,
}

impl Default for StateCodec {
    fn default() -> Self {
        Self::new(PrimaryInputs::default())
    }
}

impl StateCodec {
    pub fn new(defaults: PrimaryInputs) -> Self {
        Self {
            defaults,
            storage_key: LEGACY_STORAGE_KEY.to_string(),
        }
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn defaults(&self) -> &PrimaryInputs {
        &self.defaults
    }

    pub fn has_transport_keys(query: &QueryParams) -> bool {
        Field::ALL.iter().any(|f| query.contains(f.short_key()))
    }

    /// Reads every transport key present, falling back to the default for
    /// absent or unparsable values.
    pub fn decode_query(&self, query: &QueryParams) -> PrimaryInputs {
        let mut inputs = self.defaults;
        for field in Field::ALL {
            let Some(raw) = query.get(field.short_key()) else {
                continue;
            };
            match parse_number(raw) {
                Some(value) => field.set(&mut inputs, clamp_non_negative(value)),
                None => debug!(key = field.short_key(), raw, "unparsable value, using default"),
            }
        }
        inputs
    }

    /// Parses a persisted blob of any schema generation. `None` when the blob
    /// is not a JSON object.
    pub fn decode_blob(&self, raw: &str) -> Option<(SchemaVersion, PrimaryInputs)> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(record)) => {
                let (version, migrated) = migrate(record);
                Some((version, record_from_map(&migrated, &self.defaults)))
            }
            Ok(other) => {
                warn!(kind = json_kind(&other), "persisted blob is not an object");
                None
            }
            Err(e) => {
                warn!(error = %e, "persisted blob is not valid JSON");
                None
            }
        }
    }

    /// Minimal transport form: only fields that differ from the defaults.
    pub fn encode(&self, inputs: &PrimaryInputs) -> QueryParams {
        let mut query = QueryParams::new();
        for field in Field::ALL {
            let value = field.get(inputs);
            if value != field.get(&self.defaults) {
                query.set(field.short_key(), value.to_string());
            }
        }
        query
    }

    /// Rewrites the transport keys of `query` to describe `inputs`, leaving
    /// unrelated keys alone.
    pub fn persist(&self, query: &mut QueryParams, inputs: &PrimaryInputs) {
        strip_transport_keys(query);
        for (key, value) in self.encode(inputs).iter() {
            query.set(key, value);
        }
    }

    /// Query parameters win outright; otherwise a legacy blob is migrated
    /// into the query and deleted; otherwise the defaults apply.
    pub fn load(&self, query: &mut QueryParams, store: &mut dyn KeyValueStore) -> LoadOutcome {
        if Self::has_transport_keys(query) {
            return LoadOutcome {
                inputs: self.decode_query(query),
                source: LoadSource::Query,
            };
        }

        let raw = match store.get(&self.storage_key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "could not read persisted blob, ignoring it");
                None
            }
        };
        let Some(raw) = raw else {
            return self.defaults_outcome();
        };

        let decoded = self.decode_blob(&raw);
        if let Err(e) = store.remove(&self.storage_key) {
            warn!(error = %e, key = %self.storage_key, "could not delete persisted blob");
        }

        match decoded {
            Some((version, inputs)) => {
                self.persist(query, &inputs);
                info!(from = ?version, query = %query, "migrated persisted blob to query parameters");
                LoadOutcome {
                    inputs,
                    source: LoadSource::MigratedBlob(version),
                }
            }
            None => self.defaults_outcome(),
        }
    }

    /// Drops every transport key, which decodes back to the defaults.
    pub fn reset(&self, query: &mut QueryParams) -> PrimaryInputs {
        strip_transport_keys(query);
        self.defaults
    }

    fn defaults_outcome(&self) -> LoadOutcome {
        LoadOutcome {
            inputs: self.defaults,
            source: LoadSource::Defaults,
        }
    }
}

fn strip_transport_keys(query: &mut QueryParams) {
    query.retain(|key| Field::from_short_key(key).is_none());
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
