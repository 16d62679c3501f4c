use std::collections::BTreeMap;

use serde_json::Value;
use shared::{
    domain::{EntityId, EntityKind},
    protocol::EntityRecord,
};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct EntityCollections {
    samples: BTreeMap<EntityId, EntityRecord>,
    hypotheses: BTreeMap<EntityId, EntityRecord>,
    hypothesis_sample_matches: BTreeMap<EntityId, EntityRecord>,
}

impl EntityCollections {
    pub fn collection(&self, kind: EntityKind) -> &BTreeMap<EntityId, EntityRecord> {
        match kind {
            EntityKind::Sample => &self.samples,
            EntityKind::Hypothesis => &self.hypotheses,
            EntityKind::HypothesisSampleMatch => &self.hypothesis_sample_matches,
        }
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<EntityId, EntityRecord> {
        match kind {
            EntityKind::Sample => &mut self.samples,
            EntityKind::Hypothesis => &mut self.hypotheses,
            EntityKind::HypothesisSampleMatch => &mut self.hypothesis_sample_matches,
        }
    }

    pub fn upsert(&mut self, kind: EntityKind, record: EntityRecord) {
        self.collection_mut(kind).insert(record.id.clone(), record);
    }

    pub fn replace_all(&mut self, kind: EntityKind, records: Vec<EntityRecord>) {
        let collection = self.collection_mut(kind);
        collection.clear();
        for record in records {
            collection.insert(record.id.clone(), record);
        }
    }

    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Option<&EntityRecord> {
        self.collection(kind).get(id)
    }
}

/// Accepts either a list of records or an object keyed by id. Entries without a usable
/// `id` are skipped.
pub fn parse_entity_listing(kind: EntityKind, listing: Value) -> Vec<EntityRecord> {
    let entries: Vec<Value> = match listing {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, value)| value).collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(kind = ?kind, "unexpected entity listing shape: {other}");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<EntityRecord>(entry) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(kind = ?kind, "skipping entity without id: {err}");
                None
            }
        })
        .collect()
}
