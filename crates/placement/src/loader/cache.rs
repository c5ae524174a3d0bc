//! Parsed-model cache keyed by model id

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use shared::{ModelId, ModelSpec};

use crate::platform::{EntityId, SceneEngine};

/// A toggleable sub-node of a model
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    /// Node name in the parsed asset
    pub name: String,
    /// Human-readable label
    pub label: String,
    pub visible: bool,
}

/// One model, parsed or in progress
#[derive(Debug, Clone)]
pub struct CachedModelEntry {
    pub spec: ModelSpec,
    /// Set once the asset bytes have been handed to the engine
    pub entity: Option<EntityId>,
    pub ready: bool,
    pub layers: Vec<LayerInfo>,
    /// Uniform scale that brings the model to its target real-world size
    pub base_scale: f32,
    /// Lift applied at placement so the model's bottom rests on the surface
    pub floor_offset: f32,
    pub visible: bool,
}

impl CachedModelEntry {
    fn pending(spec: ModelSpec) -> Self {
        let base_scale = spec.default_scale;
        Self {
            spec,
            entity: None,
            ready: false,
            layers: Vec::new(),
            base_scale,
            floor_offset: 0.0,
            visible: false,
        }
    }
}

/// Cache of parsed models.
///
/// Entries are never evicted implicitly; at most one is visible at a time.
#[derive(Default)]
pub struct ModelCache {
    entries: HashMap<ModelId, CachedModelEntry>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&CachedModelEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CachedModelEntry> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|e| e.ready)
    }

    /// Insert a not-yet-ready entry, replacing any stale one
    pub fn insert_pending(&mut self, spec: ModelSpec) -> &mut CachedModelEntry {
        match self.entries.entry(spec.id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(CachedModelEntry::pending(spec));
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(CachedModelEntry::pending(spec)),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<CachedModelEntry> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of ready entries, sorted
    pub fn ready_ids(&self) -> Vec<ModelId> {
        let mut ids: Vec<ModelId> = self
            .entries
            .values()
            .filter(|e| e.ready)
            .map(|e| e.spec.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn visible_count(&self) -> usize {
        self.entries.values().filter(|e| e.visible).count()
    }

    pub fn visible_id(&self) -> Option<&ModelId> {
        self.entries
            .values()
            .find(|e| e.visible)
            .map(|e| &e.spec.id)
    }

    /// Show `id` and hide every other entry
    pub fn show_exclusive(&mut self, id: &str, engine: &mut dyn SceneEngine) -> bool {
        if !self.is_ready(id) {
            return false;
        }
        for entry in self.entries.values_mut() {
            if entry.spec.id != id && entry.visible {
                if let Some(entity) = entry.entity {
                    engine.set_visible(entity, false);
                }
                entry.visible = false;
            }
        }
        match self.entries.get_mut(id) {
            Some(entry) => {
                if let Some(entity) = entry.entity {
                    engine.set_visible(entity, true);
                }
                entry.visible = true;
                true
            }
            None => false,
        }
    }

    pub fn hide(&mut self, id: &str, engine: &mut dyn SceneEngine) {
        if let Some(entry) = self.entries.get_mut(id) {
            if let Some(entity) = entry.entity {
                engine.set_visible(entity, false);
            }
            entry.visible = false;
        }
    }

    pub fn hide_all(&mut self, engine: &mut dyn SceneEngine) {
        for entry in self.entries.values_mut().filter(|e| e.visible) {
            if let Some(entity) = entry.entity {
                engine.set_visible(entity, false);
            }
            entry.visible = false;
        }
    }
}
