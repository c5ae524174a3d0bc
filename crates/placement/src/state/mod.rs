pub mod settings;

use glam::Vec3;
use shared::{ModelId, TransformData};

use crate::loader::LayerInfo;

/// Intent to show a loading model at the current placement once ready
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSwitch {
    pub model_id: ModelId,
    /// Raw surface point, before any floor offset
    pub hit_position: Vec3,
}

/// Placement flags owned by the orchestrator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementState {
    pub active_model_id: Option<ModelId>,
    pub model_is_placed: bool,
    pub is_model_loading: bool,
    pub is_repositioning: bool,
    /// Raw surface point of the last placement
    pub last_placed_hit_position: Option<Vec3>,
    pub pending_switch_in_place: Option<PendingSwitch>,
    /// Model the in-flight load is for
    pub loading_model_id: Option<ModelId>,
}

/// Phase derived from the flag set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementPhase {
    /// No model active and nothing cached
    Idle,
    /// Nothing active, but parsed models are cached and hidden
    CachedHidden,
    /// Model ready, waiting for a tap
    AwaitingPlacement,
    Placed,
    Loading,
    /// Placed model hidden, waiting for a tap at a new spot
    Repositioning,
}

impl PlacementState {
    pub fn phase(&self, has_cached_models: bool) -> PlacementPhase {
        if self.is_model_loading {
            PlacementPhase::Loading
        } else if self.model_is_placed {
            PlacementPhase::Placed
        } else if self.is_repositioning {
            PlacementPhase::Repositioning
        } else if self.active_model_id.is_some() {
            PlacementPhase::AwaitingPlacement
        } else if has_cached_models {
            PlacementPhase::CachedHidden
        } else {
            PlacementPhase::Idle
        }
    }
}

/// Full record of the active model, taken before a load so cancel can restore it
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSnapshot {
    pub model_id: ModelId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub placed: bool,
    pub repositioning: bool,
    pub last_placed_hit_position: Option<Vec3>,
    pub layers: Vec<LayerInfo>,
}

impl PlacementSnapshot {
    pub fn transform(&self) -> TransformData {
        TransformData {
            position: self.position.to_array(),
            rotation: self.rotation.to_array(),
            scale: self.scale.to_array(),
        }
    }
}
