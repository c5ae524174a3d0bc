use std::time::Instant;

use glam::Vec3;
use tracing::{debug, info};

use super::{ActionOutcome, IgnoreReason, Orchestrator};
use crate::gesture::PointerEvent;
use crate::hit_test::TapOutcome;

impl Orchestrator {
    /// Tap inside the session; places the active model when the provider
    /// accepts it
    pub fn on_select(&mut self, now: Instant) -> ActionOutcome {
        if self.state.is_model_loading {
            return ActionOutcome::Ignored(IgnoreReason::Loading);
        }
        match self.provider.on_select(now) {
            TapOutcome::Place(hit) => self.place_at(hit),
            TapOutcome::Ignored(reason) => ActionOutcome::Ignored(IgnoreReason::Tap(reason)),
        }
    }

    fn place_at(&mut self, raw_hit: Vec3) -> ActionOutcome {
        let Some(id) = self.state.active_model_id.clone() else {
            debug!("Tap ignored: no active model");
            return ActionOutcome::Ignored(IgnoreReason::NoActiveModel);
        };
        if !self.show_placed(&id, raw_hit) {
            return ActionOutcome::Ignored(IgnoreReason::NoActiveModel);
        }
        self.sync_scanning();
        ActionOutcome::Applied
    }

    /// Hide the placed model and wait for a tap at a new spot
    pub fn reload(&mut self, now: Instant) -> ActionOutcome {
        if self.state.is_model_loading {
            return ActionOutcome::Ignored(IgnoreReason::Loading);
        }
        if self.state.is_repositioning {
            return ActionOutcome::Ignored(IgnoreReason::AlreadyRepositioning);
        }
        if !self.state.model_is_placed {
            return ActionOutcome::Ignored(IgnoreReason::NotPlaced);
        }
        let Some(id) = self.state.active_model_id.clone() else {
            return ActionOutcome::Ignored(IgnoreReason::NoActiveModel);
        };

        self.loader.cache_mut().hide(&id, self.engine.as_mut());
        self.gestures.detach();
        self.state.model_is_placed = false;
        self.state.is_repositioning = true;
        let suppress = self.suppress_duration();
        self.provider.enable_placement_with_suppression(now, suppress);
        self.sync_scanning();
        info!("Repositioning '{id}'");
        ActionOutcome::Applied
    }

    /// Drop the active model, hiding it or evicting it from the cache
    pub fn clear(&mut self, evict: bool) -> ActionOutcome {
        if self.state.is_model_loading {
            return ActionOutcome::Ignored(IgnoreReason::Loading);
        }
        let Some(id) = self.state.active_model_id.take() else {
            return ActionOutcome::Ignored(IgnoreReason::NoActiveModel);
        };

        self.gestures.detach();
        if evict {
            self.loader.evict(&id, self.engine.as_mut());
        } else {
            self.loader.cache_mut().hide(&id, self.engine.as_mut());
        }
        self.state.model_is_placed = false;
        self.state.is_repositioning = false;
        self.state.last_placed_hit_position = None;
        self.state.pending_switch_in_place = None;

        self.provider.set_reticle_enabled(true);
        self.provider.set_placement_enabled(false);
        self.publish_active();
        self.sync_scanning();
        info!("Cleared '{id}'{}", if evict { " (evicted)" } else { "" });
        ActionOutcome::Applied
    }

    /// Show or hide one layer of the active model
    pub fn set_layer_visible(&mut self, name: &str, visible: bool) -> ActionOutcome {
        if self.state.is_model_loading {
            return ActionOutcome::Ignored(IgnoreReason::Loading);
        }
        let Some(id) = self.state.active_model_id.clone() else {
            return ActionOutcome::Ignored(IgnoreReason::NoActiveModel);
        };
        let Some(entity) = self.active_entity() else {
            return ActionOutcome::Ignored(IgnoreReason::NoActiveModel);
        };
        let known = self.layers().iter().any(|l| l.name == name);
        if !known || !self.engine.set_node_visible(entity, name, visible) {
            debug!("No layer '{name}' on '{id}'");
            return ActionOutcome::Ignored(IgnoreReason::UnknownLayer(name.to_string()));
        }

        if let Some(layer) = self
            .loader
            .cache_mut()
            .get_mut(&id)
            .and_then(|e| e.layers.iter_mut().find(|l| l.name == name))
        {
            layer.visible = visible;
        }
        self.publish_active();
        ActionOutcome::Applied
    }

    /// Route touch input to the attached model
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> ActionOutcome {
        match self.gestures.handle(event) {
            Some(update) => {
                self.engine.set_rotation(update.entity, update.rotation);
                self.engine
                    .set_scale(update.entity, Vec3::splat(update.scale));
                ActionOutcome::Applied
            }
            None => ActionOutcome::Ignored(IgnoreReason::NoGesture),
        }
    }
}
