//! Gallery selection, load completion and cancel-restore

use std::time::Instant;

use glam::Vec3;
use shared::ModelSpec;
use tracing::{debug, info, warn};

use super::{ActionOutcome, IgnoreReason, Orchestrator};
use crate::error::ArError;
use crate::loader::{LoadStage, LoadStart};
use crate::state::{PendingSwitch, PlacementSnapshot};
use crate::ui::{Notice, ProgressDisplay};

impl Orchestrator {
    /// Gallery selection.
    ///
    /// Cached models switch immediately; others start a load and lock the UI
    /// until it settles. Either way a placed model is swapped in place.
    pub fn select_model(&mut self, id: &str, now: Instant) -> Result<ActionOutcome, ArError> {
        if self.state.is_model_loading {
            debug!("Selection of '{id}' ignored: a model is loading");
            return Ok(ActionOutcome::Ignored(IgnoreReason::Loading));
        }
        let Some(spec) = self.config.model(id).cloned() else {
            let e = ArError::UnknownModel(id.to_string());
            warn!("{e}");
            self.ui.notify(Notice::warning(e.user_message()));
            return Err(e);
        };
        if self.state.active_model_id.as_deref() == Some(id) && !self.state.is_repositioning {
            debug!("'{id}' is already active");
            return Ok(ActionOutcome::Ignored(IgnoreReason::AlreadyActive));
        }

        let switch_hit = self.switch_in_place_target();
        if self.loader.cache().is_ready(id) {
            self.activate_cached(&spec.id, switch_hit, now);
            return Ok(ActionOutcome::Applied);
        }
        self.begin_load(spec, switch_hit)
    }

    /// Raw hit to reuse when a model is already placed
    fn switch_in_place_target(&self) -> Option<Vec3> {
        if self.state.model_is_placed && !self.state.is_repositioning {
            self.state.last_placed_hit_position
        } else {
            None
        }
    }

    /// Make a ready cached model active, with scale and rotation reset.
    ///
    /// Placed at `switch_hit` when given, otherwise left hidden awaiting a tap.
    fn activate_cached(&mut self, id: &str, switch_hit: Option<Vec3>, now: Instant) {
        self.gestures.detach();
        self.loader.cache_mut().hide_all(self.engine.as_mut());

        let Some(entry) = self.loader.cache().get(id) else {
            return;
        };
        let (entity, base_scale) = (entry.entity, entry.base_scale);
        if let Some(entity) = entity {
            self.engine.set_scale(entity, Vec3::splat(base_scale));
            self.engine.set_rotation(entity, Vec3::ZERO);
        }

        self.state.active_model_id = Some(id.to_string());
        self.state.model_is_placed = false;
        self.state.is_repositioning = false;

        let placed = match switch_hit {
            Some(hit) => {
                let placed = self.show_placed(id, hit);
                if placed {
                    info!("Switched to '{id}' in place");
                }
                placed
            }
            None => false,
        };
        if !placed {
            let suppress = self.suppress_duration();
            self.provider.enable_placement_with_suppression(now, suppress);
            info!("'{id}' ready, awaiting placement");
        }
        self.publish_active();
        self.sync_scanning();
    }

    fn take_snapshot(&self) -> Option<PlacementSnapshot> {
        let id = self.state.active_model_id.as_ref()?;
        let entry = self.loader.cache().get(id)?;
        let entity = entry.entity?;
        Some(PlacementSnapshot {
            model_id: id.clone(),
            position: self.engine.position(entity).unwrap_or(Vec3::ZERO),
            rotation: self.engine.rotation(entity).unwrap_or(Vec3::ZERO),
            scale: self
                .engine
                .scale(entity)
                .unwrap_or(Vec3::splat(entry.base_scale)),
            placed: self.state.model_is_placed,
            repositioning: self.state.is_repositioning,
            last_placed_hit_position: self.state.last_placed_hit_position,
            layers: entry.layers.clone(),
        })
    }

    fn begin_load(
        &mut self,
        spec: ModelSpec,
        switch_hit: Option<Vec3>,
    ) -> Result<ActionOutcome, ArError> {
        let snapshot = self.take_snapshot();
        match self.loader.load(&spec)? {
            LoadStart::Started(load_id) => debug!("Load {:?} started for '{}'", load_id, spec.id),
            LoadStart::Cached => {
                warn!("'{}' became ready before its load started", spec.id);
            }
        }

        self.gestures.detach();
        self.loader.cache_mut().hide_all(self.engine.as_mut());
        self.snapshot = snapshot;
        self.state.pending_switch_in_place = switch_hit.map(|hit_position| PendingSwitch {
            model_id: spec.id.clone(),
            hit_position,
        });
        self.state.is_model_loading = true;
        self.state.loading_model_id = Some(spec.id.clone());
        self.state.active_model_id = None;
        self.state.model_is_placed = false;
        self.state.is_repositioning = false;

        self.provider.disable_placement();
        self.engine.set_reticle(None);
        self.ui.set_controls_enabled(false);
        self.ui.show_loading(&spec);
        self.ui
            .update_progress(ProgressDisplay::Stage(LoadStage::Starting));
        self.sync_scanning();
        info!("Loading '{}'", spec.id);
        Ok(ActionOutcome::Applied)
    }

    /// Release the UI lock after a load settles
    fn finish_loading(&mut self) {
        self.state.is_model_loading = false;
        self.state.loading_model_id = None;
        self.ui.hide_loading();
        self.ui.set_controls_enabled(true);
    }

    pub(super) fn complete_load(&mut self, model_id: &str, now: Instant) {
        if self.state.loading_model_id.as_deref() != Some(model_id) {
            debug!("Ready event for '{model_id}' does not match the current load");
            return;
        }
        self.finish_loading();
        self.snapshot = None;
        let switch_hit = self
            .state
            .pending_switch_in_place
            .take()
            .filter(|p| p.model_id == model_id)
            .map(|p| p.hit_position);
        self.activate_cached(model_id, switch_hit, now);
    }

    /// Report a failed load and fall back to the prior model, if any
    pub(super) fn fail_load(&mut self, error: ArError, now: Instant) {
        self.finish_loading();
        self.state.pending_switch_in_place = None;
        self.ui.notify(Notice::error(error.user_message()));

        let suppress = self.suppress_duration();
        let previous = self
            .snapshot
            .take()
            .filter(|s| self.loader.cache().is_ready(&s.model_id));
        match previous {
            Some(snapshot) => {
                info!("Returning to '{}' after failed load", snapshot.model_id);
                self.state.active_model_id = Some(snapshot.model_id);
                self.state.model_is_placed = false;
                self.state.is_repositioning = false;
                self.provider.enable_placement_with_suppression(now, suppress);
            }
            None => self.reset_to_idle(now),
        }
        self.publish_active();
        self.sync_scanning();
    }

    /// Abort the fetch and drop any partial entry or entity
    pub(super) fn abort_load(&mut self) -> Option<String> {
        let id = self.loader.cancel()?;
        self.loader.discard(&id, self.engine.as_mut());
        self.state.is_model_loading = false;
        self.state.loading_model_id = None;
        self.state.pending_switch_in_place = None;
        Some(id)
    }

    /// Cancel the in-flight load and restore what was active before it
    pub fn cancel_loading(&mut self, now: Instant) -> ActionOutcome {
        if !self.state.is_model_loading {
            return ActionOutcome::Ignored(IgnoreReason::NotLoading);
        }
        if let Some(id) = self.abort_load() {
            self.ui
                .notify(Notice::info(ArError::UserCancelled(id).user_message()));
        }
        self.finish_loading();

        let restored = match self.snapshot.take() {
            Some(snapshot) => self.restore_snapshot(snapshot, now),
            None => false,
        };
        if !restored {
            self.reset_to_idle(now);
        }
        self.publish_active();
        self.sync_scanning();
        ActionOutcome::Applied
    }

    fn restore_snapshot(&mut self, snapshot: PlacementSnapshot, now: Instant) -> bool {
        let Some(entity) = self
            .loader
            .cache()
            .get(&snapshot.model_id)
            .filter(|e| e.ready)
            .and_then(|e| e.entity)
        else {
            warn!("Snapshot model '{}' is gone", snapshot.model_id);
            return false;
        };

        self.engine.set_position(entity, snapshot.position);
        self.engine.set_rotation(entity, snapshot.rotation);
        self.engine.set_scale(entity, snapshot.scale);
        for layer in &snapshot.layers {
            self.engine
                .set_node_visible(entity, &layer.name, layer.visible);
        }
        if let Some(entry) = self.loader.cache_mut().get_mut(&snapshot.model_id) {
            entry.layers = snapshot.layers.clone();
        }

        self.state.active_model_id = Some(snapshot.model_id.clone());
        self.state.model_is_placed = snapshot.placed;
        self.state.is_repositioning = snapshot.repositioning;
        self.state.last_placed_hit_position = snapshot.last_placed_hit_position;

        if snapshot.placed {
            self.loader
                .cache_mut()
                .show_exclusive(&snapshot.model_id, self.engine.as_mut());
            self.provider.disable_placement();
            self.gestures
                .attach(entity, snapshot.rotation, snapshot.scale.x);
        } else {
            let suppress = self.suppress_duration();
            self.provider.enable_placement_with_suppression(now, suppress);
        }
        info!("Restored '{}' after cancel", snapshot.model_id);
        true
    }

    /// No active model; reticle tracks the surface, taps do nothing
    fn reset_to_idle(&mut self, now: Instant) {
        self.gestures.detach();
        self.loader.cache_mut().hide_all(self.engine.as_mut());
        self.state.active_model_id = None;
        self.state.model_is_placed = false;
        self.state.is_repositioning = false;
        let suppress = self.suppress_duration();
        self.provider.suppress_placement(now, suppress);
        self.provider.set_reticle_enabled(true);
        self.provider.set_placement_enabled(false);
    }
}
