//! Placement/switch orchestrator.
//!
//! Owns the placement flags, the model cache (through the loader) and the
//! only pointer to the active model. Hit-test, gesture, fetch and engine
//! events all enter through [`Orchestrator::handle_event`] on one logical
//! thread; user actions are plain method calls that return an
//! [`ActionOutcome`].
//!
//! ```text
//!            select(cached)            tap
//!   Idle ─────────────────> Awaiting ──────> Placed ──reload──> Repositioning
//!    │  select(uncached)       ^                │  ^                   │
//!    └──────────> Loading ─────┘ ready          │  └────── tap ────────┘
//!                  │  ^  └──── ready + switch-in-place ───>┘
//!                  │  └──────── select(uncached) ──────────┘
//!                  └── cancel ──> snapshot restored / Idle
//! ```

mod placement;
mod switch;

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use shared::{ArConfig, ModelSpec};
use tracing::{debug, error, info};

use crate::error::ArError;
use crate::gesture::{GestureInterpreter, PointerEvent};
use crate::hit_test::{HitTestProvider, SessionInfo, TapIgnored};
use crate::loader::{LayerInfo, LoadUpdate, ModelLoader};
use crate::platform::{
    AssetFetcher, EngineEvent, EntityId, FetchEvent, FrameInfo, SceneEngine, XrPlatform,
};
use crate::state::{PlacementPhase, PlacementSnapshot, PlacementState};
use crate::ui::{Notice, PlacementUi, ProgressDisplay};

/// Everything the host loop feeds in
#[derive(Debug, Clone)]
pub enum ArEvent {
    /// Once per rendered frame
    Frame(FrameInfo),
    /// Platform "select" (screen tap in the session)
    Select { time: Instant },
    Pointer(PointerEvent),
    Fetch(FetchEvent),
    Engine(EngineEvent),
}

/// Why an action or event had no effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    Loading,
    NotLoading,
    NotPlaced,
    AlreadyRepositioning,
    AlreadyActive,
    NoActiveModel,
    UnknownLayer(String),
    Tap(TapIgnored),
    /// Pointer input that produced no transform change
    NoGesture,
    /// Fetch or engine event for a load that is no longer current
    StaleLoad,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    Ignored(IgnoreReason),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }
}

pub struct Orchestrator {
    config: Arc<ArConfig>,
    provider: HitTestProvider,
    loader: ModelLoader,
    gestures: GestureInterpreter,
    engine: Box<dyn SceneEngine>,
    ui: Box<dyn PlacementUi>,
    state: PlacementState,
    /// Prior active model, captured when a load starts
    snapshot: Option<PlacementSnapshot>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<ArConfig>,
        platform: Box<dyn XrPlatform>,
        engine: Box<dyn SceneEngine>,
        fetcher: Box<dyn AssetFetcher>,
        ui: Box<dyn PlacementUi>,
    ) -> Self {
        let provider = HitTestProvider::new(platform, config.hit_test.clone());
        let loader = ModelLoader::new(fetcher, &config.placement);
        let gestures = GestureInterpreter::new(config.gestures.clone());
        Self {
            config,
            provider,
            loader,
            gestures,
            engine,
            ui,
            state: PlacementState::default(),
            snapshot: None,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &ArConfig {
        &self.config
    }

    pub fn state(&self) -> &PlacementState {
        &self.state
    }

    pub fn phase(&self) -> PlacementPhase {
        self.state
            .phase(!self.loader.cache().ready_ids().is_empty())
    }

    pub fn provider(&self) -> &HitTestProvider {
        &self.provider
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    pub fn gestures(&self) -> &GestureInterpreter {
        &self.gestures
    }

    pub fn snapshot(&self) -> Option<&PlacementSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn active_entity(&self) -> Option<EntityId> {
        let id = self.state.active_model_id.as_ref()?;
        self.loader.cache().get(id)?.entity
    }

    /// Layers of the active model
    pub fn layers(&self) -> &[LayerInfo] {
        self.state
            .active_model_id
            .as_ref()
            .and_then(|id| self.loader.cache().get(id))
            .map(|e| e.layers.as_slice())
            .unwrap_or(&[])
    }

    fn suppress_duration(&self) -> Duration {
        Duration::from_millis(self.config.placement.suppress_ms)
    }

    fn spec_for(&self, id: &str) -> Option<ModelSpec> {
        self.loader
            .cache()
            .get(id)
            .map(|e| e.spec.clone())
            .or_else(|| self.config.model(id).cloned())
    }

    // ── Session ───────────────────────────────────────────────

    /// Start the AR session. Failures are reported to the user and returned.
    pub async fn start_session(&mut self, now: Instant) -> Result<SessionInfo, ArError> {
        let info = match self.provider.start().await {
            Ok(info) => info,
            Err(e) => {
                error!("Could not start AR: {e}");
                self.ui.notify(Notice::error(e.user_message()));
                return Err(e);
            }
        };

        let suppress = self.suppress_duration();
        let awaiting = self.state.active_model_id.is_some()
            && !self.state.model_is_placed
            && !self.state.is_model_loading;
        if awaiting {
            self.provider.enable_placement_with_suppression(now, suppress);
        } else {
            self.provider.suppress_placement(now, suppress);
            self.provider
                .set_reticle_enabled(!self.state.model_is_placed);
        }
        self.sync_scanning();
        Ok(info)
    }

    /// End the session, abandoning any load and hiding every model.
    ///
    /// Parsed models stay cached for the next session.
    pub fn end_session(&mut self) {
        if self.state.is_model_loading {
            self.abort_load();
            self.ui.hide_loading();
        }
        self.gestures.detach();
        self.loader.cache_mut().hide_all(self.engine.as_mut());
        self.state = PlacementState::default();
        self.snapshot = None;
        self.provider.end();
        self.engine.set_reticle(None);
        self.ui.set_controls_enabled(true);
        self.ui.set_active_model(None, &[]);
        self.ui.set_surface_detected(false);
        self.sync_scanning();
        info!("Placement reset after session end");
    }

    pub fn pause(&mut self) {
        self.provider.pause();
    }

    pub fn resume(&mut self) {
        self.provider.resume();
    }

    // ── Event dispatch ────────────────────────────────────────

    /// Single entry point for the host loop.
    ///
    /// `now` timestamps events that carry no time of their own; frames and
    /// selects use theirs.
    pub fn handle_event(&mut self, event: ArEvent, now: Instant) -> ActionOutcome {
        match event {
            ArEvent::Frame(frame) => {
                self.on_frame(&frame);
                ActionOutcome::Applied
            }
            ArEvent::Select { time } => self.on_select(time),
            ArEvent::Pointer(pointer) => self.handle_pointer(&pointer),
            ArEvent::Fetch(fetch) => {
                let update = self.loader.handle_fetch_event(fetch, self.engine.as_mut());
                self.apply_update(update, now)
            }
            ArEvent::Engine(engine_event) => {
                let update = self
                    .loader
                    .handle_engine_event(&engine_event, self.engine.as_mut());
                self.apply_update(update, now)
            }
        }
    }

    /// Per-frame step: hit test, reticle, deferred load completion
    pub fn on_frame(&mut self, frame: &FrameInfo) {
        let report = self.provider.on_frame(frame);
        if let Some(detected) = report.surface_changed {
            self.ui.set_surface_detected(detected);
        }
        let reticle = self.provider.reticle_render_pose();
        self.engine.set_reticle(reticle.as_ref());

        let update = self.loader.on_frame(self.engine.as_mut());
        self.apply_update(update, frame.time);
    }

    fn apply_update(&mut self, update: Option<LoadUpdate>, now: Instant) -> ActionOutcome {
        let Some(update) = update else {
            return ActionOutcome::Ignored(IgnoreReason::StaleLoad);
        };
        match update {
            LoadUpdate::Progress { progress, .. } => {
                self.ui
                    .update_progress(ProgressDisplay::from_progress(&progress));
            }
            LoadUpdate::Parsing { model_id } | LoadUpdate::Scaled { model_id } => {
                debug!("Load of '{model_id}' advanced");
            }
            LoadUpdate::Ready { model_id } => self.complete_load(&model_id, now),
            LoadUpdate::Failed(e) => self.fail_load(e, now),
            LoadUpdate::Discarded(e) => {
                debug!("Ignoring late result: {e}");
                return ActionOutcome::Ignored(IgnoreReason::StaleLoad);
            }
        }
        ActionOutcome::Applied
    }

    // ── Shared helpers ────────────────────────────────────────

    /// Scanning hint is up while a live session waits for a tap
    fn sync_scanning(&mut self) {
        let scanning = self.provider.is_live()
            && !self.state.model_is_placed
            && !self.state.is_model_loading;
        self.ui.set_scanning(scanning);
    }

    fn publish_active(&mut self) {
        match self.state.active_model_id.clone() {
            Some(id) => {
                let spec = self.spec_for(&id);
                let layers = self.layers().to_vec();
                self.ui.set_active_model(spec.as_ref(), &layers);
            }
            None => self.ui.set_active_model(None, &[]),
        }
    }

    /// Position the active model at `raw_hit` lifted by its floor offset, show it
    /// and hand it to the gesture interpreter
    fn show_placed(&mut self, id: &str, raw_hit: Vec3) -> bool {
        let Some(entry) = self.loader.cache().get(id) else {
            return false;
        };
        let (Some(entity), floor_offset) = (entry.entity, entry.floor_offset) else {
            return false;
        };

        let position = raw_hit + Vec3::Y * floor_offset;
        self.engine.set_position(entity, position);
        if !self
            .loader
            .cache_mut()
            .show_exclusive(id, self.engine.as_mut())
        {
            return false;
        }

        self.state.model_is_placed = true;
        self.state.is_repositioning = false;
        self.state.last_placed_hit_position = Some(raw_hit);
        self.provider.disable_placement();
        self.engine.set_reticle(None);

        let rotation = self.engine.rotation(entity).unwrap_or(Vec3::ZERO);
        let scale = self
            .engine
            .scale(entity)
            .map(|s| s.x)
            .unwrap_or(entry_base_scale(&self.loader, id));
        self.gestures.attach(entity, rotation, scale);
        info!("Placed '{id}' at {position}");
        true
    }
}

fn entry_base_scale(loader: &ModelLoader, id: &str) -> f32 {
    loader.cache().get(id).map(|e| e.base_scale).unwrap_or(1.0)
}
