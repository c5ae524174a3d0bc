//! Headless harness: the orchestrator wired to in-memory fakes.
//!
//! Time is virtual. Each [`TestHarness::frame`] advances the clock by one
//! 60 Hz frame, applies pending engine writes and runs the per-frame step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use shared::{ArConfig, LayerSpec, ModelSpec};

use crate::error::ArError;
use crate::fixtures::{FakeAsset, FakeFetcher, FakeScene, FakeUi, FakeXr, UiRecord};
use crate::gesture::{PointerEvent, PointerPhase};
use crate::hit_test::SessionInfo;
use crate::orchestrator::{ActionOutcome, ArEvent, Orchestrator};
use crate::platform::{
    AssetHandle, FetchEvent, FetchFailure, FetchProgress, FrameInfo, SceneEngine, SceneNode,
};
use crate::state::{PlacementPhase, PlacementState};
use crate::viewport::Aabb;

const FRAME: Duration = Duration::from_micros(16_667);

/// Gallery used when no config supplies models
pub fn demo_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("house1", "House", "models/house1.glb").with_target_size(0.5),
        ModelSpec::new("house2", "Villa", "models/house2.glb").with_target_size(1.0),
        ModelSpec::new("cabin", "Cabin", "models/cabin.glb")
            .with_target_size(0.8)
            .with_layers(vec![
                LayerSpec {
                    name: "roof".into(),
                    label: None,
                },
                LayerSpec {
                    name: "walls".into(),
                    label: Some("Outer walls".into()),
                },
            ]),
    ]
}

/// Parsed geometry for [`demo_models`]
pub fn demo_assets() -> Vec<(&'static str, FakeAsset)> {
    vec![
        (
            "models/house1.glb",
            FakeAsset::new(Aabb::new(
                Vec3::new(-0.5, -1.2, -0.5),
                Vec3::new(0.5, 0.8, 0.5),
            )),
        ),
        (
            "models/house2.glb",
            FakeAsset::new(Aabb::new(Vec3::new(-1.0, -0.5, -2.0), Vec3::new(1.0, 1.5, 2.0)))
                .with_nodes(vec![SceneNode::group(
                    "Scene",
                    vec![
                        SceneNode::mesh("Roof"),
                        SceneNode::mesh("Floor_1"),
                        SceneNode::mesh("groundFloor"),
                    ],
                )]),
        ),
        (
            "models/cabin.glb",
            FakeAsset::new(Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0)))
                .with_nodes(vec![SceneNode::mesh("roof"), SceneNode::mesh("walls")]),
        ),
    ]
}

pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub xr: FakeXr,
    pub scene: FakeScene,
    pub fetcher: FakeFetcher,
    pub ui: FakeUi,
    clock: Instant,
    frame_index: u64,
}

impl TestHarness {
    /// Harness over the demo gallery
    pub fn new() -> Self {
        Self::with_config(ArConfig::with_models(demo_models()))
    }

    /// Harness over `config`; demo assets are registered, unknown URLs parse
    /// as a unit cube
    pub fn with_config(config: ArConfig) -> Self {
        let xr = FakeXr::new();
        let mut scene = FakeScene::new();
        let fetcher = FakeFetcher::new();
        let ui = FakeUi::new();
        for (url, asset) in demo_assets() {
            scene.register_asset(url, asset);
        }

        let orchestrator = Orchestrator::new(
            Arc::new(config),
            Box::new(xr.clone()),
            Box::new(scene.clone()),
            Box::new(fetcher.clone()),
            Box::new(ui.clone()),
        );
        Self {
            orchestrator,
            xr,
            scene,
            fetcher,
            ui,
            clock: Instant::now(),
            frame_index: 0,
        }
    }

    pub fn register_asset(&mut self, url: &str, asset: FakeAsset) {
        self.scene.register_asset(url, asset);
    }

    // ── Clock ─────────────────────────────────────────────────

    pub fn now(&self) -> Instant {
        self.clock
    }

    pub fn advance(&mut self, duration: Duration) {
        self.clock += duration;
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Step past the placement suppression window
    pub fn wait_out_suppression(&mut self) {
        let ms = self.orchestrator.config().placement.suppress_ms;
        self.advance_ms(ms);
    }

    // ── Session ───────────────────────────────────────────────

    pub fn start_session(&mut self) -> Result<SessionInfo, ArError> {
        let now = self.clock;
        futures::executor::block_on(self.orchestrator.start_session(now))
    }

    pub fn end_session(&mut self) {
        self.orchestrator.end_session();
    }

    pub fn pause(&mut self) {
        self.orchestrator.pause();
    }

    pub fn resume(&mut self) {
        self.orchestrator.resume();
    }

    // ── Frames & taps ─────────────────────────────────────────

    /// Surface point the next frames report
    pub fn set_hit(&mut self, position: Option<Vec3>) {
        self.xr.set_hit(position);
    }

    /// One rendered frame
    pub fn frame(&mut self) {
        self.advance(FRAME);
        self.scene.apply_pending();
        let frame = FrameInfo {
            index: self.frame_index,
            time: self.clock,
        };
        self.frame_index += 1;
        self.orchestrator.handle_event(ArEvent::Frame(frame), self.clock);
    }

    pub fn frames(&mut self, count: usize) {
        for _ in 0..count {
            self.frame();
        }
    }

    pub fn tap(&mut self) -> ActionOutcome {
        let time = self.clock;
        self.orchestrator
            .handle_event(ArEvent::Select { time }, time)
    }

    /// Report a surface at `position`, wait out suppression and tap
    pub fn place_at(&mut self, position: Vec3) -> ActionOutcome {
        self.set_hit(Some(position));
        self.wait_out_suppression();
        self.frame();
        self.tap()
    }

    // ── User actions ──────────────────────────────────────────

    pub fn select(&mut self, id: &str) -> Result<ActionOutcome, ArError> {
        let now = self.clock;
        self.orchestrator.select_model(id, now)
    }

    pub fn cancel(&mut self) -> ActionOutcome {
        let now = self.clock;
        self.orchestrator.cancel_loading(now)
    }

    pub fn reload(&mut self) -> ActionOutcome {
        let now = self.clock;
        self.orchestrator.reload(now)
    }

    pub fn clear(&mut self, evict: bool) -> ActionOutcome {
        self.orchestrator.clear(evict)
    }

    pub fn set_layer_visible(&mut self, name: &str, visible: bool) -> ActionOutcome {
        self.orchestrator.set_layer_visible(name, visible)
    }

    pub fn pointer(&mut self, pointer_id: u32, phase: PointerPhase, x: f32, y: f32) -> ActionOutcome {
        let event = PointerEvent::new(pointer_id, phase, Vec2::new(x, y));
        self.send_pointer(event)
    }

    pub fn send_pointer(&mut self, event: PointerEvent) -> ActionOutcome {
        let now = self.clock;
        self.orchestrator.handle_event(ArEvent::Pointer(event), now)
    }

    // ── Fetch & parse scripting ───────────────────────────────

    fn send_fetch(&mut self, event: FetchEvent) -> ActionOutcome {
        let now = self.clock;
        self.orchestrator.handle_event(ArEvent::Fetch(event), now)
    }

    /// Progress for the most recent request
    pub fn fetch_progress(&mut self, received: u64, total: Option<u64>) -> Option<ActionOutcome> {
        let request = self.fetcher.last_request()?;
        Some(self.send_fetch(FetchEvent::Progress {
            load_id: request.load_id,
            progress: FetchProgress { received, total },
        }))
    }

    /// Deliver the bytes of the most recent request
    pub fn complete_fetch(&mut self) -> Option<ActionOutcome> {
        let request = self.fetcher.last_request()?;
        Some(self.send_fetch(FetchEvent::Completed {
            load_id: request.load_id,
            asset: AssetHandle {
                url: request.url,
                data: vec![0u8; 64].into(),
            },
        }))
    }

    pub fn fail_fetch(&mut self, failure: FetchFailure) -> Option<ActionOutcome> {
        let request = self.fetcher.last_request()?;
        Some(self.send_fetch(FetchEvent::Failed {
            load_id: request.load_id,
            failure,
        }))
    }

    /// Let the engine finish every pending parse
    pub fn finish_parsing(&mut self) -> Vec<ActionOutcome> {
        let now = self.clock;
        self.scene
            .finish_parsing()
            .into_iter()
            .map(|event| self.orchestrator.handle_event(ArEvent::Engine(event), now))
            .collect()
    }

    /// Download, parse and settle bounds for the in-flight load
    pub fn finish_load(&mut self) {
        self.complete_fetch();
        self.finish_parsing();
        self.frame();
    }

    /// Select `id` and, if that started a download, run it to completion
    pub fn load_model(&mut self, id: &str) -> Result<ActionOutcome, ArError> {
        let outcome = self.select(id)?;
        if self.orchestrator.state().is_model_loading {
            self.finish_load();
        }
        Ok(outcome)
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn phase(&self) -> PlacementPhase {
        self.orchestrator.phase()
    }

    pub fn state(&self) -> &PlacementState {
        self.orchestrator.state()
    }

    pub fn ui_record(&self) -> UiRecord {
        self.ui.record()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetcher.fetch_count()
    }

    pub fn visible_model_count(&self) -> usize {
        self.orchestrator.loader().cache().visible_count()
    }

    pub fn active_position(&self) -> Option<Vec3> {
        self.orchestrator
            .active_entity()
            .and_then(|e| self.scene.position(e))
    }

    pub fn active_rotation(&self) -> Option<Vec3> {
        self.orchestrator
            .active_entity()
            .and_then(|e| self.scene.rotation(e))
    }

    /// Uniform scale of the active model
    pub fn active_scale(&self) -> Option<f32> {
        self.orchestrator
            .active_entity()
            .and_then(|e| self.scene.scale(e))
            .map(|s| s.x)
    }

    pub fn active_visible(&self) -> bool {
        self.orchestrator
            .active_entity()
            .is_some_and(|e| self.scene.is_visible(e))
    }

    /// Snapshot of the observable state, for the command protocol
    pub fn status_json(&self) -> serde_json::Value {
        let state = self.state();
        let cache = self.orchestrator.loader().cache();
        serde_json::json!({
            "phase": format!("{:?}", self.phase()),
            "session_live": self.orchestrator.provider().is_live(),
            "active_model": state.active_model_id,
            "loading_model": state.loading_model_id,
            "placed": state.model_is_placed,
            "repositioning": state.is_repositioning,
            "last_placed_hit": state.last_placed_hit_position.map(|p| p.to_array()),
            "position": self.active_position().map(|p| p.to_array()),
            "rotation": self.active_rotation().map(|r| r.to_array()),
            "scale": self.active_scale(),
            "cached_models": cache.ready_ids(),
            "visible_models": cache.visible_count(),
            "layers": self.orchestrator.layers().iter().map(|l| serde_json::json!({
                "name": l.name,
                "label": l.label,
                "visible": l.visible,
            })).collect::<Vec<_>>(),
            "fetch_count": self.fetch_count(),
        })
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
