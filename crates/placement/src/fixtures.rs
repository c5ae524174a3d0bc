//! In-memory platform doubles.
//!
//! Each fake keeps its state behind `Rc<RefCell<..>>` so a clone can be
//! handed to the component under test while the original stays around for
//! scripting and inspection. Used by the unit tests, the integration tests
//! and the scenario harness.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use glam::Vec3;
use shared::{ModelId, ModelSpec};

use crate::loader::LayerInfo;
use crate::platform::{
    AssetFetcher, AssetHandle, EngineEvent, EntityId, FetchRequest, FrameInfo, HitTestResult,
    HitTestSourceHandle, Pose, ReferenceSpaceHandle, ReferenceSpaceKind, SceneEngine, SceneNode,
    SessionHandle, SessionRequest, XrPlatform, XrRequestError,
};
use crate::ui::{Notice, PlacementUi, ProgressDisplay};
use crate::viewport::Aabb;

// ── XR platform ───────────────────────────────────────────────

#[derive(Default)]
struct XrState {
    rejected_candidates: usize,
    deny: bool,
    no_hit_test_source: bool,
    no_local_floor: bool,
    hits: Vec<HitTestResult>,
    next_handle: u64,
    session_requests: usize,
    ended_sessions: usize,
    cancelled_sources: usize,
    hit_test_queries: usize,
}

impl XrState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// Scriptable AR runtime
#[derive(Clone, Default)]
pub struct FakeXr {
    state: Rc<RefCell<XrState>>,
}

impl FakeXr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the first `count` session requests with "not supported"
    pub fn reject_candidates(&self, count: usize) {
        self.state.borrow_mut().rejected_candidates = count;
    }

    pub fn deny_sessions(&self) {
        self.state.borrow_mut().deny = true;
    }

    pub fn disable_hit_test_source(&self) {
        self.state.borrow_mut().no_hit_test_source = true;
    }

    pub fn disable_local_floor(&self) {
        self.state.borrow_mut().no_local_floor = true;
    }

    /// Surface point returned by every following frame, or none
    pub fn set_hit(&self, position: Option<Vec3>) {
        self.state.borrow_mut().hits = position
            .map(|p| vec![HitTestResult::new(Pose::from_position(p))])
            .unwrap_or_default();
    }

    pub fn set_hit_with_confidence(&self, position: Vec3, confidence: f32) {
        self.state.borrow_mut().hits = vec![HitTestResult {
            pose: Pose::from_position(position),
            confidence,
        }];
    }

    pub fn session_requests(&self) -> usize {
        self.state.borrow().session_requests
    }

    pub fn ended_sessions(&self) -> usize {
        self.state.borrow().ended_sessions
    }

    pub fn cancelled_sources(&self) -> usize {
        self.state.borrow().cancelled_sources
    }

    pub fn hit_test_queries(&self) -> usize {
        self.state.borrow().hit_test_queries
    }
}

#[async_trait(?Send)]
impl XrPlatform for FakeXr {
    async fn request_session(
        &mut self,
        request: &SessionRequest,
    ) -> Result<SessionHandle, XrRequestError> {
        let mut s = self.state.borrow_mut();
        s.session_requests += 1;
        if s.deny {
            return Err(XrRequestError::Denied("user declined".into()));
        }
        if s.session_requests <= s.rejected_candidates {
            return Err(XrRequestError::NotSupported(request.describe()));
        }
        Ok(SessionHandle(s.handle()))
    }

    async fn request_reference_space(
        &mut self,
        _session: SessionHandle,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpaceHandle, XrRequestError> {
        let mut s = self.state.borrow_mut();
        if kind == ReferenceSpaceKind::LocalFloor && s.no_local_floor {
            return Err(XrRequestError::NotSupported("local-floor".into()));
        }
        Ok(ReferenceSpaceHandle(s.handle()))
    }

    async fn request_hit_test_source(
        &mut self,
        _session: SessionHandle,
        _space: ReferenceSpaceHandle,
    ) -> Result<HitTestSourceHandle, XrRequestError> {
        let mut s = self.state.borrow_mut();
        if s.no_hit_test_source {
            return Err(XrRequestError::Failed("hit-test source unavailable".into()));
        }
        Ok(HitTestSourceHandle(s.handle()))
    }

    fn hit_test_results(
        &mut self,
        _frame: &FrameInfo,
        _source: HitTestSourceHandle,
        _space: ReferenceSpaceHandle,
    ) -> Vec<HitTestResult> {
        let mut s = self.state.borrow_mut();
        s.hit_test_queries += 1;
        s.hits.clone()
    }

    fn cancel_hit_test_source(&mut self, _source: HitTestSourceHandle) {
        self.state.borrow_mut().cancelled_sources += 1;
    }

    fn end_session(&mut self, _session: SessionHandle) {
        self.state.borrow_mut().ended_sessions += 1;
    }
}

// ── Scene engine ──────────────────────────────────────────────

/// What the fake engine "parses" for a given URL
#[derive(Debug, Clone, PartialEq)]
pub struct FakeAsset {
    /// Unscaled mesh bounds
    pub bounds: Aabb,
    pub nodes: Vec<SceneNode>,
    /// Parse fails with this message
    pub parse_error: Option<String>,
}

impl FakeAsset {
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            nodes: Vec::new(),
            parse_error: None,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<SceneNode>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn corrupt(message: &str) -> Self {
        Self {
            parse_error: Some(message.to_string()),
            ..Self::new(Aabb::new(Vec3::ZERO, Vec3::ZERO))
        }
    }
}

impl Default for FakeAsset {
    fn default() -> Self {
        Self::new(Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)))
    }
}

#[derive(Debug, Clone)]
struct FakeEntity {
    asset: FakeAsset,
    position: Vec3,
    rotation: Vec3,
    /// Last written scale
    scale: Vec3,
    /// Scale the bounds reflect; catches up on `apply_pending`
    applied_scale: Vec3,
    visible: bool,
    hidden_nodes: HashSet<String>,
}

#[derive(Default)]
struct SceneState {
    assets: HashMap<String, FakeAsset>,
    entities: HashMap<EntityId, FakeEntity>,
    parsing: Vec<EntityId>,
    next_id: u64,
    last_created: Option<EntityId>,
    reticle: Option<Pose>,
}

/// Scene engine with deferred scale application and scripted parsing
#[derive(Clone, Default)]
pub struct FakeScene {
    state: Rc<RefCell<SceneState>>,
}

impl FakeScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_asset(&mut self, url: &str, asset: FakeAsset) {
        self.state
            .borrow_mut()
            .assets
            .insert(url.to_string(), asset);
    }

    /// Bring bounds in line with the last scale writes (frame boundary)
    pub fn apply_pending(&self) {
        for entity in self.state.borrow_mut().entities.values_mut() {
            entity.applied_scale = entity.scale;
        }
    }

    /// Finish every queued parse, returning the engine's notifications
    pub fn finish_parsing(&self) -> Vec<EngineEvent> {
        let mut s = self.state.borrow_mut();
        let parsing = std::mem::take(&mut s.parsing);
        parsing
            .into_iter()
            .filter_map(|entity| {
                let e = s.entities.get(&entity)?;
                Some(match &e.asset.parse_error {
                    Some(message) => EngineEvent::AssetError {
                        entity,
                        message: message.clone(),
                    },
                    None => EngineEvent::AssetLoaded { entity },
                })
            })
            .collect()
    }

    pub fn last_created(&self) -> Option<EntityId> {
        self.state.borrow().last_created
    }

    pub fn exists(&self, entity: EntityId) -> bool {
        self.state.borrow().entities.contains_key(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.state.borrow().entities.len()
    }

    pub fn visible_entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .state
            .borrow()
            .entities
            .iter()
            .filter(|(_, e)| e.visible)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    pub fn node_visible(&self, entity: EntityId, node: &str) -> bool {
        self.state
            .borrow()
            .entities
            .get(&entity)
            .is_some_and(|e| !e.hidden_nodes.contains(node))
    }

    pub fn reticle(&self) -> Option<Pose> {
        self.state.borrow().reticle
    }
}

fn find_node(nodes: &[SceneNode], name: &str) -> bool {
    nodes
        .iter()
        .any(|n| n.name.as_deref() == Some(name) || find_node(&n.children, name))
}

impl SceneEngine for FakeScene {
    fn create_entity(&mut self, asset: &AssetHandle) -> EntityId {
        let mut s = self.state.borrow_mut();
        s.next_id += 1;
        let id = EntityId(s.next_id);
        let parsed = s.assets.get(&asset.url).cloned().unwrap_or_default();
        s.entities.insert(
            id,
            FakeEntity {
                asset: parsed,
                position: Vec3::ZERO,
                rotation: Vec3::ZERO,
                scale: Vec3::ONE,
                applied_scale: Vec3::ONE,
                visible: true,
                hidden_nodes: HashSet::new(),
            },
        );
        s.parsing.push(id);
        s.last_created = Some(id);
        id
    }

    fn remove_entity(&mut self, entity: EntityId) {
        let mut s = self.state.borrow_mut();
        s.entities.remove(&entity);
        s.parsing.retain(|e| *e != entity);
    }

    fn set_position(&mut self, entity: EntityId, position: Vec3) {
        if let Some(e) = self.state.borrow_mut().entities.get_mut(&entity) {
            e.position = position;
        }
    }

    fn set_rotation(&mut self, entity: EntityId, rotation: Vec3) {
        if let Some(e) = self.state.borrow_mut().entities.get_mut(&entity) {
            e.rotation = rotation;
        }
    }

    fn set_scale(&mut self, entity: EntityId, scale: Vec3) {
        if let Some(e) = self.state.borrow_mut().entities.get_mut(&entity) {
            e.scale = scale;
        }
    }

    fn position(&self, entity: EntityId) -> Option<Vec3> {
        self.state.borrow().entities.get(&entity).map(|e| e.position)
    }

    fn rotation(&self, entity: EntityId) -> Option<Vec3> {
        self.state.borrow().entities.get(&entity).map(|e| e.rotation)
    }

    fn scale(&self, entity: EntityId) -> Option<Vec3> {
        self.state.borrow().entities.get(&entity).map(|e| e.scale)
    }

    fn set_visible(&mut self, entity: EntityId, visible: bool) {
        if let Some(e) = self.state.borrow_mut().entities.get_mut(&entity) {
            e.visible = visible;
        }
    }

    fn is_visible(&self, entity: EntityId) -> bool {
        self.state
            .borrow()
            .entities
            .get(&entity)
            .is_some_and(|e| e.visible)
    }

    fn local_bounds(&self, entity: EntityId) -> Option<Aabb> {
        self.state
            .borrow()
            .entities
            .get(&entity)
            .map(|e| e.asset.bounds.scaled(e.applied_scale))
    }

    fn scene_nodes(&self, entity: EntityId) -> Vec<SceneNode> {
        self.state
            .borrow()
            .entities
            .get(&entity)
            .map(|e| e.asset.nodes.clone())
            .unwrap_or_default()
    }

    fn set_node_visible(&mut self, entity: EntityId, node: &str, visible: bool) -> bool {
        let mut s = self.state.borrow_mut();
        let Some(e) = s.entities.get_mut(&entity) else {
            return false;
        };
        if !find_node(&e.asset.nodes, node) {
            return false;
        }
        if visible {
            e.hidden_nodes.remove(node);
        } else {
            e.hidden_nodes.insert(node.to_string());
        }
        true
    }

    fn set_reticle(&mut self, pose: Option<&Pose>) {
        self.state.borrow_mut().reticle = pose.copied();
    }
}

// ── Asset fetcher ─────────────────────────────────────────────

/// Records requests; the test decides how and when each one completes
#[derive(Clone, Default)]
pub struct FakeFetcher {
    requests: Rc<RefCell<Vec<FetchRequest>>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_request(&self) -> Option<FetchRequest> {
        self.requests.borrow().last().cloned()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.borrow().clone()
    }
}

impl AssetFetcher for FakeFetcher {
    fn fetch(&mut self, request: FetchRequest) {
        self.requests.borrow_mut().push(request);
    }
}

// ── UI ────────────────────────────────────────────────────────

/// Everything the orchestrator told the view layer
#[derive(Debug, Clone, Default)]
pub struct UiRecord {
    pub controls_enabled: bool,
    /// Model the loading overlay is showing, if visible
    pub loading: Option<ModelId>,
    pub progress: Vec<ProgressDisplay>,
    pub notices: Vec<Notice>,
    pub scanning: bool,
    pub surface_detected: bool,
    pub active_model: Option<ModelId>,
    pub layers: Vec<LayerInfo>,
}

#[derive(Clone)]
pub struct FakeUi {
    record: Rc<RefCell<UiRecord>>,
}

impl Default for FakeUi {
    fn default() -> Self {
        Self {
            record: Rc::new(RefCell::new(UiRecord {
                controls_enabled: true,
                ..UiRecord::default()
            })),
        }
    }
}

impl FakeUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> UiRecord {
        self.record.borrow().clone()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.record.borrow().notices.last().cloned()
    }
}

impl PlacementUi for FakeUi {
    fn set_controls_enabled(&mut self, enabled: bool) {
        self.record.borrow_mut().controls_enabled = enabled;
    }

    fn show_loading(&mut self, model: &ModelSpec) {
        let mut r = self.record.borrow_mut();
        r.loading = Some(model.id.clone());
        r.progress.clear();
    }

    fn update_progress(&mut self, progress: ProgressDisplay) {
        self.record.borrow_mut().progress.push(progress);
    }

    fn hide_loading(&mut self) {
        self.record.borrow_mut().loading = None;
    }

    fn notify(&mut self, notice: Notice) {
        self.record.borrow_mut().notices.push(notice);
    }

    fn set_scanning(&mut self, scanning: bool) {
        self.record.borrow_mut().scanning = scanning;
    }

    fn set_surface_detected(&mut self, detected: bool) {
        self.record.borrow_mut().surface_detected = detected;
    }

    fn set_active_model(&mut self, model: Option<&ModelSpec>, layers: &[LayerInfo]) {
        let mut r = self.record.borrow_mut();
        r.active_model = model.map(|m| m.id.clone());
        r.layers = layers.to_vec();
    }
}
