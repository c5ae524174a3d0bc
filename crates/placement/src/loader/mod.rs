//! Model cache and loader.
//!
//! Turns a [`ModelSpec`] into a ready, real-world-scaled entity:
//!
//! ```text
//! load()            cache hit → Cached, no fetch
//!   └─> fetch       FetchEvent::Progress*  → LoadUpdate::Progress
//!   └─> Completed   engine.create_entity   → LoadUpdate::Parsing
//!   └─> AssetLoaded raw bounds → base scale, layers → LoadUpdate::Scaled
//!   └─> next frame  post-scale bounds → floor offset → LoadUpdate::Ready
//! ```
//!
//! Post-scale bounds are read one frame after the scale write so the engine
//! has applied it. Every load carries a [`LoadId`]; events for a cancelled
//! or superseded load are discarded.

pub mod cache;
pub mod fetch;
pub mod layers;

use std::collections::HashMap;

use glam::Vec3;
use shared::{ModelId, ModelSpec, PlacementConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use cache::{CachedModelEntry, LayerInfo, ModelCache};

use crate::error::ArError;
use crate::platform::{
    AssetFetcher, EngineEvent, EntityId, FetchEvent, FetchProgress, FetchRequest, LoadId,
    SceneEngine,
};

/// Discrete progress stage for downloads of unknown size
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadStage {
    Starting,
    Downloading,
    DownloadingLarge,
    AlmostThere,
}

impl LoadStage {
    const RECEIVING: u64 = 512 * 1024;
    const LARGE: u64 = 2 * 1024 * 1024;
    const VERY_LARGE: u64 = 8 * 1024 * 1024;

    pub fn from_received(bytes: u64) -> Self {
        if bytes >= Self::VERY_LARGE {
            LoadStage::AlmostThere
        } else if bytes >= Self::LARGE {
            LoadStage::DownloadingLarge
        } else if bytes >= Self::RECEIVING {
            LoadStage::Downloading
        } else {
            LoadStage::Starting
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadStage::Starting => "Starting download…",
            LoadStage::Downloading => "Downloading model…",
            LoadStage::DownloadingLarge => "Downloading large model…",
            LoadStage::AlmostThere => "Almost there…",
        }
    }
}

/// How a `load` call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStart {
    /// Ready entry already cached; no network call
    Cached,
    Started(LoadId),
}

/// Progress of the in-flight load, reported to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum LoadUpdate {
    Progress {
        model_id: ModelId,
        progress: FetchProgress,
    },
    /// Bytes handed to the engine, parse in progress
    Parsing { model_id: ModelId },
    /// Scale applied, bounds pending until the next frame
    Scaled { model_id: ModelId },
    Ready { model_id: ModelId },
    /// Entry and entity have already been removed
    Failed(ArError),
    /// Result of a cancelled load arrived late and was dropped
    Discarded(ArError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Fetching,
    Parsing(EntityId),
    AwaitingBounds(EntityId),
}

struct InFlight {
    load_id: LoadId,
    model_id: ModelId,
    cancel: CancellationToken,
    phase: Phase,
}

pub struct ModelLoader {
    cache: ModelCache,
    fetcher: Box<dyn AssetFetcher>,
    in_flight: Option<InFlight>,
    /// Loads cancelled by the user, so late results report as cancellations
    cancelled: HashMap<LoadId, ModelId>,
    next_load_id: u64,
    max_floor_offset: f32,
}

impl ModelLoader {
    pub fn new(fetcher: Box<dyn AssetFetcher>, config: &PlacementConfig) -> Self {
        Self {
            cache: ModelCache::new(),
            fetcher,
            in_flight: None,
            cancelled: HashMap::new(),
            next_load_id: 1,
            max_floor_offset: config.max_floor_offset.abs(),
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ModelCache {
        &mut self.cache
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn loading_model(&self) -> Option<&ModelId> {
        self.in_flight.as_ref().map(|f| &f.model_id)
    }

    pub fn current_load(&self) -> Option<LoadId> {
        self.in_flight.as_ref().map(|f| f.load_id)
    }

    /// Start loading `spec`, or return immediately when it is cached and ready
    pub fn load(&mut self, spec: &ModelSpec) -> Result<LoadStart, ArError> {
        if self.cache.is_ready(&spec.id) {
            debug!("Model '{}' served from cache", spec.id);
            return Ok(LoadStart::Cached);
        }
        if self.in_flight.is_some() {
            return Err(ArError::LoadInProgress);
        }

        let load_id = LoadId(self.next_load_id);
        self.next_load_id += 1;
        let cancel = CancellationToken::new();

        self.cache.insert_pending(spec.clone());
        self.in_flight = Some(InFlight {
            load_id,
            model_id: spec.id.clone(),
            cancel: cancel.clone(),
            phase: Phase::Fetching,
        });

        info!("Loading model '{}' from {}", spec.id, spec.url);
        self.fetcher.fetch(FetchRequest {
            load_id,
            model_id: spec.id.clone(),
            url: spec.url.clone(),
            cancel,
        });
        Ok(LoadStart::Started(load_id))
    }

    /// Abort the in-flight load. The caller discards partial state with
    /// [`ModelLoader::discard`].
    pub fn cancel(&mut self) -> Option<ModelId> {
        let flight = self.in_flight.take()?;
        flight.cancel.cancel();
        info!("Cancelled loading of '{}'", flight.model_id);
        self.cancelled.insert(flight.load_id, flight.model_id.clone());
        Some(flight.model_id)
    }

    /// Remove a not-yet-ready entry and any entity created for it
    pub fn discard(&mut self, model_id: &str, engine: &mut dyn SceneEngine) {
        if self.cache.is_ready(model_id) {
            return;
        }
        if let Some(entry) = self.cache.remove(model_id) {
            if let Some(entity) = entry.entity {
                engine.remove_entity(entity);
            }
            debug!("Discarded partial entry for '{model_id}'");
        }
    }

    /// Remove an entry and its entity regardless of readiness
    pub fn evict(&mut self, model_id: &str, engine: &mut dyn SceneEngine) -> bool {
        match self.cache.remove(model_id) {
            Some(entry) => {
                if let Some(entity) = entry.entity {
                    engine.remove_entity(entity);
                }
                info!("Evicted '{model_id}' from cache");
                true
            }
            None => false,
        }
    }

    /// Result for a load that is no longer in flight. A terminal event
    /// retires the cancelled-load record.
    fn stale(&mut self, load_id: LoadId, terminal: bool) -> Option<LoadUpdate> {
        let model_id = if terminal {
            self.cancelled.remove(&load_id)
        } else {
            self.cancelled.get(&load_id).cloned()
        };
        match model_id {
            Some(model_id) => {
                debug!("Dropping late result for cancelled load of '{model_id}'");
                Some(LoadUpdate::Discarded(ArError::UserCancelled(model_id)))
            }
            None => {
                debug!("Dropping result for unknown load {:?}", load_id);
                None
            }
        }
    }

    fn fail(&mut self, error: ArError, engine: &mut dyn SceneEngine) -> LoadUpdate {
        if let Some(flight) = self.in_flight.take() {
            self.discard(&flight.model_id, engine);
        }
        warn!("{error}");
        LoadUpdate::Failed(error)
    }

    pub fn handle_fetch_event(
        &mut self,
        event: FetchEvent,
        engine: &mut dyn SceneEngine,
    ) -> Option<LoadUpdate> {
        let load_id = event.load_id();
        if self.current_load() != Some(load_id) {
            let terminal = !matches!(event, FetchEvent::Progress { .. });
            return self.stale(load_id, terminal);
        }
        let flight = self.in_flight.as_mut()?;
        let model_id = flight.model_id.clone();

        match event {
            FetchEvent::Progress { progress, .. } => {
                Some(LoadUpdate::Progress { model_id, progress })
            }
            FetchEvent::Completed { asset, .. } => {
                if flight.phase != Phase::Fetching {
                    return None;
                }
                let entity = engine.create_entity(&asset);
                engine.set_visible(entity, false);
                flight.phase = Phase::Parsing(entity);
                if let Some(entry) = self.cache.get_mut(&model_id) {
                    entry.entity = Some(entity);
                }
                debug!("Model '{model_id}' downloaded ({} bytes)", asset.data.len());
                Some(LoadUpdate::Parsing { model_id })
            }
            // an abort the user did not ask for is an ordinary fetch failure
            FetchEvent::Failed { failure, .. } => Some(self.fail(
                ArError::Fetch {
                    model_id,
                    message: failure.to_string(),
                },
                engine,
            )),
        }
    }

    pub fn handle_engine_event(
        &mut self,
        event: &EngineEvent,
        engine: &mut dyn SceneEngine,
    ) -> Option<LoadUpdate> {
        let (entity, error) = match event {
            EngineEvent::AssetLoaded { entity } => (*entity, None),
            EngineEvent::AssetError { entity, message } => (*entity, Some(message.clone())),
        };
        let flight = self
            .in_flight
            .as_mut()
            .filter(|f| f.phase == Phase::Parsing(entity))?;
        let model_id = flight.model_id.clone();

        if let Some(message) = error {
            return Some(self.fail(ArError::Parse { model_id, message }, engine));
        }

        let spec = self.cache.get(&model_id)?.spec.clone();
        let base_scale = compute_base_scale(&spec, engine.local_bounds(entity));
        engine.set_scale(entity, Vec3::splat(base_scale));
        engine.set_rotation(entity, Vec3::ZERO);

        let layers = if spec.layers.is_empty() {
            layers::discover_layers(&engine.scene_nodes(entity))
        } else {
            layers::declared_layers(&spec.layers)
        };

        if let Some(entry) = self.cache.get_mut(&model_id) {
            entry.base_scale = base_scale;
            entry.layers = layers;
        }
        flight.phase = Phase::AwaitingBounds(entity);
        debug!("Model '{model_id}' parsed, base scale {base_scale}");
        Some(LoadUpdate::Scaled { model_id })
    }

    /// Per-frame step: finish a load whose scale has been applied
    pub fn on_frame(&mut self, engine: &mut dyn SceneEngine) -> Option<LoadUpdate> {
        let flight = self.in_flight.as_ref()?;
        let Phase::AwaitingBounds(entity) = flight.phase else {
            return None;
        };

        let floor_offset = match engine.local_bounds(entity).filter(|b| b.is_valid()) {
            Some(bounds) => (-bounds.min.y).clamp(-self.max_floor_offset, self.max_floor_offset),
            None => {
                warn!("No bounds for '{}', floor offset 0", flight.model_id);
                0.0
            }
        };

        let flight = self.in_flight.take()?;
        let entry = self.cache.get_mut(&flight.model_id)?;
        entry.floor_offset = floor_offset;
        entry.ready = true;
        info!(
            "Model '{}' ready (scale {}, floor offset {floor_offset})",
            flight.model_id, entry.base_scale
        );
        Some(LoadUpdate::Ready {
            model_id: flight.model_id,
        })
    }
}

/// `target / largest dimension`, or the model's default scale for degenerate bounds
fn compute_base_scale(spec: &ModelSpec, raw: Option<crate::viewport::Aabb>) -> f32 {
    let largest = raw
        .filter(|b| b.is_valid())
        .map(|b| b.largest_dimension())
        .filter(|d| *d > f32::EPSILON);
    match largest {
        Some(d) if spec.target_size_meters > 0.0 => spec.target_size_meters / d,
        _ => {
            warn!("Degenerate bounds for '{}', using default scale", spec.id);
            spec.default_scale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FakeAsset, FakeFetcher, FakeScene};
    use crate::platform::{AssetHandle, EngineEvent, FetchFailure};
    use crate::viewport::Aabb;
    use approx::assert_relative_eq;

    fn house_spec() -> ModelSpec {
        ModelSpec::new("house1", "House", "models/house1.glb").with_target_size(0.5)
    }

    fn house_asset() -> FakeAsset {
        // height 2.0 is the largest dimension; min y -1.2
        FakeAsset::new(Aabb::new(Vec3::new(-0.5, -1.2, -0.5), Vec3::new(0.5, 0.8, 0.5)))
    }

    fn setup() -> (ModelLoader, FakeFetcher, FakeScene) {
        let fetcher = FakeFetcher::new();
        let loader = ModelLoader::new(Box::new(fetcher.clone()), &PlacementConfig::default());
        let mut scene = FakeScene::new();
        scene.register_asset("models/house1.glb", house_asset());
        (loader, fetcher, scene)
    }

    fn completed(load_id: LoadId, url: &str) -> FetchEvent {
        FetchEvent::Completed {
            load_id,
            asset: AssetHandle {
                url: url.to_string(),
                data: vec![0u8; 16].into(),
            },
        }
    }

    fn run_to_ready(loader: &mut ModelLoader, scene: &mut FakeScene, spec: &ModelSpec) -> LoadId {
        let LoadStart::Started(id) = loader.load(spec).unwrap() else {
            panic!("expected a fetch");
        };
        loader.handle_fetch_event(completed(id, &spec.url), scene).unwrap();
        let entity = scene.last_created().unwrap();
        loader
            .handle_engine_event(&EngineEvent::AssetLoaded { entity }, scene)
            .unwrap();
        scene.apply_pending();
        assert!(matches!(loader.on_frame(scene), Some(LoadUpdate::Ready { .. })));
        id
    }

    #[test]
    fn test_scale_and_floor_offset() {
        let (mut loader, _fetcher, mut scene) = setup();
        run_to_ready(&mut loader, &mut scene, &house_spec());

        let entry = loader.cache().get("house1").unwrap();
        assert!(entry.ready);
        assert_relative_eq!(entry.base_scale, 0.25);
        assert_relative_eq!(entry.floor_offset, 0.3, epsilon = 1e-6);
        assert!(!scene.is_visible(entry.entity.unwrap()));
    }

    #[test]
    fn test_floor_offset_uses_post_scale_bounds() {
        let (mut loader, _fetcher, mut scene) = setup();
        let spec = house_spec();
        let LoadStart::Started(id) = loader.load(&spec).unwrap() else {
            panic!()
        };
        loader.handle_fetch_event(completed(id, &spec.url), &mut scene);
        let entity = scene.last_created().unwrap();
        loader.handle_engine_event(&EngineEvent::AssetLoaded { entity }, &mut scene);

        // the scale write has not been applied yet; nothing finishes early
        assert!(!loader.cache().is_ready("house1"));
        scene.apply_pending();
        loader.on_frame(&mut scene);
        assert_relative_eq!(
            loader.cache().get("house1").unwrap().floor_offset,
            0.3,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_cached_load_does_not_fetch() {
        let (mut loader, fetcher, mut scene) = setup();
        run_to_ready(&mut loader, &mut scene, &house_spec());
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(loader.load(&house_spec()).unwrap(), LoadStart::Cached);
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[test]
    fn test_second_load_while_in_flight_is_rejected() {
        let (mut loader, _fetcher, _scene) = setup();
        loader.load(&house_spec()).unwrap();
        let other = ModelSpec::new("house2", "Villa", "models/house2.glb");
        assert_eq!(loader.load(&other), Err(ArError::LoadInProgress));
    }

    #[test]
    fn test_fetch_failure_evicts_entry() {
        let (mut loader, _fetcher, mut scene) = setup();
        let LoadStart::Started(id) = loader.load(&house_spec()).unwrap() else {
            panic!()
        };
        let update = loader.handle_fetch_event(
            FetchEvent::Failed {
                load_id: id,
                failure: FetchFailure::Http(404),
            },
            &mut scene,
        );
        assert!(matches!(update, Some(LoadUpdate::Failed(ArError::Fetch { .. }))));
        assert!(!loader.cache().contains("house1"));
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_parse_failure_removes_entity_and_entry() {
        let (mut loader, _fetcher, mut scene) = setup();
        let LoadStart::Started(id) = loader.load(&house_spec()).unwrap() else {
            panic!()
        };
        loader.handle_fetch_event(completed(id, "models/house1.glb"), &mut scene);
        let entity = scene.last_created().unwrap();
        let update = loader.handle_engine_event(
            &EngineEvent::AssetError {
                entity,
                message: "invalid glTF".into(),
            },
            &mut scene,
        );
        assert!(matches!(update, Some(LoadUpdate::Failed(ArError::Parse { .. }))));
        assert!(!loader.cache().contains("house1"));
        assert!(!scene.exists(entity));
    }

    #[test]
    fn test_late_completion_after_cancel_is_discarded() {
        let (mut loader, fetcher, mut scene) = setup();
        let LoadStart::Started(id) = loader.load(&house_spec()).unwrap() else {
            panic!()
        };
        assert_eq!(loader.cancel().as_deref(), Some("house1"));
        loader.discard("house1", &mut scene);
        assert!(fetcher.last_request().unwrap().cancel.is_cancelled());

        let update = loader.handle_fetch_event(completed(id, "models/house1.glb"), &mut scene);
        assert_eq!(
            update,
            Some(LoadUpdate::Discarded(ArError::UserCancelled("house1".into())))
        );
        assert_eq!(scene.entity_count(), 0);
        assert!(!loader.cache().contains("house1"));
    }

    #[test]
    fn test_unrequested_abort_fails_the_load() {
        let (mut loader, _fetcher, mut scene) = setup();
        let LoadStart::Started(id) = loader.load(&house_spec()).unwrap() else {
            panic!()
        };
        let update = loader.handle_fetch_event(
            FetchEvent::Failed {
                load_id: id,
                failure: FetchFailure::Cancelled,
            },
            &mut scene,
        );
        assert!(matches!(update, Some(LoadUpdate::Failed(ArError::Fetch { .. }))));
        assert!(!loader.is_loading());
        assert!(!loader.cache().contains("house1"));
    }

    #[test]
    fn test_cancelled_record_retired_by_terminal_event() {
        let (mut loader, _fetcher, mut scene) = setup();
        let LoadStart::Started(id) = loader.load(&house_spec()).unwrap() else {
            panic!()
        };
        loader.cancel();
        loader.discard("house1", &mut scene);

        let progress = FetchEvent::Progress {
            load_id: id,
            progress: FetchProgress {
                received: 10,
                total: None,
            },
        };
        assert!(matches!(
            loader.handle_fetch_event(progress, &mut scene),
            Some(LoadUpdate::Discarded(_))
        ));
        assert_eq!(loader.cancelled.len(), 1);

        let aborted = FetchEvent::Failed {
            load_id: id,
            failure: FetchFailure::Cancelled,
        };
        assert!(matches!(
            loader.handle_fetch_event(aborted.clone(), &mut scene),
            Some(LoadUpdate::Discarded(_))
        ));
        assert!(loader.cancelled.is_empty());
        assert_eq!(loader.handle_fetch_event(aborted, &mut scene), None);
    }

    #[test]
    fn test_degenerate_bounds_fall_back_to_default_scale() {
        let fetcher = FakeFetcher::new();
        let mut loader = ModelLoader::new(Box::new(fetcher), &PlacementConfig::default());
        let mut scene = FakeScene::new();
        scene.register_asset("flat.glb", FakeAsset::new(Aabb::new(Vec3::ZERO, Vec3::ZERO)));
        let mut spec = ModelSpec::new("flat", "Flat", "flat.glb");
        spec.default_scale = 2.0;
        run_to_ready(&mut loader, &mut scene, &spec);
        assert_relative_eq!(loader.cache().get("flat").unwrap().base_scale, 2.0);
    }

    #[test]
    fn test_floor_offset_is_clamped() {
        let fetcher = FakeFetcher::new();
        let mut loader = ModelLoader::new(Box::new(fetcher), &PlacementConfig::default());
        let mut scene = FakeScene::new();
        // tall thin spike far below the origin
        scene.register_asset(
            "spike.glb",
            FakeAsset::new(Aabb::new(Vec3::new(0.0, -1000.0, 0.0), Vec3::new(0.1, -990.0, 0.1))),
        );
        let spec = ModelSpec::new("spike", "Spike", "spike.glb").with_target_size(10.0);
        run_to_ready(&mut loader, &mut scene, &spec);
        assert_relative_eq!(loader.cache().get("spike").unwrap().floor_offset, 5.0);
    }

    #[test]
    fn test_declared_layers_override_discovery() {
        let (mut loader, _fetcher, mut scene) = setup();
        let spec = house_spec().with_layers(vec![shared::LayerSpec {
            name: "roof".into(),
            label: None,
        }]);
        run_to_ready(&mut loader, &mut scene, &spec);
        let layers = &loader.cache().get("house1").unwrap().layers;
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].label, "Roof");
    }

    #[test]
    fn test_load_stage_thresholds() {
        assert_eq!(LoadStage::from_received(0), LoadStage::Starting);
        assert_eq!(LoadStage::from_received(600 * 1024), LoadStage::Downloading);
        assert_eq!(LoadStage::from_received(3 * 1024 * 1024), LoadStage::DownloadingLarge);
        assert_eq!(LoadStage::from_received(9 * 1024 * 1024), LoadStage::AlmostThere);
    }
}
