//! Capability boundaries to the outside world.
//!
//! The core never talks to a browser, renderer or network stack directly.
//! Each collaborator is reached through one of these traits and handed in
//! at construction time:
//!
//! - [`XrPlatform`]: immersive session, reference spaces, per-frame hit tests
//! - [`SceneEngine`]: renderable entities, transforms, bounds, node visibility
//! - [`AssetFetcher`]: byte download with progress and cancellation

use glam::{Quat, Vec3};

pub mod asset;
pub mod scene;
pub mod xr;

pub use asset::{AssetFetcher, AssetHandle, FetchEvent, FetchFailure, FetchProgress, FetchRequest, LoadId};
pub use scene::{EngineEvent, NodeKind, SceneEngine, SceneNode};
pub use xr::{
    FrameInfo, HitTestResult, HitTestSourceHandle, ReferenceSpaceHandle, ReferenceSpaceKind,
    SessionHandle, SessionRequest, XrFeature, XrPlatform, XrRequestError,
};

/// Handle of a renderable entity owned by the scene engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// Position and orientation in session-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }
}
