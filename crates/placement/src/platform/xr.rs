use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use super::Pose;

/// Session capabilities that can be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XrFeature {
    HitTest,
    DomOverlay,
    LocalFloor,
}

impl XrFeature {
    /// Feature descriptor string used by the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            XrFeature::HitTest => "hit-test",
            XrFeature::DomOverlay => "dom-overlay",
            XrFeature::LocalFloor => "local-floor",
        }
    }
}

/// One capability-set candidate for a session request
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub required: Vec<XrFeature>,
    pub optional: Vec<XrFeature>,
}

impl SessionRequest {
    /// Candidates in priority order: richest first, bare hit-test last
    pub fn candidates() -> Vec<SessionRequest> {
        vec![
            SessionRequest {
                required: vec![XrFeature::HitTest],
                optional: vec![XrFeature::DomOverlay, XrFeature::LocalFloor],
            },
            SessionRequest {
                required: vec![XrFeature::HitTest],
                optional: vec![XrFeature::LocalFloor],
            },
            SessionRequest {
                required: vec![XrFeature::HitTest],
                optional: Vec::new(),
            },
        ]
    }

    pub fn describe(&self) -> String {
        let names = |fs: &[XrFeature]| fs.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(",");
        format!(
            "required=[{}] optional=[{}]",
            names(&self.required),
            names(&self.optional)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceSpaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitTestSourceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSpaceKind {
    Viewer,
    Local,
    LocalFloor,
}

/// Rejection of a platform request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XrRequestError {
    /// The requested capability set is not supported; a smaller set may be
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("permission denied: {0}")]
    Denied(String),
    #[error("request failed: {0}")]
    Failed(String),
}

/// Per-frame context handed to the hit-test query
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub index: u64,
    pub time: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTestResult {
    pub pose: Pose,
    /// 1.0 when the platform does not report confidence
    pub confidence: f32,
}

impl HitTestResult {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            confidence: 1.0,
        }
    }
}

/// Immersive AR session capabilities.
///
/// Request methods are the asynchronous suspension points; per-frame
/// queries are synchronous and must not block.
#[async_trait(?Send)]
pub trait XrPlatform {
    async fn request_session(
        &mut self,
        request: &SessionRequest,
    ) -> Result<SessionHandle, XrRequestError>;

    async fn request_reference_space(
        &mut self,
        session: SessionHandle,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpaceHandle, XrRequestError>;

    async fn request_hit_test_source(
        &mut self,
        session: SessionHandle,
        space: ReferenceSpaceHandle,
    ) -> Result<HitTestSourceHandle, XrRequestError>;

    /// Hit results for `frame`, closest first, resolved in `space`
    fn hit_test_results(
        &mut self,
        frame: &FrameInfo,
        source: HitTestSourceHandle,
        space: ReferenceSpaceHandle,
    ) -> Vec<HitTestResult>;

    fn cancel_hit_test_source(&mut self, source: HitTestSourceHandle);

    fn end_session(&mut self, session: SessionHandle);
}
