//! Presentation boundary driven by the orchestrator.
//!
//! The view layer (gallery, loading overlay, toasts, layer list) is handed
//! in as a [`PlacementUi`] implementation; the core never looks up UI
//! elements on its own.

use shared::ModelSpec;

use crate::loader::{LayerInfo, LoadStage};
use crate::platform::FetchProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Dismissable notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What the loading indicator should display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDisplay {
    /// Continuous bar
    Percent(u8),
    /// Discrete stage, for downloads of unknown size
    Stage(LoadStage),
}

impl ProgressDisplay {
    pub fn from_progress(progress: &FetchProgress) -> Self {
        match progress.percent() {
            Some(pct) => ProgressDisplay::Percent(pct),
            None => ProgressDisplay::Stage(LoadStage::from_received(progress.received)),
        }
    }
}

pub trait PlacementUi {
    /// Gallery, reload and layer controls
    fn set_controls_enabled(&mut self, enabled: bool);
    fn show_loading(&mut self, model: &ModelSpec);
    fn update_progress(&mut self, progress: ProgressDisplay);
    fn hide_loading(&mut self);
    fn notify(&mut self, notice: Notice);
    /// Scanning hint shown while waiting for a tap
    fn set_scanning(&mut self, scanning: bool);
    fn set_surface_detected(&mut self, detected: bool);
    fn set_active_model(&mut self, model: Option<&ModelSpec>, layers: &[LayerInfo]);
}
