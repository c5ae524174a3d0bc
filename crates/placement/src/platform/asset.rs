use std::sync::Arc;

use shared::ModelId;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Identifies one load attempt; stale ids mark results to discard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(pub u64);

/// Downloaded asset, ready to hand to the scene engine
#[derive(Debug, Clone, PartialEq)]
pub struct AssetHandle {
    pub url: String,
    pub data: Arc<[u8]>,
}

/// Download progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub received: u64,
    /// `None` when the server did not announce a length
    pub total: Option<u64>,
}

impl FetchProgress {
    /// Whole percent, `None` when indeterminate
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => {
                let pct = (self.received.min(total) * 100) / total;
                Some(pct as u8)
            }
            _ => None,
        }
    }

    /// Percent, or -1 when the total size is unknown
    pub fn percent_or_indeterminate(&self) -> i32 {
        self.percent().map(i32::from).unwrap_or(-1)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchFailure {
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out waiting for response")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
}

/// A download to start
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub load_id: LoadId,
    pub model_id: ModelId,
    pub url: String,
    pub cancel: CancellationToken,
}

/// Asynchronous outcome of a [`FetchRequest`]
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Progress {
        load_id: LoadId,
        progress: FetchProgress,
    },
    Completed {
        load_id: LoadId,
        asset: AssetHandle,
    },
    Failed {
        load_id: LoadId,
        failure: FetchFailure,
    },
}

impl FetchEvent {
    pub fn load_id(&self) -> LoadId {
        match self {
            FetchEvent::Progress { load_id, .. }
            | FetchEvent::Completed { load_id, .. }
            | FetchEvent::Failed { load_id, .. } => *load_id,
        }
    }
}

/// Asset delivery.
///
/// `fetch` returns immediately; progress and the final outcome are delivered
/// later as [`FetchEvent`]s through whatever channel the implementation owns.
pub trait AssetFetcher {
    fn fetch(&mut self, request: FetchRequest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_known_total() {
        let p = FetchProgress {
            received: 512,
            total: Some(2048),
        };
        assert_eq!(p.percent(), Some(25));
        assert_eq!(p.percent_or_indeterminate(), 25);
    }

    #[test]
    fn test_percent_unknown_total() {
        let p = FetchProgress {
            received: 4096,
            total: None,
        };
        assert_eq!(p.percent(), None);
        assert_eq!(p.percent_or_indeterminate(), -1);
    }

    #[test]
    fn test_percent_zero_total_is_indeterminate() {
        let p = FetchProgress {
            received: 0,
            total: Some(0),
        };
        assert_eq!(p.percent_or_indeterminate(), -1);
    }

    #[test]
    fn test_percent_caps_at_100() {
        let p = FetchProgress {
            received: 3000,
            total: Some(2000),
        };
        assert_eq!(p.percent(), Some(100));
    }
}
