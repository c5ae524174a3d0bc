//! HTTP asset fetcher with streamed progress and cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use shared::NetworkConfig;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::platform::{AssetFetcher, AssetHandle, FetchEvent, FetchFailure, FetchProgress, FetchRequest, LoadId};

/// Upper bound for the initial buffer reservation
const MAX_PREALLOCATE: u64 = 64 * 1024 * 1024;

/// Downloads assets on the tokio runtime and reports through a channel.
///
/// Must be used from inside a runtime; the host loop drains the receiver
/// and forwards each event to the orchestrator.
pub struct HttpFetcher {
    client: reqwest::Client,
    events: UnboundedSender<FetchEvent>,
    response_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(events: UnboundedSender<FetchEvent>, config: &NetworkConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            events,
            response_timeout: Duration::from_millis(config.asset_response_timeout_ms),
        }
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&mut self, request: FetchRequest) {
        let client = self.client.clone();
        let events = self.events.clone();
        let timeout = self.response_timeout;

        tokio::spawn(async move {
            let FetchRequest {
                load_id,
                model_id,
                url,
                cancel,
            } = request;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchFailure::Cancelled),
                result = download(&client, &url, load_id, &events, timeout) => result,
            };

            let event = match outcome {
                Ok(asset) => FetchEvent::Completed { load_id, asset },
                Err(failure) => {
                    if failure == FetchFailure::Cancelled {
                        debug!("Download of '{model_id}' cancelled");
                    } else {
                        warn!("Download of '{model_id}' failed: {failure}");
                    }
                    FetchEvent::Failed { load_id, failure }
                }
            };
            // a closed channel means the host loop is gone
            let _ = events.send(event);
        });
    }
}

async fn download(
    client: &reqwest::Client,
    url: &str,
    load_id: LoadId,
    events: &UnboundedSender<FetchEvent>,
    timeout: Duration,
) -> Result<AssetHandle, FetchFailure> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| FetchFailure::Timeout)?
        .map_err(|e| FetchFailure::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchFailure::Http(status.as_u16()));
    }

    let total = response.content_length();
    let mut received = 0u64;
    let mut data = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOCATE) as usize);
    let _ = events.send(FetchEvent::Progress {
        load_id,
        progress: FetchProgress { received, total },
    });

    // each chunk gets the same bounded wait as the response head
    let mut stream = response.bytes_stream();
    while let Some(chunk) = tokio::time::timeout(timeout, stream.next())
        .await
        .map_err(|_| FetchFailure::Timeout)?
    {
        let chunk = chunk.map_err(|e| FetchFailure::Network(e.to_string()))?;
        received += chunk.len() as u64;
        data.extend_from_slice(&chunk);
        let _ = events.send(FetchEvent::Progress {
            load_id,
            progress: FetchProgress { received, total },
        });
    }

    Ok(AssetHandle {
        url: url.to_string(),
        data: Arc::from(data),
    })
}
