//! Server-Sent Events change feed for a single screen row

use eventsource_client as es;
use es::Client as _;
use futures::{Stream, StreamExt};
use kiosk_api_contract::{ChannelState, ScreenChange, ScreenId};
use kiosk_client_api::{ChannelRegistry, ChannelReporter, ScreenSubscription};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::auth::AuthConfig;
use crate::error::{RestClientError, RestClientResult};

const REALTIME_PATH: &str = "/realtime/v1/screens";

/// Longest silence tolerated on an open feed. The server sends a keepalive
/// comment at least every 30 seconds, so anything longer is a stalled
/// connection.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Connects row-scoped change feeds
pub struct ScreenChangeFeed;

impl ScreenChangeFeed {
    /// Open the feed for `id` and register it in `registry`
    ///
    /// The returned subscription starts in `Connecting`; the underlying
    /// client reconnects on its own and the registry reflects each outage.
    pub fn connect(
        base_url: &Url,
        id: &ScreenId,
        auth: &AuthConfig,
        registry: &ChannelRegistry,
    ) -> RestClientResult<ScreenSubscription> {
        let url = Self::feed_url(base_url, id)?;

        let mut builder = es::ClientBuilder::for_url(url.as_str())
            .map_err(|e| RestClientError::Sse(e.to_string()))?;
        let headers = auth.header_pairs().map_err(|e| RestClientError::Auth(e.to_string()))?;
        for (name, value) in &headers {
            builder = builder
                .header(name, value)
                .map_err(|e| RestClientError::Sse(e.to_string()))?;
        }
        let client = builder
            .reconnect(
                es::ReconnectOptions::reconnect(true)
                    .retry_initial(true)
                    .delay(Duration::from_secs(1))
                    .backoff_factor(2)
                    .delay_max(Duration::from_secs(30))
                    .build(),
            )
            .read_timeout(STALL_TIMEOUT)
            .build();

        let (tx, rx) = mpsc::channel(32);
        let channel = registry.register(ChannelState::Connecting);
        let reporter = channel.reporter();
        let screen_id = id.clone();

        let handle = tokio::spawn(pump(client.stream(), tx, reporter, screen_id, STALL_TIMEOUT));

        Ok(ScreenSubscription::new(rx, channel).with_task(handle))
    }

    fn feed_url(base_url: &Url, id: &ScreenId) -> RestClientResult<Url> {
        let mut url = base_url.join(REALTIME_PATH)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        Ok(url)
    }
}

/// Drive one feed until it ends or the subscriber goes away.
///
/// Silence longer than `stall` marks the channel `Errored` without dropping
/// the stream; the next item marks it `Open` again.
async fn pump<S>(
    mut stream: S,
    tx: mpsc::Sender<ScreenChange>,
    reporter: ChannelReporter,
    screen_id: ScreenId,
    stall: Duration,
) where
    S: Stream<Item = Result<es::SSE, es::Error>> + Unpin,
{
    loop {
        let item = match timeout(stall, stream.next()).await {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_) => {
                warn!(screen_id = %screen_id, silent_for = ?stall, "change feed stalled");
                reporter.set(ChannelState::Errored);
                continue;
            }
        };
        match item {
            Ok(es::SSE::Event(event)) => {
                reporter.set(ChannelState::Open);
                if !forward_event(&event.data, &tx, &screen_id).await {
                    break;
                }
            }
            Ok(_) => reporter.set(ChannelState::Open),
            Err(e) => {
                warn!(screen_id = %screen_id, error = %e, "change feed error");
                reporter.set(ChannelState::Errored);
            }
        }
    }
    close(&reporter, &screen_id);
}

/// Parse one SSE payload and hand it to the subscriber.
/// Returns `false` once the subscriber is gone.
async fn forward_event(data: &str, tx: &mpsc::Sender<ScreenChange>, screen_id: &ScreenId) -> bool {
    match serde_json::from_str::<ScreenChange>(data) {
        Ok(change) if change.record.id == *screen_id => tx.send(change).await.is_ok(),
        Ok(change) => {
            debug!(screen_id = %screen_id, other = %change.record.id, "ignoring change for another row");
            true
        }
        Err(e) => {
            warn!(screen_id = %screen_id, error = %e, "unparseable change event");
            true
        }
    }
}

fn close(reporter: &ChannelReporter, screen_id: &ScreenId) {
    debug!(screen_id = %screen_id, "change feed ended");
    reporter.set(ChannelState::Closed);
}
