// WebSocket feed connector
// Owns exactly one live connection to the configured exchange endpoint and
// runs its receive loop on a dedicated task so it never blocks consumers.

use crate::config::Config;
use crate::core::orderbook::{BookUpdate, PriceLevel};
use crate::core::simulator::SimulationController;
use crate::error::{SimulatorError, SimulatorResult};
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{error, info, warn};

/// How long `disconnect` waits for the receive loop before abandoning it
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Inbound wire schema: one JSON object per feed message. Prices and sizes
/// travel as decimal strings; sides are full snapshots and optional.
#[derive(Debug, Clone, Deserialize)]
pub struct BookMessage {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub symbol: String,
    pub bids: Option<Vec<(String, String)>>,
    pub asks: Option<Vec<(String, String)>>,
}

fn parse_side(levels: Vec<(String, String)>) -> SimulatorResult<Vec<PriceLevel>> {
    levels
        .into_iter()
        .map(|(price, size)| {
            let price = price
                .parse::<f64>()
                .map_err(|e| SimulatorError::Decode(format!("bad price '{}': {}", price, e)))?;
            let size = size
                .parse::<f64>()
                .map_err(|e| SimulatorError::Decode(format!("bad size '{}': {}", size, e)))?;
            Ok(PriceLevel { price, size })
        })
        .collect()
}

/// Decode one raw feed message into a book update
pub fn decode_book_message(text: &str) -> SimulatorResult<BookUpdate> {
    let message: BookMessage =
        serde_json::from_str(text).map_err(|e| SimulatorError::Decode(e.to_string()))?;

    Ok(BookUpdate {
        timestamp: message.timestamp,
        exchange: message.exchange,
        symbol: message.symbol,
        bids: message.bids.map(parse_side).transpose()?,
        asks: message.asks.map(parse_side).transpose()?,
    })
}

/// Owns the connection lifecycle for one exchange endpoint/pair.
///
/// `connect` is a no-op while a loop is live; `disconnect` signals the loop
/// and waits a bounded time, abandoning the connection rather than killing
/// it on timeout. There is no automatic reconnect: after a remote close the
/// operator calls `connect` again.
pub struct FeedConnector {
    url: String,
    controller: Arc<SimulationController>,
    handle: Option<JoinHandle<()>>,
    stop: Option<watch::Sender<bool>>,
}

impl FeedConnector {
    pub fn new(config: &Config, controller: Arc<SimulationController>) -> SimulatorResult<Self> {
        let params = controller.parameters();
        let exchange = config
            .exchange(&params.exchange)
            .ok_or_else(|| SimulatorError::UnknownExchange(params.exchange.clone()))?;

        Ok(Self {
            url: exchange.endpoint_for(&params.pair),
            controller,
            handle: None,
            stop: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the receive loop is currently live
    pub fn is_connected(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Start the receive loop; no-op if already connected
    pub async fn connect(&mut self) -> SimulatorResult<()> {
        if self.is_connected() {
            warn!("Already connected to feed");
            return Ok(());
        }

        info!(url = %self.url, "Connecting to feed");
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SimulatorError::Connection(e.to_string()))?;
        info!(url = %self.url, "Connected to feed");

        let (stop_tx, stop_rx) = watch::channel(false);
        let controller = Arc::clone(&self.controller);
        controller.set_connected(true);

        self.handle = Some(tokio::spawn(receive_loop(ws_stream, controller, stop_rx)));
        self.stop = Some(stop_tx);
        Ok(())
    }

    /// Signal the loop to stop and wait a bounded time for it to exit.
    /// Idempotent; a timed-out loop is abandoned, not force-killed.
    pub async fn disconnect(&mut self) {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                warn!("Not connected to feed");
                return;
            }
        };
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(true);
        }

        if handle.is_finished() {
            info!("Feed already stopped");
        } else {
            match tokio::time::timeout(DISCONNECT_TIMEOUT, handle).await {
                Ok(_) => info!("Disconnected from feed"),
                Err(_) => warn!("Feed loop did not stop in time, abandoning connection"),
            }
        }
        self.controller.set_connected(false);
    }
}

async fn receive_loop(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    controller: Arc<SimulationController>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let (_sender, mut receiver) = ws_stream.split();

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    info!("Feed stop signal observed");
                    break;
                }
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => match decode_book_message(&text) {
                    Ok(update) => controller.on_book_update(update),
                    Err(e) => warn!(error = %e, "Dropping undecodable feed message"),
                },
                Some(Ok(Message::Close(_))) => {
                    warn!("Feed connection closed by remote");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "Feed stream error");
                    break;
                }
                None => {
                    warn!("Feed stream ended");
                    break;
                }
            }
        }
    }

    controller.set_connected(false);
    info!("Feed receive loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulator::SimulationParameters;

    fn test_controller() -> Arc<SimulationController> {
        let config = Config::default();
        let params = SimulationParameters::from_config(&config).unwrap();
        Arc::new(SimulationController::new(config, params).unwrap())
    }

    #[test]
    fn test_decode_full_message() {
        let text = r#"{
            "timestamp": "2024-01-01T00:00:00Z",
            "exchange": "OKX",
            "symbol": "BTC-USDT-SWAP",
            "bids": [["100.5", "2"], ["100.0", "5"]],
            "asks": [["101.0", "3"]]
        }"#;

        let update = decode_book_message(text).unwrap();
        assert_eq!(update.exchange, "OKX");
        let bids = update.bids.unwrap();
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].price, 100.5);
        assert_eq!(bids[0].size, 2.0);
        assert_eq!(update.asks.unwrap()[0].price, 101.0);
    }

    #[test]
    fn test_decode_missing_side() {
        let text = r#"{
            "timestamp": "t", "exchange": "OKX", "symbol": "S",
            "asks": [["101.0", "3"]]
        }"#;

        let update = decode_book_message(text).unwrap();
        assert!(update.bids.is_none());
        assert!(update.asks.is_some());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(matches!(
            decode_book_message("not json"),
            Err(SimulatorError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_number() {
        let text = r#"{"bids": [["abc", "2"]], "asks": []}"#;
        assert!(matches!(
            decode_book_message(text),
            Err(SimulatorError::Decode(_))
        ));
    }

    #[test]
    fn test_connector_builds_endpoint_url() {
        let config = Config::default();
        let connector = FeedConnector::new(&config, test_controller()).unwrap();
        assert_eq!(
            connector.url(),
            "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP"
        );
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_without_connection() {
        let config = Config::default();
        let mut connector = FeedConnector::new(&config, test_controller()).unwrap();

        connector.disconnect().await;
        connector.disconnect().await;
        assert!(!connector.is_connected());
    }
}
