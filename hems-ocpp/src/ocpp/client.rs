//! OCPP 1.6 WebSocket client
//!
//! Implements the charge point side of an OCPP-J connection to a central system.
//! Handles:
//! - WebSocket connection with the `ocpp1.6` subprotocol
//! - Request/response correlation by message id
//! - Dispatch of central system calls to a [`CoreHandler`]
//!
//! Reconnection is left to the caller: a dropped connection surfaces as an
//! error on the next request and `start` may simply be called again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{header, HeaderValue, Uri},
        protocol::WebSocketConfig,
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use super::handler::{dispatch, CoreHandler};
use super::messages::*;
use super::types::*;

/// OCPP 1.6 JSON WebSocket subprotocol
pub const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

/// Charge point operations the status reporter relies on
pub trait ChargePoint: Send + Sync {
    /// Register the handler answering central system calls
    fn set_core_handler(&self, handler: Arc<dyn CoreHandler>);

    /// Open the connection to the central system at `uri`
    fn start(&self, uri: &str) -> impl Future<Output = Result<(), OcppError>> + Send;

    /// Report the status of a single connector
    fn status_notification(
        &self,
        connector_id: i32,
        error_code: ChargePointErrorCode,
        status: ChargePointStatus,
    ) -> impl Future<Output = Result<StatusNotificationResponse, OcppError>> + Send;
}

/// Configuration for the OCPP client
#[derive(Debug, Clone)]
pub struct OcppClientConfig {
    /// Charge point identity (appended to the URL path)
    pub station_id: String,
    /// Time to wait for a CALLRESULT before giving up
    pub request_timeout: Duration,
}

impl OcppClientConfig {
    pub fn new(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<CallResult, OcppError>>>>>;
type HandlerSlot = Arc<RwLock<Option<Arc<dyn CoreHandler>>>>;

/// Slot in the pending table, removed when the request finishes or is dropped
struct PendingEntry<'a> {
    pending: &'a Pending,
    message_id: String,
}

impl<'a> PendingEntry<'a> {
    fn insert(
        pending: &'a Pending,
        message_id: String,
        tx: oneshot::Sender<Result<CallResult, OcppError>>,
    ) -> Self {
        pending.lock().insert(message_id.clone(), tx);
        Self {
            pending,
            message_id,
        }
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.message_id);
    }
}

/// A live connection: the outgoing queue and the task owning the socket
struct Connection {
    outgoing_tx: mpsc::Sender<OcppMessage>,
    task: JoinHandle<()>,
}

/// OCPP WebSocket client
pub struct OcppClient {
    config: OcppClientConfig,
    handler: HandlerSlot,
    pending: Pending,
    connection: Mutex<Option<Connection>>,
}

impl OcppClient {
    /// Create a new, unconnected client
    pub fn new(config: OcppClientConfig) -> Self {
        Self {
            config,
            handler: Arc::new(RwLock::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            connection: Mutex::new(None),
        }
    }

    /// Whether a connection task is currently running
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|c| !c.task.is_finished())
    }

    /// Tear down the current connection, failing any in-flight requests
    pub fn stop(&self) {
        if let Some(conn) = self.connection.lock().take() {
            conn.task.abort();
            debug!("Connection to central system stopped");
        }
        self.pending.lock().clear();
    }

    /// Send a request and wait for the matching response
    pub async fn request(&self, call: Call) -> Result<CallResult, OcppError> {
        let outgoing_tx = self
            .connection
            .lock()
            .as_ref()
            .map(|c| c.outgoing_tx.clone())
            .ok_or(OcppError::NotConnected)?;

        let (response_tx, response_rx) = oneshot::channel();
        let _entry = PendingEntry::insert(&self.pending, call.message_id.clone(), response_tx);

        if outgoing_tx.send(OcppMessage::Call(call)).await.is_err() {
            return Err(OcppError::ConnectionClosed);
        }

        match tokio::time::timeout(self.config.request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OcppError::ConnectionClosed),
            Err(_) => Err(OcppError::Timeout),
        }
    }

    async fn connect(&self, uri: &str) -> Result<(), OcppError> {
        self.stop();

        let url = build_ocpp_url(uri, &self.config.station_id);
        info!("Connecting to central system: {}", url);

        let uri: Uri = url
            .parse()
            .map_err(|e| OcppError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(uri.scheme_str(), Some("ws" | "wss")) || uri.host().is_none() {
            return Err(OcppError::InvalidUrl(url));
        }

        let mut request = uri.into_client_request()?;
        request.headers_mut().insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(OCPP_SUBPROTOCOL),
        );

        let ws_config = WebSocketConfig {
            max_message_size: Some(64 * 1024),
            max_frame_size: Some(16 * 1024),
            ..Default::default()
        };

        let (ws_stream, response) =
            connect_async_with_config(request, Some(ws_config), false).await?;

        let accepted_protocol = response
            .headers()
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok());

        if accepted_protocol != Some(OCPP_SUBPROTOCOL) {
            warn!(
                "Central system did not accept {} subprotocol, got: {:?}",
                OCPP_SUBPROTOCOL, accepted_protocol
            );
        }

        info!("WebSocket connected to {}", url);

        let (outgoing_tx, outgoing_rx) = mpsc::channel(64);
        let task = tokio::spawn(connection_loop(
            ws_stream,
            outgoing_rx,
            self.pending.clone(),
            self.handler.clone(),
        ));

        *self.connection.lock() = Some(Connection { outgoing_tx, task });
        Ok(())
    }
}

impl ChargePoint for OcppClient {
    fn set_core_handler(&self, handler: Arc<dyn CoreHandler>) {
        *self.handler.write() = Some(handler);
    }

    async fn start(&self, uri: &str) -> Result<(), OcppError> {
        self.connect(uri).await
    }

    async fn status_notification(
        &self,
        connector_id: i32,
        error_code: ChargePointErrorCode,
        status: ChargePointStatus,
    ) -> Result<StatusNotificationResponse, OcppError> {
        let call = Call::status_notification(connector_id, error_code, status)?;
        let result = self.request(call).await?;
        result.parse_payload()
    }
}

impl Drop for OcppClient {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.get_mut().take() {
            conn.task.abort();
        }
    }
}

/// Own the socket until it closes: write queued frames, route incoming ones
async fn connection_loop(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outgoing_rx: mpsc::Receiver<OcppMessage>,
    pending: Pending,
    handler: HandlerSlot,
) {
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => {
                let Some(msg) = outgoing else {
                    debug!("Client dropped, closing connection");
                    break;
                };
                if let Err(e) = send_frame(&mut ws_tx, &msg).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }

            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received: {}", text);
                        if let Some(reply) = route_frame(text.as_bytes(), &pending, &handler) {
                            if let Err(e) = send_frame(&mut ws_tx, &reply).await {
                                error!("Failed to send reply: {}", e);
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by central system");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Later requests fail on send; dropping the senders fails the waiting ones
    outgoing_rx.close();
    pending.lock().clear();
}

async fn send_frame<S>(sink: &mut S, msg: &OcppMessage) -> Result<(), OcppError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let bytes = msg.to_bytes()?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    debug!("Sending: {}", text);
    sink.send(Message::Text(text)).await?;
    Ok(())
}

/// Handle one incoming frame, returning the reply to send if any
fn route_frame(bytes: &[u8], pending: &Pending, handler: &HandlerSlot) -> Option<OcppMessage> {
    match OcppMessage::parse(bytes) {
        Ok(OcppMessage::Call(call)) => {
            let handler = handler.read().clone();
            let reply = match handler {
                Some(h) => dispatch(h.as_ref(), &call),
                None => OcppMessage::CallError(CallError::new(
                    call.message_id,
                    ErrorCode::NotSupported,
                    "No handler registered",
                )),
            };
            Some(reply)
        }
        Ok(OcppMessage::CallResult(result)) => {
            match pending.lock().remove(&result.message_id) {
                Some(tx) => {
                    let _ = tx.send(Ok(result));
                }
                None => warn!("Unexpected CALLRESULT {}", result.message_id),
            }
            None
        }
        Ok(OcppMessage::CallError(err)) => {
            match pending.lock().remove(&err.message_id) {
                Some(tx) => {
                    let _ = tx.send(Err(err.into()));
                }
                None => warn!("Unexpected CALLERROR {}", err.message_id),
            }
            None
        }
        Err(OcppError::UnsupportedAction { message_id, action }) => {
            warn!("Central system called unsupported action {}", action);
            Some(OcppMessage::CallError(CallError::new(
                message_id,
                ErrorCode::NotImplemented,
                format!("{action} is not implemented"),
            )))
        }
        Err(e) => {
            warn!("Failed to parse OCPP message: {}", e);
            None
        }
    }
}

/// Build the full OCPP WebSocket URL
pub fn build_ocpp_url(base_url: &str, station_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), station_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Defaults;
    impl CoreHandler for Defaults {}

    #[test]
    fn test_build_ocpp_url() {
        let url = build_ocpp_url("ws://localhost:8887/ocpp", "evcc");
        assert_eq!(url, "ws://localhost:8887/ocpp/evcc");

        let url = build_ocpp_url("ws://localhost:8887/ocpp/", "evcc");
        assert_eq!(url, "ws://localhost:8887/ocpp/evcc");
    }

    #[test]
    fn test_route_call_result_resolves_pending() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let handler: HandlerSlot = Arc::new(RwLock::new(None));
        let (tx, mut rx) = oneshot::channel();
        pending.lock().insert("id-1".to_string(), tx);

        let reply = route_frame(br#"[3, "id-1", {}]"#, &pending, &handler);
        assert!(reply.is_none());
        assert!(pending.lock().is_empty());
        assert!(matches!(rx.try_recv(), Ok(Ok(_))));
    }

    #[test]
    fn test_route_call_error_resolves_pending() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let handler: HandlerSlot = Arc::new(RwLock::new(None));
        let (tx, mut rx) = oneshot::channel();
        pending.lock().insert("id-2".to_string(), tx);

        route_frame(br#"[4, "id-2", "InternalError", "boom", {}]"#, &pending, &handler);
        match rx.try_recv() {
            Ok(Err(OcppError::RemoteError { code, description, .. })) => {
                assert_eq!(code, ErrorCode::InternalError);
                assert_eq!(description, "boom");
            }
            other => panic!("Expected RemoteError, got {other:?}"),
        }
    }

    #[test]
    fn test_route_call_without_handler() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let handler: HandlerSlot = Arc::new(RwLock::new(None));

        let reply = route_frame(br#"[2, "c-1", "ClearCache", {}]"#, &pending, &handler);
        match reply {
            Some(OcppMessage::CallError(e)) => assert_eq!(e.error_code, ErrorCode::NotSupported),
            other => panic!("Expected CallError, got {other:?}"),
        }

        let defaults: Arc<dyn CoreHandler> = Arc::new(Defaults);
        *handler.write() = Some(defaults);
        let reply = route_frame(br#"[2, "c-2", "ClearCache", {}]"#, &pending, &handler);
        assert!(matches!(reply, Some(OcppMessage::CallResult(_))));
    }

    #[test]
    fn test_route_unknown_action_is_not_implemented() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let defaults: Arc<dyn CoreHandler> = Arc::new(Defaults);
        let handler: HandlerSlot = Arc::new(RwLock::new(Some(defaults)));

        let reply = route_frame(br#"[2, "c-3", "TriggerMessage", {}]"#, &pending, &handler);
        match reply {
            Some(OcppMessage::CallError(e)) => {
                assert_eq!(e.message_id, "c-3");
                assert_eq!(e.error_code, ErrorCode::NotImplemented);
            }
            other => panic!("Expected CallError, got {other:?}"),
        }
    }

    /// Stand in for a live socket, handing back the outgoing queue
    fn attach(client: &OcppClient) -> mpsc::Receiver<OcppMessage> {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(4);
        let task = tokio::spawn(std::future::pending::<()>());
        *client.connection.lock() = Some(Connection { outgoing_tx, task });
        outgoing_rx
    }

    fn notification() -> Call {
        Call::status_notification(1, ChargePointErrorCode::NoError, ChargePointStatus::Available)
            .unwrap()
    }

    #[tokio::test]
    async fn test_dropped_request_leaves_no_pending_entry() {
        let client = OcppClient::new(OcppClientConfig::new("evcc"));
        let mut outgoing = attach(&client);

        let mut request = Box::pin(client.request(notification()));
        tokio::select! {
            res = &mut request => panic!("request finished early: {res:?}"),
            msg = outgoing.recv() => assert!(matches!(msg, Some(OcppMessage::Call(_)))),
        }
        assert_eq!(client.pending.lock().len(), 1);

        drop(request);
        assert!(client.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_request_on_closed_queue_fails_fast() {
        let client = OcppClient::new(OcppClientConfig::new("evcc"));
        let mut outgoing = attach(&client);
        outgoing.close();

        let err = client.request(notification()).await.unwrap_err();
        assert!(matches!(err, OcppError::ConnectionClosed));
        assert!(client.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_request_without_connection() {
        let client = OcppClient::new(OcppClientConfig::new("evcc"));
        assert!(!client.is_connected());

        let err = client
            .status_notification(1, ChargePointErrorCode::NoError, ChargePointStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, OcppError::NotConnected));
    }
}
