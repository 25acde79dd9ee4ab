//! The bidirectional JSON-RPC channel every runtime component talks through.
//!
//! A [`Connection`] owns the handler tables and the outgoing queue. Reading
//! and writing only start once [`Connection::listen`] is given the two halves
//! of a byte stream; anything sent before that is queued.
//!
//! Incoming requests and notifications pass through a single dispatcher task
//! in arrival order. A notification runs to completion before the next
//! message is dispatched. A request is spawned on its own task, so a handler
//! that awaits a client round-trip never stalls the connection, but the
//! dispatcher waits until that task has been polled once. Whatever a request
//! handler does before its first suspension point is therefore ordered
//! against the messages around it.

use std::collections::HashMap;
use std::future::{self, Future};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use runtime_protocol::{
    HandlerResult, Message, Methods, Notification, Request, RequestId, Response, ResponseError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{encode_frame, read_frame};
use crate::error::TransportError;

/// Boxed request handler: params plus an advisory cancellation token.
pub type RequestHandler =
    Arc<dyn Fn(Option<Value>, CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Boxed notification handler.
pub type NotificationHandler = Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

type ExitHandler = Box<dyn FnOnce() + Send>;

/// Server → client half of a connection.
///
/// Services depend on this rather than on [`Connection`] so they can be
/// driven by an in-memory client in tests.
pub trait ClientChannel: Send + Sync {
    /// Send a request to the client and wait for its response.
    fn send_request<'a>(
        &'a self,
        method: &'a str,
        params: Option<Value>,
    ) -> BoxFuture<'a, HandlerResult>;

    /// Queue a notification to the client.
    fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), TransportError>;
}

#[derive(Deserialize)]
struct CancelParams {
    id: RequestId,
}

/// A message waiting for the dispatcher.
enum Inbound {
    Request(Request, CancellationToken),
    Notification(Notification),
}

pub struct Connection {
    request_handlers: RwLock<HashMap<String, RequestHandler>>,
    notification_handlers: RwLock<HashMap<String, Vec<NotificationHandler>>>,
    exit_handlers: Mutex<Vec<ExitHandler>>,
    outgoing_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    outgoing_rx: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
    /// Server → client requests awaiting a response, by id
    pending: Mutex<HashMap<i64, oneshot::Sender<Response>>>,
    /// Client → server requests still running, for `$/cancelRequest`
    in_flight: Mutex<HashMap<RequestId, CancellationToken>>,
    next_id: AtomicI64,
    closed: AtomicBool,
}

impl Connection {
    pub fn new() -> Arc<Self> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            request_handlers: RwLock::new(HashMap::new()),
            notification_handlers: RwLock::new(HashMap::new()),
            exit_handlers: Mutex::new(Vec::new()),
            outgoing_tx: Mutex::new(Some(outgoing_tx)),
            outgoing_rx: Mutex::new(Some(outgoing_rx)),
            pending: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    // ── Handler registration ────────────────────────────────────────────

    /// Register the handler for a request method. A later registration for
    /// the same method replaces the earlier one.
    pub fn on_request<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Option<Value>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: RequestHandler = Arc::new(move |params, token| Box::pin(handler(params, token)));
        if self
            .request_handlers
            .write()
            .insert(method.to_string(), handler)
            .is_some()
        {
            debug!("Replaced request handler for {method}");
        }
    }

    /// Register a notification handler. Every handler registered for a
    /// method runs, in registration order.
    pub fn on_notification<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: NotificationHandler = Arc::new(move |params| Box::pin(handler(params)));
        self.notification_handlers
            .write()
            .entry(method.to_string())
            .or_default()
            .push(handler);
    }

    /// Register a callback run once when the connection stops (`exit` or EOF).
    pub fn on_exit(&self, handler: impl FnOnce() + Send + 'static) {
        self.exit_handlers.lock().push(Box::new(handler));
    }

    // ── Outgoing ────────────────────────────────────────────────────────

    /// Send a request to the client and wait for the response.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> HandlerResult {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed.into());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.write(&Request::new(RequestId::Number(id), method, params)) {
            self.pending.lock().remove(&id);
            return Err(e.into());
        }

        rx.await
            .map_err(|_| ResponseError::from(TransportError::Closed))?
            .into_result()
    }

    /// Queue a notification to the client.
    pub fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        self.write(&Notification::new(method, params))
    }

    fn write<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        let frame = encode_frame(message)?;
        match self.outgoing_tx.lock().as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    // ── Read loop ───────────────────────────────────────────────────────

    /// Serve the connection until the client sends `exit` or closes input.
    ///
    /// Exit handlers run before this returns; requests still waiting on the
    /// client fail with [`TransportError::Closed`].
    pub async fn listen<R, W>(self: &Arc<Self>, reader: R, writer: W) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut outgoing_rx = self
            .outgoing_rx
            .lock()
            .take()
            .ok_or(TransportError::AlreadyListening)?;

        // Writer task
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(frame) = outgoing_rx.recv().await {
                if let Err(e) = writer.write_all(&frame).await {
                    warn!("Output write error: {e}");
                    break;
                }
                if let Err(e) = writer.flush().await {
                    warn!("Output flush error: {e}");
                    break;
                }
            }
        });

        // Dispatcher task
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<Inbound>();
        let dispatcher = Arc::clone(self);
        let dispatch_task = tokio::spawn(async move {
            while let Some(inbound) = inbound_rx.recv().await {
                match inbound {
                    Inbound::Request(request, token) => dispatcher.dispatch_request(request, token).await,
                    Inbound::Notification(n) => dispatcher.dispatch_notification(n).await,
                }
            }
        });

        let mut reader = BufReader::new(reader);
        let outcome = loop {
            let body = match read_frame(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    info!("Input stream closed");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };

            let message: Message = match serde_json::from_slice(&body) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Dropping malformed message: {e}");
                    let _ = self.write(&Response::error(
                        None,
                        ResponseError::parse_error(format!("Failed to parse message: {e}")),
                    ));
                    continue;
                }
            };

            match message {
                Message::Request(request) => {
                    // Registered here so a cancel read right after the request finds it
                    let token = CancellationToken::new();
                    self.in_flight.lock().insert(request.id.clone(), token.clone());
                    let _ = inbound_tx.send(Inbound::Request(request, token));
                }
                Message::Notification(n) if n.method == Methods::EXIT => {
                    info!("Received exit notification");
                    break Ok(());
                }
                Message::Notification(n) if n.method == Methods::CANCEL_REQUEST => {
                    self.cancel_request(n.params);
                }
                Message::Notification(n) => {
                    let _ = inbound_tx.send(Inbound::Notification(n));
                }
                Message::Response(response) => self.resolve_response(response),
            }
        };

        // Dropping the senders fails every request still waiting on the client
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().clear();
        for (_, token) in self.in_flight.lock().drain() {
            token.cancel();
        }

        // Messages read before the stop are still dispatched
        drop(inbound_tx);
        if let Err(e) = dispatch_task.await {
            warn!("Dispatcher failed: {e}");
        }

        let exit_handlers = std::mem::take(&mut *self.exit_handlers.lock());
        for handler in exit_handlers {
            handler();
        }

        // Closing the queue lets the writer drain what is left and stop
        self.outgoing_tx.lock().take();
        let _ = writer_task.await;

        outcome
    }

    /// Spawn the request's handler and return once it has been polled once.
    async fn dispatch_request(self: &Arc<Self>, request: Request, token: CancellationToken) {
        let Request { id, method, params, .. } = request;
        let handler = self.request_handlers.read().get(&method).cloned();
        let Some(handler) = handler else {
            debug!("No handler for request: {method}");
            self.in_flight.lock().remove(&id);
            let _ = self.write(&Response::error(Some(id), ResponseError::method_not_found(&method)));
            return;
        };

        let (started_tx, started_rx) = oneshot::channel::<()>();
        let mut started_tx = Some(started_tx);
        let mut handling = handler(params, token);
        let handling = future::poll_fn(move |cx| {
            let poll = handling.as_mut().poll(cx);
            if let Some(tx) = started_tx.take() {
                let _ = tx.send(());
            }
            poll
        });

        let connection = Arc::clone(self);
        tokio::spawn(async move {
            let result = handling.await;
            connection.in_flight.lock().remove(&id);
            if let Err(e) = connection.write(&Response::from_result(id, result)) {
                warn!("Failed to send response for {method}: {e}");
            }
        });

        // Err only if the task died before its first poll
        let _ = started_rx.await;
    }

    async fn dispatch_notification(&self, notification: Notification) {
        let handlers = self
            .notification_handlers
            .read()
            .get(&notification.method)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("No handler for notification: {}", notification.method);
            return;
        }

        for handler in handlers {
            handler(notification.params.clone()).await;
        }
    }

    fn cancel_request(&self, params: Option<Value>) {
        let Some(CancelParams { id }) = params.and_then(|p| serde_json::from_value(p).ok()) else {
            warn!("Ignoring malformed $/cancelRequest");
            return;
        };
        if let Some(token) = self.in_flight.lock().get(&id) {
            debug!("Cancelling request {id}");
            token.cancel();
        }
    }

    fn resolve_response(&self, response: Response) {
        let id = match response.id() {
            Some(RequestId::Number(id)) => *id,
            other => {
                warn!("Response with unexpected id: {other:?}");
                return;
            }
        };
        match self.pending.lock().remove(&id) {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => warn!("Response for unknown request id {id}"),
        }
    }
}

impl ClientChannel for Connection {
    fn send_request<'a>(
        &'a self,
        method: &'a str,
        params: Option<Value>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(Connection::send_request(self, method, params))
    }

    fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        Connection::send_notification(self, method, params)
    }
}
