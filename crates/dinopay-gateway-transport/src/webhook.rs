//! DinoPay webhook listener.
//!
//! `POST /webhooks` accepts a raw event envelope and answers `201 Created`
//! once the body has been queued for the pipeline, or `503 Service
//! Unavailable` while the pipeline is not consuming.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use dinopay_gateway_core::message::{ConsumerError, Message, MessageConsumer};

use crate::receiver_stream;

/// Default port the listener binds to.
pub const DEFAULT_WEBHOOK_PORT: u16 = 8686;

/// Messages buffered between the HTTP handler and the pipeline.
const WEBHOOK_BUFFER: usize = 64;

#[derive(Debug, Clone)]
struct WebhookState {
    sender: mpsc::Sender<Message>,
    accepting: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
}

/// Webhook listener acting as a message source.
#[derive(Debug)]
pub struct WebhookConsumer {
    bind_addr: SocketAddr,
    extra_routes: Router,
    state: WebhookState,
    receiver: Option<mpsc::Receiver<Message>>,
    shutdown: watch::Sender<bool>,
    server: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl WebhookConsumer {
    /// Creates a listener that will bind `bind_addr` when consumed.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        let (sender, receiver) = mpsc::channel(WEBHOOK_BUFFER);
        let (shutdown, _) = watch::channel(false);
        Self {
            bind_addr,
            extra_routes: Router::new(),
            state: WebhookState {
                sender,
                accepting: Arc::new(AtomicBool::new(false)),
                shutdown: shutdown.subscribe(),
            },
            receiver: Some(receiver),
            shutdown,
            server: None,
            local_addr: None,
        }
    }

    /// Serves additional routes, such as the health check, on the same listener.
    #[must_use]
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.extra_routes = routes;
        self
    }

    /// Address actually bound, available once consuming.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/webhooks", post(receive_webhook))
            .with_state(self.state.clone())
            .merge(self.extra_routes.clone())
    }
}

/// Answers 201 only once the body sits in the pipeline's buffer. A request
/// still waiting for buffer space when the listener closes gets 503, so
/// DinoPay redelivers it.
async fn receive_webhook(State(state): State<WebhookState>, body: Bytes) -> StatusCode {
    let WebhookState {
        sender,
        accepting,
        mut shutdown,
    } = state;
    if !accepting.load(Ordering::Acquire) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    let closing = async move {
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    };
    tokio::select! {
        sent = sender.send(Message::new(body.to_vec())) => match sent {
            Ok(()) => StatusCode::CREATED,
            Err(_) => StatusCode::SERVICE_UNAVAILABLE,
        },
        () = closing => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[async_trait]
impl MessageConsumer for WebhookConsumer {
    async fn consume(&mut self) -> Result<BoxStream<'static, Message>, ConsumerError> {
        let receiver = self.receiver.take().ok_or(ConsumerError::AlreadyConsumed)?;
        let listener = tokio::net::TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| ConsumerError::Connect(format!("binding {}: {e}", self.bind_addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ConsumerError::Connect(e.to_string()))?;
        self.local_addr = Some(local_addr);

        let router = self.router();
        let mut server_shutdown = self.shutdown.subscribe();
        self.server = Some(tokio::spawn(async move {
            let graceful = async move {
                let _ = server_shutdown.wait_for(|stopped| *stopped).await;
            };
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
            {
                tracing::error!(error = %err, "webhook server failed");
            }
        }));

        self.state.accepting.store(true, Ordering::Release);
        tracing::info!(%local_addr, "webhook server listening");
        Ok(receiver_stream(receiver, self.shutdown.subscribe()))
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.state.accepting.store(false, Ordering::Release);
        self.shutdown.send_replace(true);
        if let Some(server) = self.server.take() {
            server
                .await
                .map_err(|e| ConsumerError::Close(e.to_string()))?;
        }
        tracing::info!("webhook server stopped");
        Ok(())
    }
}
