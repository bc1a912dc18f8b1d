//! Wiring of the four dispatch pipelines.
//!
//! | Pipeline | Source | Handler |
//! |---|---|---|
//! | payments | ledger queue | `OutboundPaymentInitiator` |
//! | dinopay | webhook | `DinopayWebhookHandler` |
//! | outbound | `$ce-outboundPayment` | `LedgerReconciler` |
//! | inbound | `$ce-inboundPayment` | `InboundPaymentRegistrar` |

use std::sync::Arc;
use std::time::Duration;

use dinopay_gateway_core::clock::Clock;
use dinopay_gateway_core::event::{Deserializer, Dispatch, EnvelopeDeserializer};
use dinopay_gateway_core::event_store::EventStore;
use dinopay_gateway_core::ids::IdGenerator;
use dinopay_gateway_core::message::MessageConsumer;
use dinopay_gateway_core::ports::Account;
use dinopay_gateway_core::ports::accounts::AccountsClient;
use dinopay_gateway_core::ports::dinopay::DinopayClient;
use dinopay_gateway_core::ports::payments::PaymentsClient;
use dinopay_gateway_dinopay::application::event_handlers::{DinopayWebhookHandler, WebhookDeps};
use dinopay_gateway_dinopay::domain::events::DinopayEvent;
use dinopay_gateway_inbound::application::event_handlers::InboundPaymentRegistrar;
use dinopay_gateway_inbound::domain::events::InboundEvent;
use dinopay_gateway_outbound::application::event_handlers::LedgerReconciler;
use dinopay_gateway_outbound::domain::events::OutboundEvent;
use dinopay_gateway_payments::application::event_handlers::{
    InitiatorDeps, OutboundPaymentInitiator,
};
use dinopay_gateway_payments::domain::events::PaymentsEvent;
use dinopay_gateway_processor::{ErrorCallback, MessageProcessor, Pipeline};

use crate::error::AppError;
use crate::telemetry::SERVICE_NAME;

/// Consumer group shared by both category subscriptions.
pub const CONSUMER_GROUP: &str = "dinopay-gateway";

/// Total time allowed for draining every pipeline on shutdown.
pub const SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);

const PAYMENTS_COMPONENT: &str = "payments.MessageProcessor";
const DINOPAY_COMPONENT: &str = "dinopay.webhook.MessageProcessor";
const OUTBOUND_COMPONENT: &str = "gateway.outbound.MessageProcessor";
const INBOUND_COMPONENT: &str = "gateway.inbound.MessageProcessor";

/// Collaborators shared by the pipelines.
#[derive(Clone)]
pub struct Collaborators {
    /// Gateway event store.
    pub store: Arc<dyn EventStore>,
    /// DinoPay API.
    pub dinopay: Arc<dyn DinopayClient>,
    /// Payments ledger API.
    pub payments: Arc<dyn PaymentsClient>,
    /// Accounts directory API.
    pub accounts: Arc<dyn AccountsClient>,
    /// Event and payment id source.
    pub ids: Arc<dyn IdGenerator>,
    /// Timestamp source.
    pub clock: Arc<dyn Clock>,
    /// Debtor account for outbound payments.
    pub gateway_account: Account,
}

/// One message source per pipeline.
pub struct Sources<P, W, O, I> {
    /// Ledger events from the queue.
    pub payments: P,
    /// DinoPay webhook notifications.
    pub dinopay: W,
    /// `$ce-outboundPayment` subscription.
    pub outbound: O,
    /// `$ce-inboundPayment` subscription.
    pub inbound: I,
}

/// The four pipelines of a running gateway.
pub struct Gateway {
    pipelines: Vec<(&'static str, Box<dyn Pipeline>)>,
}

fn component_span(component: &'static str) -> tracing::Span {
    tracing::info_span!("pipeline", service = SERVICE_NAME, component)
}

impl Gateway {
    /// Builds every pipeline with the default logging error callback.
    pub fn new<P, W, O, I>(collaborators: Collaborators, sources: Sources<P, W, O, I>) -> Self
    where
        P: MessageConsumer + 'static,
        W: MessageConsumer + 'static,
        O: MessageConsumer + 'static,
        I: MessageConsumer + 'static,
    {
        Self::build(collaborators, sources, None)
    }

    /// Builds every pipeline reporting failures to `on_error` instead of
    /// the log.
    pub fn with_error_callback<P, W, O, I>(
        collaborators: Collaborators,
        sources: Sources<P, W, O, I>,
        on_error: ErrorCallback,
    ) -> Self
    where
        P: MessageConsumer + 'static,
        W: MessageConsumer + 'static,
        O: MessageConsumer + 'static,
        I: MessageConsumer + 'static,
    {
        Self::build(collaborators, sources, Some(on_error))
    }

    fn build<P, W, O, I>(
        collaborators: Collaborators,
        sources: Sources<P, W, O, I>,
        on_error: Option<ErrorCallback>,
    ) -> Self
    where
        P: MessageConsumer + 'static,
        W: MessageConsumer + 'static,
        O: MessageConsumer + 'static,
        I: MessageConsumer + 'static,
    {
        let Collaborators {
            store,
            dinopay,
            payments,
            accounts,
            ids,
            clock,
            gateway_account,
        } = collaborators;

        let payments_span = component_span(PAYMENTS_COMPONENT);
        let initiator = OutboundPaymentInitiator::new(
            InitiatorDeps {
                dinopay,
                store: Arc::clone(&store),
                ids: Arc::clone(&ids),
                clock: Arc::clone(&clock),
            },
            gateway_account,
            payments_span.clone(),
        );
        let payments_pipeline = MessageProcessor::new(
            sources.payments,
            EnvelopeDeserializer::<PaymentsEvent>::new(),
            Arc::new(initiator),
            payments_span,
        );

        let dinopay_span = component_span(DINOPAY_COMPONENT);
        let webhook_handler = DinopayWebhookHandler::new(
            WebhookDeps {
                store: Arc::clone(&store),
                accounts,
                ids,
                clock,
            },
            dinopay_span.clone(),
        );
        let dinopay_pipeline = MessageProcessor::new(
            sources.dinopay,
            EnvelopeDeserializer::<DinopayEvent>::new(),
            Arc::new(webhook_handler),
            dinopay_span,
        );

        let outbound_span = component_span(OUTBOUND_COMPONENT);
        let reconciler =
            LedgerReconciler::new(store, Arc::clone(&payments), outbound_span.clone());
        let outbound_pipeline = MessageProcessor::new(
            sources.outbound,
            EnvelopeDeserializer::<OutboundEvent>::new(),
            Arc::new(reconciler),
            outbound_span,
        );

        let inbound_span = component_span(INBOUND_COMPONENT);
        let registrar = InboundPaymentRegistrar::new(payments, inbound_span.clone());
        let inbound_pipeline = MessageProcessor::new(
            sources.inbound,
            EnvelopeDeserializer::<InboundEvent>::new(),
            Arc::new(registrar),
            inbound_span,
        );

        let mut gateway = Self {
            pipelines: Vec::with_capacity(4),
        };
        gateway.push(PAYMENTS_COMPONENT, payments_pipeline, on_error.as_ref());
        gateway.push(DINOPAY_COMPONENT, dinopay_pipeline, on_error.as_ref());
        gateway.push(OUTBOUND_COMPONENT, outbound_pipeline, on_error.as_ref());
        gateway.push(INBOUND_COMPONENT, inbound_pipeline, on_error.as_ref());
        gateway
    }

    fn push<C, D, H>(
        &mut self,
        name: &'static str,
        processor: MessageProcessor<C, D, H>,
        on_error: Option<&ErrorCallback>,
    ) where
        C: MessageConsumer + 'static,
        D: Deserializer + 'static,
        D::Event: Dispatch<H> + 'static,
        H: Send + Sync + 'static,
    {
        let processor = match on_error {
            Some(on_error) => processor.with_error_callback(Arc::clone(on_error)),
            None => processor,
        };
        let pipeline: Box<dyn Pipeline> = Box::new(processor);
        self.pipelines.push((name, pipeline));
    }

    /// Starts every pipeline. Pipelines that started before a failure are
    /// stopped again.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Pipeline` naming the pipeline that failed to start.
    pub async fn start(&mut self) -> Result<(), AppError> {
        for index in 0..self.pipelines.len() {
            let (name, pipeline) = &mut self.pipelines[index];
            let name = *name;
            let started = pipeline.start().await;
            if let Err(source) = started {
                for (running, pipeline) in &mut self.pipelines[..index] {
                    if let Err(err) = pipeline.stop(SHUTDOWN_BUDGET).await {
                        tracing::warn!(pipeline = *running, error = %err, "failed stopping pipeline");
                    }
                }
                return Err(AppError::Pipeline {
                    pipeline: name,
                    source,
                });
            }
            tracing::info!(pipeline = name, "pipeline started");
        }
        tracing::info!("dinopay-gateway started");
        Ok(())
    }

    /// Stops every pipeline concurrently, giving each `budget` to drain.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Pipeline` for the first pipeline that failed to
    /// stop; the others are still stopped.
    pub async fn stop(&mut self, budget: Duration) -> Result<(), AppError> {
        let results = futures::future::join_all(
            self.pipelines
                .iter_mut()
                .map(|(name, pipeline)| async move { (*name, pipeline.stop(budget).await) }),
        )
        .await;

        let mut first_error = None;
        for (name, result) in results {
            if let Err(source) = result {
                tracing::error!(pipeline = name, error = %source, "failed stopping pipeline");
                first_error.get_or_insert(AppError::Pipeline {
                    pipeline: name,
                    source,
                });
            }
        }
        tracing::info!("dinopay-gateway stopped");
        first_error.map_or(Ok(()), Err)
    }
}
