//! Event handlers for the DinoPay webhook context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use dinopay_gateway_core::clock::Clock;
use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event_store::{EventStore, ExpectedVersion, NewEvent};
use dinopay_gateway_core::ids::IdGenerator;
use dinopay_gateway_core::ports::accounts::{AccountsClient, CustomerAccount};
use dinopay_gateway_core::stream::{StreamCategory, build_stream_name};
use dinopay_gateway_inbound::domain::events::InboundPaymentReceived;
use dinopay_gateway_outbound::domain::events::ExternalPaymentUpdated;

use crate::domain::events::{DinopayEventsHandler, PaymentCreated, PaymentUpdated};

/// Collaborators of [`DinopayWebhookHandler`].
pub struct WebhookDeps {
    /// Where the translated events are recorded.
    pub store: Arc<dyn EventStore>,
    /// Resolves destination accounts to customers.
    pub accounts: Arc<dyn AccountsClient>,
    /// Supplies event ids and internal payment ids.
    pub ids: Arc<dyn IdGenerator>,
    /// Supplies `createdAt`.
    pub clock: Arc<dyn Clock>,
}

/// Records DinoPay notifications on the gateway streams.
pub struct DinopayWebhookHandler {
    deps: WebhookDeps,
    span: tracing::Span,
}

impl DinopayWebhookHandler {
    /// Creates a handler logging inside `span`.
    #[must_use]
    pub fn new(deps: WebhookDeps, span: tracing::Span) -> Self {
        Self { deps, span }
    }

    async fn resolve_customer(&self, account_number: &str) -> Result<CustomerAccount, ProcessingError> {
        let mut accounts = self
            .deps
            .accounts
            .find_by_dinopay_account_number(account_number)
            .await
            .map_err(|err| {
                ProcessingError::from(err)
                    .wrap(format!("failed looking up dinopay account {account_number}"))
            })?;
        match accounts.len() {
            1 => Ok(accounts.remove(0)),
            0 => Err(ProcessingError::NonRetryable(format!(
                "no account found for dinopay account number {account_number}"
            ))),
            matches => Err(ProcessingError::NonRetryable(format!(
                "{matches} accounts found for dinopay account number {account_number}"
            ))),
        }
    }

    async fn receive(&self, payment: PaymentCreated) -> Result<(), ProcessingError> {
        let account = self
            .resolve_customer(&payment.destination_account.account_number)
            .await?;

        let event = InboundPaymentReceived {
            id: self.deps.ids.next_id(),
            payment_id: self.deps.ids.next_id(),
            dinopay_payment_id: payment.id,
            customer_id: account.customer_id,
            amount: payment.amount,
            currency: payment.currency,
            source_account: payment.source_account,
            destination_account: payment.destination_account,
            created_at: self.deps.clock.now(),
            aggregate_version: 0,
        };
        let stream = build_stream_name(StreamCategory::InboundPayment, payment.id);
        self.append(&stream, ExpectedVersion::NoStream, NewEvent::from_event(&event)?)
            .await?;

        tracing::info!(
            stream,
            payment_id = %event.payment_id,
            customer_id = %event.customer_id,
            "inbound payment recorded"
        );
        Ok(())
    }

    async fn update(&self, payment: PaymentUpdated) -> Result<(), ProcessingError> {
        let event = ExternalPaymentUpdated {
            id: self.deps.ids.next_id(),
            dinopay_payment_id: payment.id,
            dinopay_payment_status: payment.status,
            created_at: self.deps.clock.now(),
            aggregate_version: 0,
        };
        let stream = build_stream_name(StreamCategory::OutboundPayment, payment.id);
        self.append(&stream, ExpectedVersion::Any, NewEvent::from_event(&event)?)
            .await?;

        tracing::info!(stream, status = %event.dinopay_payment_status, "outbound payment update recorded");
        Ok(())
    }

    async fn append(
        &self,
        stream: &str,
        expected: ExpectedVersion,
        event: NewEvent,
    ) -> Result<(), ProcessingError> {
        let event_type = event.event_type.clone();
        self.deps
            .store
            .append_events(stream, expected, &[event])
            .await
            .map_err(|err| {
                ProcessingError::from(err)
                    .wrap(format!("failed appending {event_type} to {stream}"))
            })?;
        Ok(())
    }
}

#[async_trait]
impl DinopayEventsHandler for DinopayWebhookHandler {
    async fn handle_payment_created(&self, event: PaymentCreated) -> Result<(), ProcessingError> {
        let span = tracing::info_span!(
            parent: &self.span,
            "dinopay_payment_created",
            dinopay_payment_id = %event.id,
        );
        self.receive(event).instrument(span).await
    }

    async fn handle_payment_updated(&self, event: PaymentUpdated) -> Result<(), ProcessingError> {
        let span = tracing::info_span!(
            parent: &self.span,
            "dinopay_payment_updated",
            dinopay_payment_id = %event.id,
        );
        self.update(event).instrument(span).await
    }
}
