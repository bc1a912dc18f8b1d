//! Event handlers for the outbound payments context.
//!
//! Both handlers end in exactly one ledger patch. A creation record is
//! reflected directly; an update first replays the stream to recover the
//! ledger payment id captured at creation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event::EventSet;
use dinopay_gateway_core::event_store::{EventStore, READ_PAGE_SIZE};
use dinopay_gateway_core::ports::payments::{PaymentStatus, PaymentUpdate, PaymentsClient};
use dinopay_gateway_core::stream::{StreamCategory, build_stream_name};
use uuid::Uuid;

use crate::domain::events::{
    ExternalPaymentCreated, ExternalPaymentUpdated, OutboundEvent, OutboundEventsHandler,
};
use crate::domain::replay::ReplayState;
use crate::domain::status::map_status;

/// Reflects DinoPay payment state into the ledger.
pub struct LedgerReconciler {
    store: Arc<dyn EventStore>,
    payments: Arc<dyn PaymentsClient>,
    span: tracing::Span,
}

impl LedgerReconciler {
    /// Creates a handler logging inside `span`.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        payments: Arc<dyn PaymentsClient>,
        span: tracing::Span,
    ) -> Self {
        Self {
            store,
            payments,
            span,
        }
    }

    /// Reads `stream` backwards page by page until an
    /// `ExternalPaymentCreated` is found or the stream is exhausted, and
    /// returns the collected events oldest first.
    async fn load_since_created(&self, stream: &str) -> Result<Vec<OutboundEvent>, ProcessingError> {
        let mut collected = Vec::new();
        let mut before = None;
        loop {
            let page = self
                .store
                .read_events_backwards(stream, before, READ_PAGE_SIZE)
                .await
                .map_err(|err| {
                    ProcessingError::from(err).wrap(format!("failed reading stream {stream}"))
                })?;
            let exhausted = page.len() < READ_PAGE_SIZE;

            for raw in page {
                let event = OutboundEvent::deserialize(&raw.data).map_err(|err| {
                    ProcessingError::from(err).wrap(format!(
                        "failed decoding revision {} of stream {stream}",
                        raw.revision
                    ))
                })?;
                before = Some(raw.revision);
                let is_created = matches!(event, OutboundEvent::Created(_));
                collected.push(event);
                if is_created {
                    collected.reverse();
                    return Ok(collected);
                }
            }

            if exhausted || before == Some(0) {
                collected.reverse();
                return Ok(collected);
            }
        }
    }

    async fn patch(
        &self,
        payment_id: Uuid,
        dinopay_payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), ProcessingError> {
        let update = PaymentUpdate {
            payment_id,
            external_id: dinopay_payment_id,
            status,
        };
        self.payments.patch_payment(&update).await.map_err(|err| {
            ProcessingError::Retryable(err.to_string())
                .wrap(format!("failed updating payment {payment_id} in payments service"))
        })?;
        tracing::info!(%payment_id, %status, "payment updated in ledger");
        Ok(())
    }
}

#[async_trait]
impl OutboundEventsHandler for LedgerReconciler {
    async fn handle_external_payment_created(
        &self,
        event: ExternalPaymentCreated,
    ) -> Result<(), ProcessingError> {
        let span = tracing::info_span!(
            parent: &self.span,
            "external_payment_created",
            payment_id = %event.payment_id,
            dinopay_payment_id = %event.dinopay_payment_id,
        );
        async {
            let status = map_status(&event.dinopay_payment_status)?;
            self.patch(event.payment_id, event.dinopay_payment_id, status)
                .await
        }
        .instrument(span)
        .await
    }

    async fn handle_external_payment_updated(
        &self,
        event: ExternalPaymentUpdated,
    ) -> Result<(), ProcessingError> {
        let span = tracing::info_span!(
            parent: &self.span,
            "external_payment_updated",
            dinopay_payment_id = %event.dinopay_payment_id,
        );
        async {
            let stream = build_stream_name(StreamCategory::OutboundPayment, event.dinopay_payment_id);
            let history = self.load_since_created(&stream).await?;
            tracing::debug!(stream, replayed = history.len(), "replaying outbound stream");

            let created = ReplayState::replay(history)?.into_created(&event)?;
            let status = map_status(&event.dinopay_payment_status)?;
            self.patch(created.payment_id, event.dinopay_payment_id, status)
                .await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tracing_test::traced_test;

    use dinopay_gateway_core::envelope::EventData;
    use dinopay_gateway_core::error::ErrorKind;
    use dinopay_gateway_core::event_store::{ExpectedVersion, NewEvent};
    use dinopay_gateway_test_support::{
        FailingEventStore, Failure, RecordingEventStore, RecordingPaymentsClient,
    };

    use super::*;

    fn created(payment_id: Uuid, dinopay_payment_id: Uuid) -> ExternalPaymentCreated {
        ExternalPaymentCreated {
            id: Uuid::new_v4(),
            payment_id,
            dinopay_payment_id,
            dinopay_payment_status: "pending".into(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            aggregate_version: 0,
        }
    }

    fn updated(dinopay_payment_id: Uuid, status: &str) -> ExternalPaymentUpdated {
        ExternalPaymentUpdated {
            id: Uuid::new_v4(),
            dinopay_payment_id,
            dinopay_payment_status: status.into(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 5, 0).unwrap(),
            aggregate_version: 0,
        }
    }

    async fn seed<E: EventData>(store: &RecordingEventStore, dinopay_payment_id: Uuid, events: &[E]) {
        let stream = build_stream_name(StreamCategory::OutboundPayment, dinopay_payment_id);
        let events: Vec<NewEvent> = events
            .iter()
            .map(|event| NewEvent::from_event(event).unwrap())
            .collect();
        store
            .inner()
            .append_events(&stream, ExpectedVersion::Any, &events)
            .await
            .unwrap();
    }

    fn reconciler(
        store: &Arc<RecordingEventStore>,
        payments: &Arc<RecordingPaymentsClient>,
    ) -> LedgerReconciler {
        LedgerReconciler::new(
            Arc::clone(store) as Arc<dyn EventStore>,
            Arc::clone(payments) as Arc<dyn PaymentsClient>,
            tracing::info_span!("outbound-test", component = "outbound.EventsHandler"),
        )
    }

    #[tokio::test]
    async fn test_created_event_patches_ledger_with_mapped_status() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);
        let (payment_id, dinopay_payment_id) = (Uuid::new_v4(), Uuid::new_v4());

        // Act
        let result = handler
            .handle_external_payment_created(created(payment_id, dinopay_payment_id))
            .await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(
            payments.patches(),
            vec![PaymentUpdate {
                payment_id,
                external_id: dinopay_payment_id,
                status: PaymentStatus::Pending,
            }]
        );
    }

    #[tokio::test]
    async fn test_updated_event_replays_stream_and_patches_once() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);
        let (payment_id, dinopay_payment_id) = (Uuid::new_v4(), Uuid::new_v4());
        let update = updated(dinopay_payment_id, "confirmed");
        seed(&store, dinopay_payment_id, &[created(payment_id, dinopay_payment_id)]).await;
        seed(&store, dinopay_payment_id, &[update.clone()]).await;

        // Act
        let result = handler.handle_external_payment_updated(update).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(
            payments.patches(),
            vec![PaymentUpdate {
                payment_id,
                external_id: dinopay_payment_id,
                status: PaymentStatus::Confirmed,
            }]
        );
    }

    #[tokio::test]
    async fn test_rejected_update_maps_to_failed() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);
        let (payment_id, dinopay_payment_id) = (Uuid::new_v4(), Uuid::new_v4());
        seed(&store, dinopay_payment_id, &[created(payment_id, dinopay_payment_id)]).await;

        // Act
        handler
            .handle_external_payment_updated(updated(dinopay_payment_id, "rejected"))
            .await
            .unwrap();

        // Assert
        assert_eq!(payments.patches()[0].status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_created_event_beyond_first_page_is_found() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);
        let (payment_id, dinopay_payment_id) = (Uuid::new_v4(), Uuid::new_v4());
        seed(&store, dinopay_payment_id, &[created(payment_id, dinopay_payment_id)]).await;
        let updates: Vec<ExternalPaymentUpdated> = (0..15)
            .map(|_| updated(dinopay_payment_id, "pending"))
            .collect();
        seed(&store, dinopay_payment_id, &updates).await;

        // Act
        let result = handler
            .handle_external_payment_updated(updated(dinopay_payment_id, "confirmed"))
            .await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(payments.patches().len(), 1);
        assert_eq!(payments.patches()[0].payment_id, payment_id);
        assert_eq!(store.reads().len(), 2);
    }

    #[tokio::test]
    async fn test_update_without_created_fails_non_retryable() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);
        let dinopay_payment_id = Uuid::new_v4();
        seed(&store, dinopay_payment_id, &[updated(dinopay_payment_id, "pending")]).await;

        // Act
        let err = handler
            .handle_external_payment_updated(updated(dinopay_payment_id, "confirmed"))
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.kind(), ErrorKind::NonRetryable);
        assert!(err.to_string().contains("missing Created event"));
        assert!(payments.patches().is_empty());
    }

    #[tokio::test]
    async fn test_update_for_unknown_stream_fails_non_retryable() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);

        // Act
        let err = handler
            .handle_external_payment_updated(updated(Uuid::new_v4(), "confirmed"))
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.kind(), ErrorKind::NonRetryable);
        assert!(payments.patches().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_fails_without_patching() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);
        let (payment_id, dinopay_payment_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut event = created(payment_id, dinopay_payment_id);
        event.dinopay_payment_status = "CONFIRMED".into();

        // Act
        let err = handler
            .handle_external_payment_created(event)
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.kind(), ErrorKind::NonRetryable);
        assert!(payments.patches().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_is_retryable() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::failing(Failure::Status(400)));
        let handler = reconciler(&store, &payments);

        // Act
        let err = handler
            .handle_external_payment_created(created(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap_err();

        // Assert
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable() {
        // Arrange
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = LedgerReconciler::new(
            Arc::new(FailingEventStore),
            Arc::clone(&payments) as Arc<dyn PaymentsClient>,
            tracing::Span::none(),
        );

        // Act
        let err = handler
            .handle_external_payment_updated(updated(Uuid::new_v4(), "confirmed"))
            .await
            .unwrap_err();

        // Assert
        assert!(err.is_retryable());
        assert!(payments.patches().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_successful_patch_is_logged_with_payment_context() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new());
        let payments = Arc::new(RecordingPaymentsClient::new());
        let handler = reconciler(&store, &payments);
        let (payment_id, dinopay_payment_id) = (Uuid::new_v4(), Uuid::new_v4());

        // Act
        handler
            .handle_external_payment_created(created(payment_id, dinopay_payment_id))
            .await
            .unwrap();

        // Assert
        assert!(logs_contain("payment updated in ledger"));
        assert!(logs_contain(&dinopay_payment_id.to_string()));
    }
}
