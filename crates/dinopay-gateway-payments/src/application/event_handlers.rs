//! Event handlers for the ledger payments context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use dinopay_gateway_core::clock::Clock;
use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event_store::{EventStore, ExpectedVersion, NewEvent};
use dinopay_gateway_core::ids::IdGenerator;
use dinopay_gateway_core::ports::Account;
use dinopay_gateway_core::ports::dinopay::{CreatePaymentRequest, DinopayClient};
use dinopay_gateway_core::ports::payments::{AccountDetails, Direction};
use dinopay_gateway_core::stream::{StreamCategory, build_stream_name};
use dinopay_gateway_outbound::domain::events::ExternalPaymentCreated;

use crate::domain::events::{PaymentCreated, PaymentUpdated, PaymentsEventsHandler};

/// Collaborators of [`OutboundPaymentInitiator`].
pub struct InitiatorDeps {
    /// DinoPay API.
    pub dinopay: Arc<dyn DinopayClient>,
    /// Where `ExternalPaymentCreated` is recorded.
    pub store: Arc<dyn EventStore>,
    /// Supplies event ids.
    pub ids: Arc<dyn IdGenerator>,
    /// Supplies `createdAt`.
    pub clock: Arc<dyn Clock>,
}

/// Executes outbound ledger payments on DinoPay.
pub struct OutboundPaymentInitiator {
    deps: InitiatorDeps,
    gateway_account: Account,
    span: tracing::Span,
}

impl OutboundPaymentInitiator {
    /// Creates a handler that debits `gateway_account` on DinoPay and logs
    /// inside `span`.
    #[must_use]
    pub fn new(deps: InitiatorDeps, gateway_account: Account, span: tracing::Span) -> Self {
        Self {
            deps,
            gateway_account,
            span,
        }
    }

    async fn initiate(&self, payment: PaymentCreated) -> Result<(), ProcessingError> {
        if payment.direction != Direction::Outbound {
            tracing::debug!("ignoring inbound payment");
            return Ok(());
        }

        let AccountDetails::Dinopay {
            account_holder,
            account_number,
        } = payment.beneficiary
        else {
            return Err(ProcessingError::Validation(format!(
                "payment {} beneficiary is not a dinopay account",
                payment.id
            )));
        };

        let request = CreatePaymentRequest {
            amount: payment.amount,
            currency: payment.currency,
            source_account: self.gateway_account.clone(),
            destination_account: Account {
                account_holder,
                account_number,
            },
            customer_transaction_id: Some(payment.id.to_string()),
        };
        let dinopay_payment = self
            .deps
            .dinopay
            .create_payment(&request)
            .await
            .map_err(|err| {
                ProcessingError::Retryable(err.to_string())
                    .wrap("failed creating payment on dinopay")
            })?;
        tracing::info!(
            dinopay_payment_id = %dinopay_payment.id,
            dinopay_payment_status = %dinopay_payment.status,
            "dinopay payment created"
        );

        let event = ExternalPaymentCreated {
            id: self.deps.ids.next_id(),
            payment_id: payment.id,
            dinopay_payment_id: dinopay_payment.id,
            dinopay_payment_status: dinopay_payment.status,
            created_at: self.deps.clock.now(),
            aggregate_version: 0,
        };
        let stream = build_stream_name(StreamCategory::OutboundPayment, dinopay_payment.id);
        let new_event = NewEvent::from_event(&event)?;
        self.deps
            .store
            .append_events(&stream, ExpectedVersion::NoStream, &[new_event])
            .await
            .map_err(|err| {
                ProcessingError::from(err)
                    .wrap(format!("failed appending ExternalPaymentCreated to {stream}"))
            })?;

        tracing::info!(stream, "PaymentCreated event processed successfully");
        Ok(())
    }
}

#[async_trait]
impl PaymentsEventsHandler for OutboundPaymentInitiator {
    async fn handle_payment_created(&self, event: PaymentCreated) -> Result<(), ProcessingError> {
        let span = tracing::info_span!(
            parent: &self.span,
            "payment_created",
            event_type = "PaymentCreated",
            payment_id = %event.id,
        );
        self.initiate(event).instrument(span).await
    }

    async fn handle_payment_updated(&self, event: PaymentUpdated) -> Result<(), ProcessingError> {
        self.span.in_scope(|| {
            tracing::info!(
                event_type = "PaymentUpdated",
                payment_id = %event.payment_id,
                status = %event.status,
                "ledger payment updated, nothing to do"
            );
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    use dinopay_gateway_core::envelope::EventEnvelope;
    use dinopay_gateway_core::error::ErrorKind;
    use dinopay_gateway_core::ports::dinopay::DinopayPayment;
    use dinopay_gateway_core::ports::payments::PaymentStatus;
    use dinopay_gateway_test_support::{
        Failure, FixedClock, RecordingDinopayClient, RecordingEventStore, SequentialIds,
    };

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn gateway_account() -> Account {
        Account {
            account_holder: "Walletera".into(),
            account_number: "GW-0001".into(),
        }
    }

    fn outbound_payment(beneficiary: AccountDetails) -> PaymentCreated {
        PaymentCreated {
            id: Uuid::new_v4(),
            amount: 100.0,
            currency: "USD".into(),
            direction: Direction::Outbound,
            customer_id: Uuid::new_v4(),
            status: PaymentStatus::Pending,
            debtor: None,
            beneficiary,
            created_at: Some(fixed_now()),
        }
    }

    fn dinopay_beneficiary() -> AccountDetails {
        AccountDetails::Dinopay {
            account_holder: "John Doe".into(),
            account_number: "IE12BOFI90000112345678".into(),
        }
    }

    fn initiator(
        dinopay: &Arc<RecordingDinopayClient>,
        store: &Arc<RecordingEventStore>,
    ) -> OutboundPaymentInitiator {
        OutboundPaymentInitiator::new(
            InitiatorDeps {
                dinopay: Arc::clone(dinopay) as Arc<dyn DinopayClient>,
                store: Arc::clone(store) as Arc<dyn EventStore>,
                ids: Arc::new(SequentialIds::default()),
                clock: Arc::new(FixedClock(fixed_now())),
            },
            gateway_account(),
            tracing::info_span!("payments-test", component = "payments.EventsHandler"),
        )
    }

    #[tokio::test]
    async fn test_outbound_payment_is_created_on_dinopay_and_recorded() {
        // Arrange
        let dinopay_payment_id = Uuid::new_v4();
        let dinopay = Arc::new(RecordingDinopayClient::succeeding(DinopayPayment {
            id: dinopay_payment_id,
            status: "pending".into(),
        }));
        let store = Arc::new(RecordingEventStore::new());
        let handler = initiator(&dinopay, &store);
        let payment = outbound_payment(dinopay_beneficiary());
        let payment_id = payment.id;

        // Act
        let result = handler.handle_payment_created(payment).await;

        // Assert
        assert!(result.is_ok());

        let requests = dinopay.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].source_account, gateway_account());
        assert_eq!(requests[0].destination_account.account_number, "IE12BOFI90000112345678");
        assert_eq!(requests[0].customer_transaction_id, Some(payment_id.to_string()));

        let appended = store.appended();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].stream, format!("outboundPayment-{dinopay_payment_id}"));
        assert_eq!(appended[0].expected, ExpectedVersion::NoStream);

        let envelope = EventEnvelope::decode(&appended[0].events[0].data).unwrap();
        let recorded: ExternalPaymentCreated = envelope.into_event().unwrap();
        assert_eq!(
            recorded,
            ExternalPaymentCreated {
                id: SequentialIds::nth(1),
                payment_id,
                dinopay_payment_id,
                dinopay_payment_status: "pending".into(),
                created_at: fixed_now(),
                aggregate_version: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_inbound_payment_is_ignored() {
        // Arrange
        let dinopay = Arc::new(RecordingDinopayClient::failing(Failure::Transport));
        let store = Arc::new(RecordingEventStore::new());
        let handler = initiator(&dinopay, &store);
        let mut payment = outbound_payment(dinopay_beneficiary());
        payment.direction = Direction::Inbound;

        // Act
        let result = handler.handle_payment_created(payment).await;

        // Assert
        assert!(result.is_ok());
        assert!(dinopay.requests().is_empty());
        assert!(store.appended().is_empty());
    }

    #[tokio::test]
    async fn test_non_dinopay_beneficiary_is_a_validation_error() {
        // Arrange
        let dinopay = Arc::new(RecordingDinopayClient::failing(Failure::Transport));
        let store = Arc::new(RecordingEventStore::new());
        let handler = initiator(&dinopay, &store);
        let payment = outbound_payment(AccountDetails::Cvu {
            cvu: "0000003100010000000001".into(),
            alias: None,
        });

        // Act
        let err = handler.handle_payment_created(payment).await.unwrap_err();

        // Assert
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(dinopay.requests().is_empty());
    }

    #[tokio::test]
    async fn test_dinopay_failure_is_retryable_and_nothing_is_appended() {
        // Arrange
        let dinopay = Arc::new(RecordingDinopayClient::failing(Failure::Status(400)));
        let store = Arc::new(RecordingEventStore::new());
        let handler = initiator(&dinopay, &store);

        // Act
        let err = handler
            .handle_payment_created(outbound_payment(dinopay_beneficiary()))
            .await
            .unwrap_err();

        // Assert
        assert!(err.is_retryable());
        assert!(err.to_string().contains("failed creating payment on dinopay"));
        assert!(store.appended().is_empty());
    }

    #[tokio::test]
    async fn test_existing_stream_is_a_non_retryable_conflict() {
        // Arrange
        let dinopay_payment_id = Uuid::new_v4();
        let dinopay = Arc::new(RecordingDinopayClient::succeeding(DinopayPayment {
            id: dinopay_payment_id,
            status: "pending".into(),
        }));
        let store = Arc::new(RecordingEventStore::new());
        let handler = initiator(&dinopay, &store);
        handler
            .handle_payment_created(outbound_payment(dinopay_beneficiary()))
            .await
            .unwrap();

        // Act
        let err = handler
            .handle_payment_created(outbound_payment(dinopay_beneficiary()))
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.kind(), ErrorKind::NonRetryable);
        assert!(err.to_string().contains("concurrency conflict"));
        assert_eq!(store.appended().len(), 1);
        let stream = format!("outboundPayment-{dinopay_payment_id}");
        assert_eq!(store.inner().stream_events(&stream).len(), 1);
    }

    #[tokio::test]
    async fn test_payment_updated_is_acknowledged() {
        // Arrange
        let dinopay = Arc::new(RecordingDinopayClient::failing(Failure::Transport));
        let store = Arc::new(RecordingEventStore::new());
        let handler = initiator(&dinopay, &store);

        // Act
        let result = handler
            .handle_payment_updated(PaymentUpdated {
                id: Uuid::new_v4(),
                payment_id: Uuid::new_v4(),
                external_id: None,
                status: PaymentStatus::Confirmed,
                created_at: None,
            })
            .await;

        // Assert
        assert!(result.is_ok());
        assert!(dinopay.requests().is_empty());
    }
}
