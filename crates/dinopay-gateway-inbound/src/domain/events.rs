//! Events recorded on `inboundPayment-<dinopayPaymentId>` streams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dinopay_gateway_core::envelope::{CodecError, EventData, EventEnvelope};
use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event::{Dispatch, EventSet};
use dinopay_gateway_core::ports::Account;

/// Funds arrived on a DinoPay account owned by one of our customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundPaymentReceived {
    /// Event id.
    pub id: Uuid,
    /// Ledger payment id, minted by the gateway.
    pub payment_id: Uuid,
    /// DinoPay payment id; also the stream key.
    pub dinopay_payment_id: Uuid,
    /// Customer owning the destination account.
    pub customer_id: Uuid,
    /// Amount in major units.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// Paying DinoPay account.
    pub source_account: Account,
    /// Credited DinoPay account.
    pub destination_account: Account,
    /// When the gateway recorded the event.
    pub created_at: DateTime<Utc>,
    /// Stream revision the event was written against.
    #[serde(default)]
    pub aggregate_version: u64,
}

impl EventData for InboundPaymentReceived {
    const EVENT_TYPE: &'static str = "InboundPaymentReceived";

    fn event_id(&self) -> Uuid {
        self.id
    }
}

/// Every event found on an `inboundPayment` stream.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// See [`InboundPaymentReceived`].
    PaymentReceived(InboundPaymentReceived),
}

impl EventSet for InboundEvent {
    fn from_envelope(envelope: EventEnvelope) -> Result<Self, CodecError> {
        match envelope.event_type.as_str() {
            InboundPaymentReceived::EVENT_TYPE => {
                Ok(Self::PaymentReceived(envelope.into_event()?))
            }
            _ => Err(CodecError::UnknownEventType(envelope.event_type)),
        }
    }

    fn to_envelope(&self) -> Result<EventEnvelope, CodecError> {
        match self {
            Self::PaymentReceived(event) => EventEnvelope::wrap(event),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::PaymentReceived(_) => InboundPaymentReceived::EVENT_TYPE,
        }
    }
}

/// Handles inbound stream events.
#[async_trait]
pub trait InboundEventsHandler: Send + Sync {
    /// Handles [`InboundPaymentReceived`].
    async fn handle_inbound_payment_received(
        &self,
        event: InboundPaymentReceived,
    ) -> Result<(), ProcessingError>;
}

#[async_trait]
impl<H: InboundEventsHandler + ?Sized> Dispatch<H> for InboundEvent {
    async fn dispatch(self, handler: &H) -> Result<(), ProcessingError> {
        match self {
            Self::PaymentReceived(event) => handler.handle_inbound_payment_received(event).await,
        }
    }
}
