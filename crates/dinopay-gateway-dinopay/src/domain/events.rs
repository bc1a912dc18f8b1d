//! Notifications DinoPay posts to the webhook.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dinopay_gateway_core::envelope::{CodecError, EventData, EventEnvelope};
use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event::{Dispatch, EventSet};
use dinopay_gateway_core::ports::Account;

/// DinoPay registered a payment involving one of our accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreated {
    /// DinoPay payment id.
    pub id: Uuid,
    /// Amount in major units.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// Paying account.
    pub source_account: Account,
    /// Credited account.
    pub destination_account: Account,
}

impl EventData for PaymentCreated {
    const EVENT_TYPE: &'static str = "PaymentCreated";

    fn event_id(&self) -> Uuid {
        self.id
    }
}

/// DinoPay changed the status of a payment. Any payment details DinoPay
/// repeats alongside the status are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdated {
    /// DinoPay payment id.
    pub id: Uuid,
    /// New DinoPay status.
    pub status: String,
}

impl EventData for PaymentUpdated {
    const EVENT_TYPE: &'static str = "PaymentUpdated";

    fn event_id(&self) -> Uuid {
        self.id
    }
}

/// Every webhook notification the gateway understands.
#[derive(Debug, Clone, PartialEq)]
pub enum DinopayEvent {
    /// See [`PaymentCreated`].
    PaymentCreated(PaymentCreated),
    /// See [`PaymentUpdated`].
    PaymentUpdated(PaymentUpdated),
}

impl EventSet for DinopayEvent {
    fn from_envelope(envelope: EventEnvelope) -> Result<Self, CodecError> {
        match envelope.event_type.as_str() {
            PaymentCreated::EVENT_TYPE => Ok(Self::PaymentCreated(envelope.into_event()?)),
            PaymentUpdated::EVENT_TYPE => Ok(Self::PaymentUpdated(envelope.into_event()?)),
            _ => Err(CodecError::UnknownEventType(envelope.event_type)),
        }
    }

    fn to_envelope(&self) -> Result<EventEnvelope, CodecError> {
        match self {
            Self::PaymentCreated(event) => EventEnvelope::wrap(event),
            Self::PaymentUpdated(event) => EventEnvelope::wrap(event),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::PaymentCreated(_) => PaymentCreated::EVENT_TYPE,
            Self::PaymentUpdated(_) => PaymentUpdated::EVENT_TYPE,
        }
    }
}

/// Handles webhook notifications, one method per variant.
#[async_trait]
pub trait DinopayEventsHandler: Send + Sync {
    /// Handles [`PaymentCreated`].
    async fn handle_payment_created(&self, event: PaymentCreated) -> Result<(), ProcessingError>;

    /// Handles [`PaymentUpdated`].
    async fn handle_payment_updated(&self, event: PaymentUpdated) -> Result<(), ProcessingError>;
}

#[async_trait]
impl<H: DinopayEventsHandler + ?Sized> Dispatch<H> for DinopayEvent {
    async fn dispatch(self, handler: &H) -> Result<(), ProcessingError> {
        match self {
            Self::PaymentCreated(event) => handler.handle_payment_created(event).await,
            Self::PaymentUpdated(event) => handler.handle_payment_updated(event).await,
        }
    }
}
