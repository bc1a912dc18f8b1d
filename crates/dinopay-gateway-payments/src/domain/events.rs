//! Events published by the payments ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dinopay_gateway_core::envelope::{CodecError, EventData, EventEnvelope};
use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event::{Dispatch, EventSet};
use dinopay_gateway_core::ports::payments::{AccountDetails, Direction, PaymentStatus};

/// A payment was registered in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreated {
    /// Ledger payment id.
    pub id: Uuid,
    /// Amount in major units.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// Whether the money leaves or enters the customer account.
    pub direction: Direction,
    /// Owner of the payment.
    pub customer_id: Uuid,
    /// Ledger status at creation.
    pub status: PaymentStatus,
    /// Paying side, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debtor: Option<AccountDetails>,
    /// Receiving side.
    pub beneficiary: AccountDetails,
    /// When the ledger created the payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EventData for PaymentCreated {
    const EVENT_TYPE: &'static str = "PaymentCreated";

    fn event_id(&self) -> Uuid {
        self.id
    }
}

/// A ledger payment changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdated {
    /// Event id.
    pub id: Uuid,
    /// Ledger payment id.
    pub payment_id: Uuid,
    /// Id of the payment on the external rail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// New ledger status.
    pub status: PaymentStatus,
    /// When the change happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EventData for PaymentUpdated {
    const EVENT_TYPE: &'static str = "PaymentUpdated";

    fn event_id(&self) -> Uuid {
        self.id
    }
}

/// Every ledger event the gateway consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentsEvent {
    /// See [`PaymentCreated`].
    PaymentCreated(PaymentCreated),
    /// See [`PaymentUpdated`].
    PaymentUpdated(PaymentUpdated),
}

impl EventSet for PaymentsEvent {
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

/// Handles ledger events, one method per variant.
#[async_trait]
pub trait PaymentsEventsHandler: Send + Sync {
    /// Handles [`PaymentCreated`].
    async fn handle_payment_created(&self, event: PaymentCreated) -> Result<(), ProcessingError>;

    /// Handles [`PaymentUpdated`].
    async fn handle_payment_updated(&self, event: PaymentUpdated) -> Result<(), ProcessingError>;
}

#[async_trait]
impl<H: PaymentsEventsHandler + ?Sized> Dispatch<H> for PaymentsEvent {
    async fn dispatch(self, handler: &H) -> Result<(), ProcessingError> {
        match self {
            Self::PaymentCreated(event) => handler.handle_payment_created(event).await,
            Self::PaymentUpdated(event) => handler.handle_payment_updated(event).await,
        }
    }
}
