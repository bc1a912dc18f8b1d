//! Events recorded on `outboundPayment-<dinopayPaymentId>` streams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dinopay_gateway_core::envelope::{CodecError, EventData, EventEnvelope};
use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event::{Dispatch, EventSet};

/// DinoPay accepted a payment the gateway asked it to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPaymentCreated {
    /// Event id.
    pub id: Uuid,
    /// Ledger payment id.
    pub payment_id: Uuid,
    /// DinoPay payment id; also the stream key.
    pub dinopay_payment_id: Uuid,
    /// Status reported by DinoPay on creation.
    pub dinopay_payment_status: String,
    /// When the gateway recorded the event.
    pub created_at: DateTime<Utc>,
    /// Stream revision the event was written against.
    #[serde(default)]
    pub aggregate_version: u64,
}

impl EventData for ExternalPaymentCreated {
    const EVENT_TYPE: &'static str = "ExternalPaymentCreated";

    fn event_id(&self) -> Uuid {
        self.id
    }
}

/// DinoPay reported a new status for a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPaymentUpdated {
    /// Event id.
    pub id: Uuid,
    /// DinoPay payment id; also the stream key.
    pub dinopay_payment_id: Uuid,
    /// New DinoPay status.
    pub dinopay_payment_status: String,
    /// When the gateway recorded the event.
    pub created_at: DateTime<Utc>,
    /// Stream revision the event was written against.
    #[serde(default)]
    pub aggregate_version: u64,
}

impl EventData for ExternalPaymentUpdated {
    const EVENT_TYPE: &'static str = "ExternalPaymentUpdated";

    fn event_id(&self) -> Uuid {
        self.id
    }
}

/// Every event found on an `outboundPayment` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// See [`ExternalPaymentCreated`].
    Created(ExternalPaymentCreated),
    /// See [`ExternalPaymentUpdated`].
    Updated(ExternalPaymentUpdated),
}

impl EventSet for OutboundEvent {
    fn from_envelope(envelope: EventEnvelope) -> Result<Self, CodecError> {
        match envelope.event_type.as_str() {
            ExternalPaymentCreated::EVENT_TYPE => Ok(Self::Created(envelope.into_event()?)),
            ExternalPaymentUpdated::EVENT_TYPE => Ok(Self::Updated(envelope.into_event()?)),
            _ => Err(CodecError::UnknownEventType(envelope.event_type)),
        }
    }

    fn to_envelope(&self) -> Result<EventEnvelope, CodecError> {
        match self {
            Self::Created(event) => EventEnvelope::wrap(event),
            Self::Updated(event) => EventEnvelope::wrap(event),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => ExternalPaymentCreated::EVENT_TYPE,
            Self::Updated(_) => ExternalPaymentUpdated::EVENT_TYPE,
        }
    }
}

/// Handles outbound stream events, one method per variant.
#[async_trait]
pub trait OutboundEventsHandler: Send + Sync {
    /// Handles [`ExternalPaymentCreated`].
    async fn handle_external_payment_created(
        &self,
        event: ExternalPaymentCreated,
    ) -> Result<(), ProcessingError>;

    /// Handles [`ExternalPaymentUpdated`].
    async fn handle_external_payment_updated(
        &self,
        event: ExternalPaymentUpdated,
    ) -> Result<(), ProcessingError>;
}

#[async_trait]
impl<H: OutboundEventsHandler + ?Sized> Dispatch<H> for OutboundEvent {
    async fn dispatch(self, handler: &H) -> Result<(), ProcessingError> {
        match self {
            Self::Created(event) => handler.handle_external_payment_created(event).await,
            Self::Updated(event) => handler.handle_external_payment_updated(event).await,
        }
    }
}
