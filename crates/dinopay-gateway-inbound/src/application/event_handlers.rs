//! Event handlers for the inbound payments context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::ports::Account;
use dinopay_gateway_core::ports::payments::{
    AccountDetails, Direction, NewPayment, PaymentStatus, PaymentsClient,
};

use crate::domain::events::{InboundEventsHandler, InboundPaymentReceived};

/// Registers inbound DinoPay payments in the ledger.
pub struct InboundPaymentRegistrar {
    payments: Arc<dyn PaymentsClient>,
    span: tracing::Span,
}

impl InboundPaymentRegistrar {
    /// Creates a handler logging inside `span`.
    #[must_use]
    pub fn new(payments: Arc<dyn PaymentsClient>, span: tracing::Span) -> Self {
        Self { payments, span }
    }
}

fn dinopay_details(account: Account) -> AccountDetails {
    AccountDetails::Dinopay {
        account_holder: account.account_holder,
        account_number: account.account_number,
    }
}

/// Builds the ledger payment for a received DinoPay payment. Inbound funds
/// have already settled on DinoPay, so the payment starts confirmed.
#[must_use]
pub fn new_inbound_payment(event: InboundPaymentReceived) -> NewPayment {
    NewPayment {
        id: event.payment_id,
        amount: event.amount,
        currency: event.currency,
        customer_id: event.customer_id,
        external_id: event.dinopay_payment_id,
        debtor: dinopay_details(event.source_account),
        beneficiary: dinopay_details(event.destination_account),
        status: PaymentStatus::Confirmed,
        direction: Direction::Inbound,
    }
}

#[async_trait]
impl InboundEventsHandler for InboundPaymentRegistrar {
    async fn handle_inbound_payment_received(
        &self,
        event: InboundPaymentReceived,
    ) -> Result<(), ProcessingError> {
        let span = tracing::info_span!(
            parent: &self.span,
            "inbound_payment_received",
            payment_id = %event.payment_id,
            dinopay_payment_id = %event.dinopay_payment_id,
        );
        async {
            let payment = new_inbound_payment(event);
            self.payments.post_payment(&payment).await.map_err(|err| {
                ProcessingError::from(err)
                    .wrap(format!("failed creating payment {} in payments service", payment.id))
            })?;
            tracing::info!(customer_id = %payment.customer_id, "inbound payment registered in ledger");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
