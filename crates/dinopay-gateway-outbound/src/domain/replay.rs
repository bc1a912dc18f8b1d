//! Replay of an `outboundPayment` stream.

use dinopay_gateway_core::error::ProcessingError;

use super::events::{ExternalPaymentCreated, ExternalPaymentUpdated, OutboundEvent};

/// State rebuilt by replaying a stream in chronological order.
#[derive(Debug, Default)]
pub struct ReplayState {
    created: Option<ExternalPaymentCreated>,
}

impl ReplayState {
    /// Replays `events`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ProcessingError::NonRetryable` if an update appears before
    /// any `ExternalPaymentCreated`.
    pub fn replay(events: impl IntoIterator<Item = OutboundEvent>) -> Result<Self, ProcessingError> {
        let mut state = Self::default();
        for event in events {
            match event {
                OutboundEvent::Created(created) => state.on_created(created),
                OutboundEvent::Updated(updated) => state.on_updated(&updated)?,
            }
        }
        Ok(state)
    }

    /// Caches the creation record.
    pub fn on_created(&mut self, event: ExternalPaymentCreated) {
        self.created = Some(event);
    }

    /// Checks an update against the cached creation record.
    ///
    /// # Errors
    ///
    /// Returns `ProcessingError::NonRetryable` when no creation record has
    /// been seen yet.
    pub fn on_updated(&self, event: &ExternalPaymentUpdated) -> Result<(), ProcessingError> {
        if self.created.is_none() {
            return Err(missing_created(event));
        }
        Ok(())
    }

    /// The creation record, once seen.
    #[must_use]
    pub fn created(&self) -> Option<&ExternalPaymentCreated> {
        self.created.as_ref()
    }

    /// Consumes the state, requiring a creation record.
    ///
    /// # Errors
    ///
    /// Returns `ProcessingError::NonRetryable` when the replay never saw one.
    pub fn into_created(
        self,
        update: &ExternalPaymentUpdated,
    ) -> Result<ExternalPaymentCreated, ProcessingError> {
        self.created.ok_or_else(|| missing_created(update))
    }
}

fn missing_created(update: &ExternalPaymentUpdated) -> ProcessingError {
    ProcessingError::NonRetryable(format!(
        "missing Created event for dinopay payment {}",
        update.dinopay_payment_id
    ))
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use uuid::Uuid;

    use dinopay_gateway_core::error::ErrorKind;

    use super::*;

    fn created(payment_id: Uuid) -> ExternalPaymentCreated {
        ExternalPaymentCreated {
            id: Uuid::new_v4(),
            payment_id,
            dinopay_payment_id: Uuid::nil(),
            dinopay_payment_status: "pending".into(),
            created_at: DateTime::UNIX_EPOCH,
            aggregate_version: 0,
        }
    }

    fn updated(status: &str) -> ExternalPaymentUpdated {
        ExternalPaymentUpdated {
            id: Uuid::new_v4(),
            dinopay_payment_id: Uuid::nil(),
            dinopay_payment_status: status.into(),
            created_at: DateTime::UNIX_EPOCH,
            aggregate_version: 1,
        }
    }

    #[test]
    fn test_replay_caches_created_before_updates() {
        let payment_id = Uuid::new_v4();

        let state = ReplayState::replay([
            OutboundEvent::Created(created(payment_id)),
            OutboundEvent::Updated(updated("confirmed")),
        ])
        .unwrap();

        assert_eq!(state.created().unwrap().payment_id, payment_id);
    }

    #[test]
    fn test_update_before_created_fails_non_retryable() {
        let err = ReplayState::replay([
            OutboundEvent::Updated(updated("confirmed")),
            OutboundEvent::Created(created(Uuid::new_v4())),
        ])
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NonRetryable);
        assert!(err.to_string().contains("missing Created event"));
    }

    #[test]
    fn test_empty_replay_has_no_created() {
        let state = ReplayState::replay([]).unwrap();

        let err = state.into_created(&updated("confirmed")).unwrap_err();

        assert!(err.to_string().contains("missing Created event"));
    }
}
