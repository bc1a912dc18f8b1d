//! Test doubles for the HTTP collaborators.

use std::sync::Mutex;

use async_trait::async_trait;
use dinopay_gateway_core::ports::ClientError;
use dinopay_gateway_core::ports::accounts::{AccountsClient, CustomerAccount};
use dinopay_gateway_core::ports::dinopay::{CreatePaymentRequest, DinopayClient, DinopayPayment};
use dinopay_gateway_core::ports::payments::{NewPayment, PaymentUpdate, PaymentsClient};

/// How a stubbed call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// No response at all.
    Transport,
    /// A response with this HTTP status.
    Status(u16),
}

impl Failure {
    fn to_error(self) -> ClientError {
        match self {
            Self::Transport => ClientError::Transport("connection refused".into()),
            Self::Status(status) => ClientError::Status {
                status,
                body: "stubbed failure".into(),
            },
        }
    }
}

/// A DinoPay client that records requests and returns a canned outcome.
#[derive(Debug)]
pub struct RecordingDinopayClient {
    outcome: Result<DinopayPayment, Failure>,
    requests: Mutex<Vec<CreatePaymentRequest>>,
}

impl RecordingDinopayClient {
    /// Every call returns `payment`.
    #[must_use]
    pub fn succeeding(payment: DinopayPayment) -> Self {
        Self {
            outcome: Ok(payment),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `failure`.
    #[must_use]
    pub fn failing(failure: Failure) -> Self {
        Self {
            outcome: Err(failure),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all requests received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<CreatePaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DinopayClient for RecordingDinopayClient {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<DinopayPayment, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone().map_err(Failure::to_error)
    }
}

/// A payments ledger client that records every call.
#[derive(Debug, Default)]
pub struct RecordingPaymentsClient {
    failure: Option<Failure>,
    patches: Mutex<Vec<PaymentUpdate>>,
    posts: Mutex<Vec<NewPayment>>,
}

impl RecordingPaymentsClient {
    /// Every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `failure` (after being recorded).
    #[must_use]
    pub fn failing(failure: Failure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// Returns a snapshot of all patches received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn patches(&self) -> Vec<PaymentUpdate> {
        self.patches.lock().unwrap().clone()
    }

    /// Returns a snapshot of all created payments received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn posts(&self) -> Vec<NewPayment> {
        self.posts.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<(), ClientError> {
        self.failure.map_or(Ok(()), |failure| Err(failure.to_error()))
    }
}

#[async_trait]
impl PaymentsClient for RecordingPaymentsClient {
    async fn patch_payment(&self, update: &PaymentUpdate) -> Result<(), ClientError> {
        self.patches.lock().unwrap().push(update.clone());
        self.outcome()
    }

    async fn post_payment(&self, payment: &NewPayment) -> Result<(), ClientError> {
        self.posts.lock().unwrap().push(payment.clone());
        self.outcome()
    }
}

/// An accounts client that answers every lookup with the same accounts.
#[derive(Debug)]
pub struct StubAccountsClient {
    outcome: Result<Vec<CustomerAccount>, Failure>,
    queries: Mutex<Vec<String>>,
}

impl StubAccountsClient {
    /// Every lookup returns `accounts`.
    #[must_use]
    pub fn returning(accounts: Vec<CustomerAccount>) -> Self {
        Self {
            outcome: Ok(accounts),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every lookup fails with `failure`.
    #[must_use]
    pub fn failing(failure: Failure) -> Self {
        Self {
            outcome: Err(failure),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Returns the account numbers looked up so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountsClient for StubAccountsClient {
    async fn find_by_dinopay_account_number(
        &self,
        account_number: &str,
    ) -> Result<Vec<CustomerAccount>, ClientError> {
        self.queries.lock().unwrap().push(account_number.to_owned());
        self.outcome.clone().map_err(Failure::to_error)
    }
}
