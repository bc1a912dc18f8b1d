//! Service configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use dinopay_gateway_core::ports::Account;
use dinopay_gateway_transport::webhook::DEFAULT_WEBHOOK_PORT;

use crate::error::AppError;

const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
const DEFAULT_NATS_SUBJECT: &str = "payment.created";
const DEFAULT_WEBHOOK_HOST: &str = "0.0.0.0";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// The DinoPay account outbound payments are debited from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayAccount {
    /// Name of the holder.
    pub holder: String,
    /// Account number on DinoPay.
    pub number: String,
}

impl From<GatewayAccount> for Account {
    fn from(account: GatewayAccount) -> Self {
        Self {
            account_holder: account.holder,
            account_number: account.number,
        }
    }
}

/// Everything the service needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string for the event store.
    pub database_url: String,
    /// NATS server carrying ledger events.
    pub nats_url: String,
    /// Subject ledger events are published on.
    pub nats_subject: String,
    /// DinoPay API base URL.
    pub dinopay_url: String,
    /// Payments service base URL.
    pub payments_url: String,
    /// Bearer token for the payments service, if it requires one.
    pub payments_api_token: Option<String>,
    /// Accounts service base URL.
    pub accounts_url: String,
    /// Address the webhook and health routes are served on.
    pub webhook_addr: SocketAddr,
    /// Debtor account for outbound payments.
    pub gateway_account: GatewayAccount,
    /// Timeout applied to every collaborator request.
    pub http_timeout: Duration,
}

impl Config {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| AppError::Config(format!("{key} environment variable must be set")))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let webhook_host = optional("WEBHOOK_HOST", DEFAULT_WEBHOOK_HOST);
        let webhook_port: u16 = optional("WEBHOOK_PORT", &DEFAULT_WEBHOOK_PORT.to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("WEBHOOK_PORT must be a valid u16: {e}")))?;
        let webhook_addr: SocketAddr = format!("{webhook_host}:{webhook_port}")
            .parse()
            .map_err(|e| {
                AppError::Config(format!("invalid WEBHOOK_HOST:WEBHOOK_PORT combination: {e}"))
            })?;

        let http_timeout_secs: u64 =
            optional("HTTP_TIMEOUT_SECS", &DEFAULT_HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|e| {
                    AppError::Config(format!("HTTP_TIMEOUT_SECS must be a whole number: {e}"))
                })?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            nats_url: optional("NATS_URL", DEFAULT_NATS_URL),
            nats_subject: optional("NATS_SUBJECT", DEFAULT_NATS_SUBJECT),
            dinopay_url: required("DINOPAY_URL")?,
            payments_url: required("PAYMENTS_URL")?,
            payments_api_token: lookup("PAYMENTS_API_TOKEN").filter(|token| !token.is_empty()),
            accounts_url: required("ACCOUNTS_URL")?,
            webhook_addr,
            gateway_account: GatewayAccount {
                holder: required("GATEWAY_ACCOUNT_HOLDER")?,
                number: required("GATEWAY_ACCOUNT_NUMBER")?,
            },
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}
