//! HTTP routes served next to the webhook.

pub mod health;
