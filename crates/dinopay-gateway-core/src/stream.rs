//! Stream naming.
//!
//! A stream is named `<category>-<correlationId>`. The correlation id is
//! appended verbatim; categories never contain a `-`, so splitting at the
//! first one recovers both parts.

use std::fmt;
use std::str::FromStr;

/// Grouping of streams by the kind of key that correlates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamCategory {
    /// Streams keyed by DinoPay payment id for gateway-initiated payments.
    OutboundPayment,
    /// Streams keyed by DinoPay payment id for payments DinoPay reports to us.
    InboundPayment,
}

impl StreamCategory {
    /// Category prefix as it appears in stream names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutboundPayment => "outboundPayment",
            Self::InboundPayment => "inboundPayment",
        }
    }
}

impl fmt::Display for StreamCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outboundPayment" => Ok(Self::OutboundPayment),
            "inboundPayment" => Ok(Self::InboundPayment),
            other => Err(format!("unknown stream category: {other}")),
        }
    }
}

/// Builds the stream name for a category and correlation id.
#[must_use]
pub fn build_stream_name(category: StreamCategory, correlation_id: impl fmt::Display) -> String {
    format!("{category}-{correlation_id}")
}

/// Name of the projection that collects every stream of a category.
#[must_use]
pub fn category_projection(category: StreamCategory) -> String {
    format!("$ce-{category}")
}

/// Splits a stream name into its category and correlation id.
///
/// Returns `None` when the name has no `-` or the prefix is not a known category.
#[must_use]
pub fn parse_stream_name(name: &str) -> Option<(StreamCategory, &str)> {
    let (prefix, correlation_id) = name.split_once('-')?;
    let category = prefix.parse().ok()?;
    Some((category, correlation_id))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_build_stream_name_joins_with_dash() {
        let id = Uuid::parse_str("6f1c2a4e-0000-4000-8000-000000000001").unwrap();

        let name = build_stream_name(StreamCategory::OutboundPayment, id);

        assert_eq!(name, "outboundPayment-6f1c2a4e-0000-4000-8000-000000000001");
    }

    #[test]
    fn test_build_stream_name_does_not_escape() {
        let name = build_stream_name(StreamCategory::InboundPayment, "a b-c");

        assert_eq!(name, "inboundPayment-a b-c");
    }

    #[test]
    fn test_category_projection() {
        assert_eq!(
            category_projection(StreamCategory::OutboundPayment),
            "$ce-outboundPayment"
        );
        assert_eq!(
            category_projection(StreamCategory::InboundPayment),
            "$ce-inboundPayment"
        );
    }

    #[test]
    fn test_parse_stream_name_splits_at_first_dash() {
        let name = build_stream_name(StreamCategory::OutboundPayment, "abc-def");

        let parsed = parse_stream_name(&name);

        assert_eq!(parsed, Some((StreamCategory::OutboundPayment, "abc-def")));
    }

    #[test]
    fn test_parse_stream_name_rejects_unknown_category() {
        assert_eq!(parse_stream_name("refund-123"), None);
        assert_eq!(parse_stream_name("outboundPayment"), None);
    }
}
