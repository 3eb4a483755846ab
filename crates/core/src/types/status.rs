//! Lifecycle statuses for quotes, orders and chat conversations.
//!
//! Each enum mirrors a `PostgreSQL` enum type in the `shop` schema and owns
//! its transition rules. Repositories turn these rules into conditional
//! `UPDATE ... WHERE status = ANY(...)` statements, so a transition that was
//! legal when a handler read the row still fails cleanly if another request
//! moved the row first.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string did not name any variant of a status enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// A requested status change is not allowed from the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move {kind} from {from} to {to}")]
pub struct TransitionError {
    /// Which lifecycle was being advanced.
    pub kind: &'static str,
    /// Current status.
    pub from: String,
    /// Requested status.
    pub to: String,
}

// =============================================================================
// Quote
// =============================================================================

/// Request-for-quote status.
///
/// ```text
/// pending -> reviewing -> price_ready -> converted
///    \           \            \
///     +-----------+------------+--> expired
/// ```
///
/// `price_ready -> price_ready` is allowed so staff can re-price a quote
/// before the customer accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.quote_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Reviewing,
    PriceReady,
    Expired,
    Converted,
}

impl QuoteStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Reviewing,
        Self::PriceReady,
        Self::Expired,
        Self::Converted,
    ];

    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewing => "reviewing",
            Self::PriceReady => "price_ready",
            Self::Expired => "expired",
            Self::Converted => "converted",
        }
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Converted)
    }

    /// Whether `self -> next` is a legal move.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Reviewing | Self::Expired)
                | (
                    Self::Reviewing,
                    Self::PriceReady | Self::Expired
                )
                | (
                    Self::PriceReady,
                    Self::PriceReady | Self::Converted | Self::Expired
                )
        )
    }

    /// Statuses from which `target` can be reached in one step.
    #[must_use]
    pub fn sources_of(target: Self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(target))
            .collect()
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if `self -> next` is not allowed.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: "quote",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "quote status",
                value: s.to_owned(),
            })
    }
}

// =============================================================================
// Order
// =============================================================================

/// Order fulfilment status. Orders only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
    ];

    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
        }
    }

    /// Human-readable label used in customer emails.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Awaiting payment",
            Self::Paid => "Payment received",
            Self::Processing => "Being prepared",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
        }
    }

    /// Forward moves are legal, including skipped steps.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        next > self
    }

    /// Statuses from which `target` can be reached.
    #[must_use]
    pub fn sources_of(target: Self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|s| *s < target).collect()
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` when `next` is not strictly after `self`.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: "order",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Orders past `pending` count toward revenue.
    #[must_use]
    pub fn counts_as_revenue(self) -> bool {
        self >= Self::Paid
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "order status",
                value: s.to_owned(),
            })
    }
}

// =============================================================================
// Chat
// =============================================================================

/// Live-chat conversation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.chat_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Active,
    Resolved,
    Closed,
}

impl ChatStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Resolved, Self::Closed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// `closed` is terminal; `resolved` can be reopened.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Resolved | Self::Closed)
                | (Self::Resolved, Self::Active | Self::Closed)
        )
    }

    #[must_use]
    pub fn sources_of(target: Self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(target))
            .collect()
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if `self -> next` is not allowed.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: "conversation",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChatStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "chat status",
                value: s.to_owned(),
            })
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.chat_sender", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    Visitor,
    Agent,
    System,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_happy_path() {
        let status = QuoteStatus::Pending
            .transition(QuoteStatus::Reviewing)
            .and_then(|s| s.transition(QuoteStatus::PriceReady))
            .and_then(|s| s.transition(QuoteStatus::Converted))
            .unwrap();
        assert_eq!(status, QuoteStatus::Converted);
    }

    #[test]
    fn test_quote_cannot_skip_review() {
        assert!(!QuoteStatus::Pending.can_transition_to(QuoteStatus::PriceReady));
        assert!(!QuoteStatus::Pending.can_transition_to(QuoteStatus::Converted));
        assert!(!QuoteStatus::Reviewing.can_transition_to(QuoteStatus::Converted));
    }

    #[test]
    fn test_quote_terminal_states() {
        for next in QuoteStatus::ALL {
            assert!(!QuoteStatus::Converted.can_transition_to(next));
            assert!(!QuoteStatus::Expired.can_transition_to(next));
        }
        assert!(QuoteStatus::Converted.is_terminal());
        assert!(!QuoteStatus::PriceReady.is_terminal());
    }

    #[test]
    fn test_quote_converts_only_from_price_ready() {
        assert_eq!(
            QuoteStatus::sources_of(QuoteStatus::Converted),
            vec![QuoteStatus::PriceReady]
        );
    }

    #[test]
    fn test_quote_expiry_sources() {
        assert_eq!(
            QuoteStatus::sources_of(QuoteStatus::Expired),
            vec![
                QuoteStatus::Pending,
                QuoteStatus::Reviewing,
                QuoteStatus::PriceReady
            ]
        );
    }

    #[test]
    fn test_quote_repricing_allowed() {
        assert!(QuoteStatus::PriceReady.can_transition_to(QuoteStatus::PriceReady));
        assert_eq!(
            QuoteStatus::sources_of(QuoteStatus::PriceReady),
            vec![QuoteStatus::Reviewing, QuoteStatus::PriceReady]
        );
    }

    #[test]
    fn test_transition_error_message() {
        let err = QuoteStatus::Converted
            .transition(QuoteStatus::Converted)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move quote from converted to converted");
    }

    #[test]
    fn test_order_forward_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Delivered));
        assert_eq!(
            OrderStatus::sources_of(OrderStatus::Processing),
            vec![OrderStatus::Pending, OrderStatus::Paid]
        );
    }

    #[test]
    fn test_order_revenue() {
        assert!(!OrderStatus::Pending.counts_as_revenue());
        assert!(OrderStatus::Paid.counts_as_revenue());
        assert!(OrderStatus::Delivered.counts_as_revenue());
    }

    #[test]
    fn test_chat_transitions() {
        assert!(ChatStatus::Active.can_transition_to(ChatStatus::Resolved));
        assert!(ChatStatus::Resolved.can_transition_to(ChatStatus::Active));
        assert!(!ChatStatus::Closed.can_transition_to(ChatStatus::Active));
        assert!(ChatStatus::Active.transition(ChatStatus::Active).is_err());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in QuoteStatus::ALL {
            assert_eq!(status.as_str().parse::<QuoteStatus>().unwrap(), status);
        }
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ChatStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_database_names() {
        assert_eq!(
            serde_json::to_string(&QuoteStatus::PriceReady).unwrap(),
            "\"price_ready\""
        );
        assert_eq!(
            serde_json::to_string(&ChatSender::Agent).unwrap(),
            "\"agent\""
        );
    }
}
