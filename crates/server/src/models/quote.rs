//! Request-for-quote models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use spareline_core::{ProductId, QuoteId, QuoteItemId, QuoteStatus, UserId};

/// A customer's request for prices on a list of parts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Quote {
    pub id: QuoteId,
    pub reference: String,
    pub user_id: Option<UserId>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub vehicle_info: Option<String>,
    pub customer_notes: Option<String>,
    /// Visible to staff only.
    #[serde(skip)]
    pub admin_notes: Option<String>,
    pub status: QuoteStatus,
    pub discount_percent: Decimal,
    pub total_amount: Option<Decimal>,
    /// Lets a guest open the quote from the emailed link.
    #[serde(skip)]
    pub access_token: Uuid,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Whether `now` is past the validity window of a priced quote.
    #[must_use]
    pub fn is_past_validity(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until < now)
    }

    /// Whether the quote can be turned into an order right now.
    #[must_use]
    pub fn is_acceptable(&self, now: DateTime<Utc>) -> bool {
        self.status == QuoteStatus::PriceReady && !self.is_past_validity(now)
    }
}

/// A requested part on a quote.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuoteItem {
    pub id: QuoteItemId,
    pub quote_id: QuoteId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub part_number: Option<String>,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

impl QuoteItem {
    /// `unit_price * quantity`, once priced.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.map(|p| p * Decimal::from(self.quantity))
    }
}

/// A quote with its items, as shown on detail pages and in emails.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteDetail {
    #[serde(flatten)]
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
}

/// Staff view that also exposes internal notes and the guest token.
#[derive(Debug, Clone, Serialize)]
pub struct StaffQuoteDetail {
    #[serde(flatten)]
    pub detail: QuoteDetail,
    pub admin_notes: Option<String>,
}

impl From<QuoteDetail> for StaffQuoteDetail {
    fn from(detail: QuoteDetail) -> Self {
        let admin_notes = detail.quote.admin_notes.clone();
        Self {
            detail,
            admin_notes,
        }
    }
}

/// Returned once, right after submission, so a guest can bookmark the quote.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedQuote {
    #[serde(flatten)]
    pub detail: QuoteDetail,
    pub access_token: Uuid,
}

/// A new quote line before insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewQuoteItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Validated input for creating a quote.
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub reference: String,
    pub user_id: Option<UserId>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub vehicle_info: Option<String>,
    pub customer_notes: Option<String>,
    pub items: Vec<NewQuoteItem>,
}

/// A staff-entered price for one quote item.
#[derive(Debug, Clone, Copy)]
pub struct ItemPrice {
    pub item_id: QuoteItemId,
    pub unit_price: Decimal,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn quote(status: QuoteStatus, valid_until: Option<DateTime<Utc>>) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId::new(1),
            reference: "RFQ-20260101-ABC123".to_owned(),
            user_id: None,
            contact_name: "Guest".to_owned(),
            contact_email: "guest@example.com".to_owned(),
            contact_phone: None,
            vehicle_info: None,
            customer_notes: None,
            admin_notes: Some("margin 20%".to_owned()),
            status,
            discount_percent: Decimal::ZERO,
            total_amount: None,
            access_token: Uuid::new_v4(),
            valid_until,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_acceptable_only_when_priced_and_valid() {
        let now = Utc::now();
        assert!(quote(QuoteStatus::PriceReady, Some(now + Duration::days(1))).is_acceptable(now));
        assert!(!quote(QuoteStatus::PriceReady, Some(now - Duration::days(1))).is_acceptable(now));
        assert!(!quote(QuoteStatus::Reviewing, None).is_acceptable(now));
        assert!(!quote(QuoteStatus::Converted, Some(now + Duration::days(1))).is_acceptable(now));
    }

    #[test]
    fn test_public_json_hides_internal_fields() {
        let json = serde_json::to_value(quote(QuoteStatus::Pending, None)).unwrap_or_default();
        assert!(json.get("admin_notes").is_none());
        assert!(json.get("access_token").is_none());
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_line_total() {
        let item = QuoteItem {
            id: QuoteItemId::new(1),
            quote_id: QuoteId::new(1),
            product_id: ProductId::new(9),
            product_name: "Brake disc".to_owned(),
            product_slug: "brake-disc".to_owned(),
            part_number: None,
            quantity: 2,
            unit_price: Some(Decimal::new(4999, 2)),
        };
        assert_eq!(item.line_total(), Some(Decimal::new(9998, 2)));
    }
}
