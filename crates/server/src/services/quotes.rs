//! Request-for-quote workflow.
//!
//! A customer (or guest) submits parts and quantities; staff review the
//! request, enter unit prices and a discount, and the quote becomes
//! `price_ready` with a total and a validity window. Accepting a priced quote
//! is handled by the order service.

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use spareline_core::{
    Email, MAX_LINE_QUANTITY, Permission, PricedLine, PricingError, ProductId, QuoteId, QuoteItemId,
    QuoteStatus, TransitionError, UserId, quote_total, validate_discount,
};

use super::generate_reference;
use super::mail::MailService;
use crate::config::{MAX_QUOTE_VALID_DAYS, QuoteConfig};
use crate::db::quotes::QuotePricing;
use crate::db::{ProductRepository, QuoteRepository, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::quote::{
    ItemPrice, NewQuote, NewQuoteItem, Quote, QuoteDetail, StaffQuoteDetail, SubmittedQuote,
};
use crate::models::user::{User, Vehicle};
use crate::models::{CurrentUser, Page, Pagination};

/// Most distinct lines on one quote.
pub const MAX_QUOTE_ITEMS: usize = 50;
const MAX_NOTES_LENGTH: usize = 2000;
const MAX_SHORT_FIELD_LENGTH: usize = 200;

/// Errors raised by the quote workflow.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("{0}")]
    Validation(String),

    #[error("quote not found")]
    NotFound,

    #[error("you do not have access to this quote")]
    Forbidden,

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("quote {0} is no longer valid")]
    ValidityPassed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl QuoteError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Pricing(_) => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Transition(_) | Self::ValidityPassed(_) | Self::Repository(RepositoryError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Who is looking at a quote.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteViewer<'a> {
    pub user: Option<&'a CurrentUser>,
    pub token: Option<Uuid>,
}

impl QuoteViewer<'_> {
    /// Owner, holder of the guest token, or staff allowed to manage quotes.
    #[must_use]
    pub fn can_view(&self, quote: &Quote) -> bool {
        if self.token.is_some_and(|token| token == quote.access_token) {
            return true;
        }
        self.user.is_some_and(|user| {
            quote.user_id == Some(user.id) || user.role.has(Permission::ManageQuotes)
        })
    }
}

/// RFQ submission as received from the client.
#[derive(Debug, Clone, Default)]
pub struct QuoteRequest {
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub vehicle_info: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewQuoteItem>,
}

/// Staff pricing input.
#[derive(Debug, Clone)]
pub struct PriceRequest {
    pub prices: Vec<ItemPrice>,
    pub discount_percent: Decimal,
    pub admin_notes: Option<String>,
    pub valid_days: Option<i64>,
}

/// Quote workflow service.
pub struct QuoteService<'a> {
    pool: &'a PgPool,
    mail: &'a MailService,
    config: &'a QuoteConfig,
}

impl<'a> QuoteService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, mail: &'a MailService, config: &'a QuoteConfig) -> Self {
        Self { pool, mail, config }
    }

    fn quotes(&self) -> QuoteRepository<'a> {
        QuoteRepository::new(self.pool)
    }

    /// Validate and store a new quote request, then notify customer and staff.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::Validation` for bad contact details, item lists
    /// or unavailable products.
    #[instrument(skip(self, request, user), fields(items = request.items.len()))]
    pub async fn submit(&self, request: QuoteRequest, user: Option<&User>) -> Result<SubmittedQuote, QuoteError> {
        let items = merge_items(&request.items)?;

        let requested: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
        let active = ProductRepository::new(self.pool).active_ids(&requested).await?;
        if let Some(missing) = requested.iter().find(|id| !active.contains(id)) {
            return Err(QuoteError::Validation(format!(
                "product {missing} does not exist or is not available"
            )));
        }

        let contact = resolve_contact(&request, user)?;
        let new = NewQuote {
            reference: generate_reference("RFQ", Utc::now()),
            user_id: user.map(|u| u.id),
            contact_name: contact.name,
            contact_email: contact.email,
            contact_phone: contact.phone,
            vehicle_info: vehicle_info(&request, user)?,
            customer_notes: optional_text("notes", request.notes.as_deref(), MAX_NOTES_LENGTH)?,
            items,
        };

        let detail = self.quotes().create(&new).await?;
        tracing::info!(reference = %detail.quote.reference, "Quote submitted");
        add_breadcrumb("quotes", "Quote submitted", Some(&[("reference", &detail.quote.reference)]));

        self.mail.send_quote_received(&detail);
        self.mail.send_staff_quote_notice(&detail);

        let access_token = detail.quote.access_token;
        Ok(SubmittedQuote {
            detail,
            access_token,
        })
    }

    /// Quote by reference for a customer, guest or staff member.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::NotFound` or `QuoteError::Forbidden`.
    pub async fn get_for_viewer(&self, reference: &str, viewer: QuoteViewer<'_>) -> Result<QuoteDetail, QuoteError> {
        let detail = self
            .quotes()
            .get_by_reference(reference)
            .await?
            .ok_or(QuoteError::NotFound)?;
        if !viewer.can_view(&detail.quote) {
            return Err(QuoteError::Forbidden);
        }
        Ok(detail)
    }

    /// A customer's quotes.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::Repository` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Quote>, QuoteError> {
        Ok(self.quotes().list_for_user(user_id).await?)
    }

    /// Staff listing.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::Repository` if the query fails.
    pub async fn list(&self, status: Option<QuoteStatus>, pagination: Pagination) -> Result<Page<Quote>, QuoteError> {
        let (quotes, total) = self.quotes().list(status, pagination).await?;
        Ok(Page::new(quotes, total, pagination))
    }

    /// Staff view of one quote, including internal notes.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::NotFound` for an unknown id.
    pub async fn get_for_staff(&self, id: QuoteId) -> Result<StaffQuoteDetail, QuoteError> {
        let detail = self.quotes().get_by_id(id).await?.ok_or(QuoteError::NotFound)?;
        Ok(detail.into())
    }

    /// `pending → reviewing`.
    ///
    /// # Errors
    ///
    /// Returns a 409 error if the quote is not pending.
    #[instrument(skip(self))]
    pub async fn start_review(&self, id: QuoteId) -> Result<StaffQuoteDetail, QuoteError> {
        self.quotes().transition(id, QuoteStatus::Reviewing).await?;
        self.get_for_staff(id).await
    }

    /// Manually expire a quote that has not been converted.
    ///
    /// # Errors
    ///
    /// Returns a 409 error for expired or converted quotes.
    #[instrument(skip(self))]
    pub async fn expire(&self, id: QuoteId) -> Result<StaffQuoteDetail, QuoteError> {
        self.quotes().transition(id, QuoteStatus::Expired).await?;
        tracing::info!(quote_id = %id, "Quote expired manually");
        self.get_for_staff(id).await
    }

    /// Price every item, apply the discount and open the validity window.
    ///
    /// The quote row stays locked from the status check to the final write,
    /// so concurrent pricing requests are applied one after the other.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::Pricing`/`Validation` for incomplete or invalid
    /// prices and `QuoteError::Transition` if the quote cannot be priced.
    #[instrument(skip(self, request))]
    pub async fn set_prices(&self, id: QuoteId, request: PriceRequest) -> Result<StaffQuoteDetail, QuoteError> {
        validate_discount(request.discount_percent)?;
        let valid_days = request.valid_days.unwrap_or(self.config.default_valid_days);
        if !(1..=MAX_QUOTE_VALID_DAYS).contains(&valid_days) {
            return Err(QuoteError::Validation(format!(
                "valid_days must be between 1 and {MAX_QUOTE_VALID_DAYS}"
            )));
        }
        let admin_notes = optional_text("admin_notes", request.admin_notes.as_deref(), MAX_NOTES_LENGTH)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let quote = QuoteRepository::lock(&mut *tx, id).await?.ok_or(QuoteError::NotFound)?;
        quote.status.transition(QuoteStatus::PriceReady)?;

        let items = QuoteRepository::items(&mut *tx, id).await?;
        let prices = index_prices(&request.prices, &items.iter().map(|i| i.id).collect::<Vec<_>>())?;
        let lines: Vec<PricedLine> = items
            .iter()
            .map(|item| PricedLine::new(prices.get(&item.id).copied(), item.quantity))
            .collect();
        let total_amount = quote_total(&lines, request.discount_percent)?;

        QuoteRepository::write_prices(
            &mut *tx,
            id,
            &request.prices,
            &QuotePricing {
                discount_percent: request.discount_percent,
                total_amount,
                admin_notes: admin_notes.as_deref(),
                valid_until: Utc::now() + Duration::days(valid_days),
            },
        )
        .await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        let detail = self.quotes().get_by_id(id).await?.ok_or(QuoteError::NotFound)?;
        tracing::info!(reference = %detail.quote.reference, total = %total_amount, "Quote priced");
        add_breadcrumb("quotes", "Quote priced", Some(&[("reference", &detail.quote.reference)]));
        self.mail.send_quote_ready(&detail);
        Ok(detail.into())
    }
}

/// Check quantities and merge duplicate products, keeping first-seen order.
fn merge_items(items: &[NewQuoteItem]) -> Result<Vec<NewQuoteItem>, QuoteError> {
    if items.is_empty() {
        return Err(QuoteError::Validation("a quote needs at least one item".to_owned()));
    }
    if items.len() > MAX_QUOTE_ITEMS {
        return Err(QuoteError::Validation(format!(
            "a quote can have at most {MAX_QUOTE_ITEMS} items"
        )));
    }

    let mut merged: Vec<NewQuoteItem> = Vec::with_capacity(items.len());
    for item in items {
        if !(1..=MAX_LINE_QUANTITY).contains(&item.quantity) {
            return Err(QuoteError::Validation(format!(
                "quantity for product {} must be between 1 and {MAX_LINE_QUANTITY}",
                item.product_id
            )));
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity += item.quantity,
            None => merged.push(*item),
        }
    }

    if let Some(line) = merged.iter().find(|m| m.quantity > MAX_LINE_QUANTITY) {
        return Err(QuoteError::Validation(format!(
            "total quantity for product {} must not exceed {MAX_LINE_QUANTITY}",
            line.product_id
        )));
    }
    Ok(merged)
}

/// Map item id → price, rejecting negative prices, unknown and repeated items.
fn index_prices(
    prices: &[ItemPrice],
    item_ids: &[QuoteItemId],
) -> Result<HashMap<QuoteItemId, Decimal>, QuoteError> {
    let mut indexed = HashMap::with_capacity(prices.len());
    for price in prices {
        if !item_ids.contains(&price.item_id) {
            return Err(QuoteError::Validation(format!(
                "item {} is not on this quote",
                price.item_id
            )));
        }
        if price.unit_price < Decimal::ZERO {
            return Err(QuoteError::Validation(format!(
                "price for item {} must not be negative",
                price.item_id
            )));
        }
        if indexed.insert(price.item_id, price.unit_price).is_some() {
            return Err(QuoteError::Validation(format!(
                "item {} is priced more than once",
                price.item_id
            )));
        }
    }
    Ok(indexed)
}

struct Contact {
    name: String,
    email: String,
    phone: Option<String>,
}

/// Explicit fields win; signed-in users fall back to their profile.
fn resolve_contact(request: &QuoteRequest, user: Option<&User>) -> Result<Contact, QuoteError> {
    let given = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let name = given(&request.contact_name)
        .or_else(|| user.map(User::display_name))
        .ok_or_else(|| QuoteError::Validation("contact_name is required".to_owned()))?;
    if name.chars().count() > MAX_SHORT_FIELD_LENGTH {
        return Err(QuoteError::Validation("contact_name is too long".to_owned()));
    }

    let email = match given(&request.contact_email) {
        Some(raw) => Email::parse(&raw)
            .map_err(|e| QuoteError::Validation(format!("contact_email: {e}")))?
            .into_inner(),
        None => user
            .map(|u| u.email.as_str().to_owned())
            .ok_or_else(|| QuoteError::Validation("contact_email is required".to_owned()))?,
    };

    let phone = given(&request.contact_phone).or_else(|| user.and_then(|u| u.phone.clone()));

    Ok(Contact { name, email, phone })
}

/// The stated vehicle, else the first one in the customer's garage.
fn vehicle_info(request: &QuoteRequest, user: Option<&User>) -> Result<Option<String>, QuoteError> {
    let stated = optional_text("vehicle_info", request.vehicle_info.as_deref(), MAX_SHORT_FIELD_LENGTH)?;
    Ok(stated.or_else(|| user.and_then(|u| u.garage.first()).map(Vehicle::describe)))
}

fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, QuoteError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(QuoteError::Validation(format!("{field} must be at most {max} characters")));
    }
    Ok(Some(value.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spareline_core::UserRole;

    use super::*;

    fn item(product: i32, quantity: i32) -> NewQuoteItem {
        NewQuoteItem {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_merge_items_sums_duplicates() {
        let merged = merge_items(&[item(1, 2), item(2, 1), item(1, 3)]).unwrap();
        assert_eq!(merged, vec![item(1, 5), item(2, 1)]);
    }

    #[test]
    fn test_merge_items_limits() {
        assert!(merge_items(&[]).is_err());
        assert!(merge_items(&[item(1, 0)]).is_err());
        assert!(merge_items(&[item(1, MAX_LINE_QUANTITY + 1)]).is_err());
        assert!(merge_items(&[item(1, 600), item(1, 600)]).is_err());
        let too_many: Vec<_> = (0..=i32::try_from(MAX_QUOTE_ITEMS).unwrap()).map(|i| item(i, 1)).collect();
        assert!(merge_items(&too_many).is_err());
    }

    #[test]
    fn test_index_prices() {
        let ids = [QuoteItemId::new(1), QuoteItemId::new(2)];
        let price = |id, cents| ItemPrice {
            item_id: QuoteItemId::new(id),
            unit_price: Decimal::new(cents, 2),
        };

        let indexed = index_prices(&[price(1, 1000), price(2, 250)], &ids).unwrap();
        assert_eq!(indexed[&QuoteItemId::new(2)], Decimal::new(250, 2));

        assert!(index_prices(&[price(3, 100)], &ids).is_err());
        assert!(index_prices(&[price(1, -1)], &ids).is_err());
        assert!(index_prices(&[price(1, 100), price(1, 200)], &ids).is_err());
    }

    #[test]
    fn test_guest_must_give_name_and_email() {
        let request = QuoteRequest {
            contact_name: Some("Guest".to_owned()),
            ..QuoteRequest::default()
        };
        assert!(resolve_contact(&request, None).is_err());

        let request = QuoteRequest {
            contact_name: Some("Guest".to_owned()),
            contact_email: Some(" Guest@Example.com ".to_owned()),
            ..QuoteRequest::default()
        };
        let contact = resolve_contact(&request, None).unwrap();
        assert_eq!(contact.email, "guest@example.com");
    }

    #[test]
    fn test_vehicle_info_falls_back_to_garage() {
        let now = Utc::now();
        let customer = User {
            id: UserId::new(3),
            email: Email::parse("rui@example.com").unwrap(),
            first_name: "Rui".to_owned(),
            last_name: "Costa".to_owned(),
            phone: None,
            role: UserRole::Customer,
            is_active: true,
            two_factor_enabled: false,
            garage: vec![Vehicle {
                make: "Renault".to_owned(),
                model: "Clio".to_owned(),
                year: Some(2010),
                engine: None,
                vin: None,
                nickname: None,
            }],
            addresses: Vec::new(),
            favorites: Vec::new(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let blank = QuoteRequest {
            vehicle_info: Some("  ".to_owned()),
            ..QuoteRequest::default()
        };
        assert_eq!(
            vehicle_info(&blank, Some(&customer)).unwrap().as_deref(),
            Some("2010 Renault Clio")
        );
        assert_eq!(vehicle_info(&blank, None).unwrap(), None);

        let stated = QuoteRequest {
            vehicle_info: Some("Peugeot 208".to_owned()),
            ..QuoteRequest::default()
        };
        assert_eq!(
            vehicle_info(&stated, Some(&customer)).unwrap().as_deref(),
            Some("Peugeot 208")
        );
    }

    #[test]
    fn test_viewer_access() {
        let now = Utc::now();
        let token = Uuid::new_v4();
        let quote = Quote {
            id: QuoteId::new(1),
            reference: "RFQ-20260101-ABC123".to_owned(),
            user_id: Some(UserId::new(5)),
            contact_name: "Ana".to_owned(),
            contact_email: "ana@example.com".to_owned(),
            contact_phone: None,
            vehicle_info: None,
            customer_notes: None,
            admin_notes: None,
            status: QuoteStatus::Pending,
            discount_percent: Decimal::ZERO,
            total_amount: None,
            access_token: token,
            valid_until: None,
            created_at: now,
            updated_at: now,
        };
        let user = |id, role| CurrentUser {
            id: UserId::new(id),
            email: Email::parse("someone@example.com").unwrap(),
            role,
        };
        let owner = user(5, UserRole::Customer);
        let stranger = user(6, UserRole::Customer);
        let sales = user(7, UserRole::SalesManager);
        let stock = user(8, UserRole::InventoryStaff);

        assert!(QuoteViewer { user: Some(&owner), token: None }.can_view(&quote));
        assert!(!QuoteViewer { user: Some(&stranger), token: None }.can_view(&quote));
        assert!(QuoteViewer { user: Some(&stranger), token: Some(token) }.can_view(&quote));
        assert!(QuoteViewer { user: Some(&sales), token: None }.can_view(&quote));
        assert!(!QuoteViewer { user: Some(&stock), token: None }.can_view(&quote));
        assert!(!QuoteViewer { user: None, token: Some(Uuid::new_v4()) }.can_view(&quote));
    }
}
