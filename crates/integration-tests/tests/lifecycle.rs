//! Quote and order lifecycle rules exercised through the public core API.
//!
//! These run offline as part of a plain `cargo test`.

use rust_decimal::Decimal;

use spareline_core::{
    ChatStatus, OrderStatus, Permission, PricedLine, PricingError, QuoteStatus, UserRole,
    quote_total,
};

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[test]
fn test_quote_happy_path_ends_converted() {
    let mut status = QuoteStatus::Pending;
    for next in [
        QuoteStatus::Reviewing,
        QuoteStatus::PriceReady,
        QuoteStatus::PriceReady,
        QuoteStatus::Converted,
    ] {
        status = status.transition(next).unwrap();
    }
    assert_eq!(status, QuoteStatus::Converted);
    assert!(status.is_terminal());
}

#[test]
fn test_quote_cannot_skip_review_or_leave_terminal_states() {
    assert!(QuoteStatus::Pending.transition(QuoteStatus::PriceReady).is_err());
    assert!(QuoteStatus::Reviewing.transition(QuoteStatus::Converted).is_err());
    for terminal in [QuoteStatus::Expired, QuoteStatus::Converted] {
        for next in QuoteStatus::ALL {
            assert!(terminal.transition(next).is_err(), "{terminal} -> {next}");
        }
    }
}

#[test]
fn test_any_open_quote_can_expire() {
    let sources = QuoteStatus::sources_of(QuoteStatus::Expired);
    assert_eq!(
        sources,
        vec![QuoteStatus::Pending, QuoteStatus::Reviewing, QuoteStatus::PriceReady]
    );
}

#[test]
fn test_order_moves_forward_only() {
    let shipped = OrderStatus::Pending.transition(OrderStatus::Shipped).unwrap();
    assert_eq!(shipped, OrderStatus::Shipped);
    assert!(shipped.transition(OrderStatus::Paid).is_err());
    assert!(shipped.transition(OrderStatus::Shipped).is_err());
    assert!(shipped.transition(OrderStatus::Delivered).is_ok());
    assert!(!OrderStatus::Pending.counts_as_revenue());
    assert!(OrderStatus::Paid.counts_as_revenue());
}

#[test]
fn test_priced_total_with_discount() {
    let lines = [
        PricedLine::new(Some(d("20.00")), 3),
        PricedLine::new(Some(d("4.99")), 1),
    ];
    assert_eq!(quote_total(&lines, d("10")).unwrap(), d("58.49"));
    assert_eq!(quote_total(&lines, Decimal::ONE_HUNDRED).unwrap(), Decimal::ZERO);
    assert_eq!(
        quote_total(&lines, d("100.01")).unwrap_err(),
        PricingError::InvalidDiscount(d("100.01"))
    );
}

#[test]
fn test_unpriced_line_blocks_total() {
    let lines = [
        PricedLine::new(Some(d("20.00")), 1),
        PricedLine::new(None, 2),
    ];
    assert_eq!(
        quote_total(&lines, Decimal::ZERO).unwrap_err(),
        PricingError::Unpriced { index: 1 }
    );
}

#[test]
fn test_chat_closed_is_terminal() {
    assert!(ChatStatus::Resolved.transition(ChatStatus::Active).is_ok());
    for next in ChatStatus::ALL {
        assert!(ChatStatus::Closed.transition(next).is_err());
    }
}

#[test]
fn test_sales_manager_handles_quotes_not_catalog() {
    let role = UserRole::SalesManager;
    assert!(role.has(Permission::ManageQuotes));
    assert!(role.has(Permission::ManageOrders));
    assert!(!role.has(Permission::ManageCatalog));
    assert!(!UserRole::Customer.has(Permission::ViewStats));
}
