//! Core types for Spareline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod pricing;
pub mod role;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use pricing::{MAX_LINE_QUANTITY, PricedLine, PricingError, quote_total, subtotal, validate_discount};
pub use role::{Permission, UserRole};
pub use slug::{is_valid_slug, slugify};
pub use status::*;
