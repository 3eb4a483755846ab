//! Spareline Core - Shared domain types.
//!
//! This crate provides the types used across all Spareline components:
//! - `server` - The storefront and back-office JSON API
//! - `cli` - Command-line tools for migrations, seeding and staff accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Quote pricing, status transitions and the role
//! permission matrix live here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, statuses, roles, pricing and slugs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
