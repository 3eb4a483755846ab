//! Spareline server library.
//!
//! The storefront and back-office JSON API for the Spareline auto-parts
//! store, exposed as a library so the router can be tested and reused.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`db`] - `PostgreSQL` repositories
//! - [`services`] - Quote, order, auth, chat, mail and settings workflows
//! - [`routes`] - Axum handlers
//! - [`middleware`] - Sessions, auth extractors, rate limits, headers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
