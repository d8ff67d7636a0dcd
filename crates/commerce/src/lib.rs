//! Clementine Commerce - catalog, cart and order services.
//!
//! This crate is the service core of the Clementine shop backend. It is
//! invoked internally (there is no HTTP surface here); transports, session
//! auth, mail delivery and PDF rendering are external collaborators reached
//! through the traits in [`cart_store`], [`invoice`], [`notify`] and
//! [`cache`].
//!
//! # Architecture
//!
//! - [`catalog`] - product/category reads behind a read-through cache, and
//!   admin writes with cache invalidation
//! - [`cart`] - per-user carts feeding order placement
//! - [`orders`] - order placement (the transactional core), order lifecycle
//!   and dashboard aggregation
//! - [`ledger`] - transactional persistence with an atomic conditional
//!   stock decrement; Postgres and in-memory implementations
//! - [`cache`] - cache-aside keying, TTLs and tag-based invalidation
//! - [`db`] - Postgres repositories and pool construction
//!
//! All operations take an explicit [`auth::Actor`] carrying the caller's
//! permission set; there is no ambient request context.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod activity;
pub mod auth;
pub mod cache;
pub mod cart;
pub mod cart_store;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod orders;

pub use error::{CommerceError, Result};
