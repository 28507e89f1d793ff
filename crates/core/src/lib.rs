//! Greenhouse Core - Shared domain types.
//!
//! This crate provides the types shared by every Greenhouse component:
//! - `client` - Synchronized cart and notification caches
//! - `cli` - Terminal front-end over the client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async
//! runtime. Wire names follow the backend's JSON documents (`quantite`,
//! `montantTotal`, `estLue`, ...) through serde renames, so the Rust side
//! keeps English field names.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, prices, quantities, cart entries and notifications

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
