//! Tidewear Core - Shared cart types.
//!
//! This crate provides the domain types used by every Tidewear component:
//! - `cart` - The cart synchronization engine (guest cache and remote cart)
//! - `cli` - Command-line driver over the engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no async, no
//! HTTP clients. This keeps it lightweight and lets the engine, its fakes, and
//! its tests share one vocabulary.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, size labels, prices, credentials, cart lines and state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
