//! Core types for Tidewear.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod credential;
pub mod id;
pub mod price;
pub mod size;
pub mod status;

pub use cart::{CartLine, CartState, LineKey, Product, ProductSummary};
pub use credential::Credential;
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use size::{Size, SizeError};
pub use status::*;
