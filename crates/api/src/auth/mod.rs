//! Authentication primitives.
//!
//! - [`jwt`] -- HS256 access-token issuance and validation.

pub mod jwt;
