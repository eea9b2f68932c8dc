//! Domain types, constants, and validation for the featured-ad engine.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! repository layer, the engine, the API server, and the sweep binary.

pub mod capacity;
pub mod error;
pub mod featured;
pub mod roles;
pub mod types;
