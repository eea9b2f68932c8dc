//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - Insert DTOs and query parameter structs where the table needs them

pub mod ad;
pub mod featured_audit;
pub mod featured_placement;
pub mod platform_setting;
