//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or any `PgExecutor`, for use inside a transaction) as
//! the first argument.

pub mod ad_repo;
pub mod featured_audit_repo;
pub mod featured_placement_repo;
pub mod platform_setting_repo;
pub mod user_credit_repo;

pub use ad_repo::AdRepo;
pub use featured_audit_repo::FeaturedAuditRepo;
pub use featured_placement_repo::FeaturedPlacementRepo;
pub use platform_setting_repo::PlatformSettingRepo;
pub use user_credit_repo::UserCreditRepo;
