//! Request extractors enforcing authentication and authorization.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`rbac::RequireAuth`] -- Requires any authenticated user.
//! - [`scheduler::RequireScheduler`] -- Requires the scheduler capability token.

pub mod auth;
pub mod rbac;
pub mod scheduler;
