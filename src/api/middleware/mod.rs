//! API middleware stack.
//!
//! Public routes (outermost → innermost):
//! 1. Rate limiter keyed by peer address
//!
//! Protected routes (outermost → innermost):
//! 1. Auth validator (JWT + session mirrored on the user row)
//! 2. Rate limiter keyed by the authenticated user
//! 3. Audit logger (logs after auth, has the user id)

pub mod audit;
pub mod auth;
pub mod rate;
