//! Router Module Index
//!
//! Splits the API by who may reach it. Public routes need no session; the other two
//! sit behind `auth_middleware`, which answers 401 before any handler runs. The
//! role check itself is done per operation by the capability gate in each handler.

/// Routes open to anonymous visitors of the blog frontend.
pub mod public;

/// Routes for any logged-in panel user (authors, editors, admins).
pub mod authenticated;

/// Routes whose capabilities are held by admins only.
pub mod admin;
