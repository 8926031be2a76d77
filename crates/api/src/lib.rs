//! # Pantry API
//!
//! Typed HTTP client for the Pantry kitchen backend. Every request carries the
//! current bearer token, and authentication failures are reported back to the
//! session owner through [`SessionHandle`].
//!
//! ## Layout
//!
//! - **client**: request dispatch, credential attachment, rejection handling
//! - **endpoints**: one `impl ApiClient` block per backend area
//! - **models**: wire records (camelCase JSON)

pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;

pub use client::{ApiClient, SessionHandle};
pub use error::{ApiError, ApiResult, RejectionReason};
pub use models::*;
