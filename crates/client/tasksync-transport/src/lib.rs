//! Authenticated HTTP pipeline.
//!
//! Every outbound request goes through [`ApiClient`], which attaches the
//! current credential as a bearer token and reacts uniformly to authorization
//! failure: clear the credential store and route to the login surface. All
//! other errors pass through unmodified for the owning feature to handle.

mod client;
mod error;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
