//! # Data Retrieval Module
//!
//! HTTP request/response lookups that sit outside the streaming path.
//!
//! - **`ky_http`**: a generic JSON `ApiClient` on `reqwest`, with optional
//!   retry middleware.
//! - **`details`**: phone and contact lookups for a listing reference.

/// Generic HTTP API client.
pub mod ky_http;
/// Phone and contact lookups.
pub mod details;

pub use details::{Contact, DetailsClient};
pub use ky_http::{ApiClient, ApiResponse};
