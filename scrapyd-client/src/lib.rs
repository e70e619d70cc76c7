//! Typed client for the Scrapyd JSON API.
//!
//! Only the endpoints the keeper needs are covered. Responses are decoded into
//! small wire structs and checked for `"status": "ok"` before being handed back.

mod client;
mod error;
mod types;

pub use client::DEFAULT_REQUEST_TIMEOUT;
pub use client::JobSource;
pub use client::ScrapydClient;
pub use error::ScrapydError;
pub use types::JobSnapshot;
pub use types::JobStatus;
pub use types::RawJob;
pub use types::SpiderDescriptor;
