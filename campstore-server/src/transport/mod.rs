//! Transport layer of the registration service
//!
//! All transports implement the [`Transport`] trait and share one
//! [`AppState`]: the collection registry, the submission rate limiter and
//! the metrics.
//!
//! # Available Transports
//!
//! - [`http`]: REST API with JSON

pub mod http;


pub use http::AppState;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for transport implementations
#[async_trait]
pub trait Transport {
    /// Start the transport server
    ///
    /// Binds to the configured address and serves requests until the
    /// server shuts down or an error occurs.
    async fn start(self, state: Arc<AppState>) -> Result<()>;
}
