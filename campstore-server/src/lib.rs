//! # campstore server
//!
//! HTTP front end of a small registration service: students apply to a camp,
//! visitors send contact messages, and an administrator reviews both.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! campstore-server --help
//!
//! # Serve on port 8080, keep data in ./data
//! campstore-server --port 8080 --data-dir ./data
//!
//! # Throwaway instance for a demo
//! campstore-server --storage memory
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or environment variables (CLI takes precedence):
//!
//! ```bash
//! export CAMPSTORE_PORT=9090
//! export CAMPSTORE_ADMIN_TOKEN=change-me-to-something-long
//! campstore-server
//!
//! # List all available environment variables
//! campstore-server --list-env-vars
//! ```
//!
//! ### Key Configuration Options
//!
//! - **Storage**: `--storage file|memory`, `--data-dir ./data`
//! - **Rate limiting**: `--rate-limit 10 --rate-window 60` submissions per client
//! - **Admin access**: `--admin-token <TOKEN>`; admin routes are open without one
//! - **Proxies**: `--trust-forwarded-for` keys clients by `X-Forwarded-For`
//! - **Log Level**: `--log-level error|warn|info|debug|trace`
//!
//! ## Example
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/contact \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Jean", "email": "jean@mail.fr", "interest": "parent",
//!        "message": "Is there a bus from the station?"}'
//!
//! curl http://localhost:8080/api/messages -H "Authorization: Bearer $CAMPSTORE_ADMIN_TOKEN"
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────────┐
//! │     HTTP     │────▶│ SlidingWindowLimiter │  (submissions only)
//! │  Transport   │     └──────────────────────┘
//! └──────┬───────┘
//!        │ spawn_blocking
//! ┌──────▼───────┐     ┌──────────────────────┐
//! │   Registry   │────▶│ RecordStore per      │──▶ <data_dir>/<name>.json
//! │              │     │ collection           │
//! └──────────────┘     └──────────────────────┘
//! ```
//!
//! See [`transport::http`] for the endpoint list.

pub mod config;
pub mod metrics;
pub mod store;
pub mod transport;
pub mod types;
