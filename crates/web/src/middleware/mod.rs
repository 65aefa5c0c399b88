//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions over a bounded `moka` cache)
//! 5. Security headers (CSP admitting Google sign-in)
//!
//! Per-visitor state is loaded by the [`ClientSession`] and [`RequireAdmin`]
//! extractors rather than a layer. Routes that can create a guest identity
//! carry a per-IP rate limiter as a route layer.

pub mod client;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use client::{AdminRejection, CLIENT_STATE_KEY, ClientSession, ClientState, RequireAdmin};
pub use rate_limit::{page_rate_limiter, sign_in_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{SessionCache, create_session_layer};
