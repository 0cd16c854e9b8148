//! OpenRouter-compatible completion client.
//!
//! Implements [`pipeline::CompletionProvider`] for any endpoint speaking the
//! OpenAI chat-completions dialect, OpenRouter by default.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing,
//! JSON extraction from model output, log redaction and exponential back-off
//! live here. The [`pipeline`] crate sees only
//! [`pipeline::CompletionProvider`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `OpenRouterConfig` and its defaults |
//! | [`transport`] | `HttpTransport` port and the reqwest implementation |
//! | [`request`] | Request validation and wire-body construction |
//! | [`response`] | Status mapping, completion parsing, JSON extraction |
//! | [`retry`] | Capped exponential backoff loop |
//! | [`redact`] | Credential redaction for log payloads |
//! | [`client`] | `OpenRouterClient` |

pub mod client;
pub mod config;
pub mod redact;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use client::OpenRouterClient;
pub use config::{OpenRouterConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};
pub use redact::sanitize_for_logging;
pub use response::extract_json;
pub use retry::backoff_delay;
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError,
};
