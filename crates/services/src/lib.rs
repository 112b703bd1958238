//! HTTP-backed implementations of the external service traits.
//!
//! Both network services speak OpenAI-compatible protocols (Ollama, OpenAI,
//! vLLM) with bounded per-call timeouts. Transient failures degrade to
//! `Ok(None)` so the callers can continue without them.

pub mod embedder;
pub mod reputation;
pub mod validator;

pub use embedder::HttpEmbedder;
pub use reputation::StaticReputation;
pub use validator::LlmStanceValidator;

use worldview_core::error::ServiceError;

/// Map a reqwest transport failure onto the service error taxonomy.
pub(crate) fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(e.to_string())
    } else {
        ServiceError::Network(e.to_string())
    }
}
