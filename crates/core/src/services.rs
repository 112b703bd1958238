//! External service traits — embedding, stance validation, reputation.
//!
//! All three are synchronous call abstractions with bounded timeouts and an
//! explicit degrade path: `Ok(None)` means "service unavailable, continue
//! without it", never a silent drop. Only an explicit low-confidence verdict
//! may reject a pending evidence entry.

use crate::axis::{PoleAlignment, StanceVerdict};
use crate::error::ServiceError;
use async_trait::async_trait;

/// Turns text into a fixed-length vector.
///
/// `Ok(None)` signals a transient failure (timeout, network): the caller
/// skips the text this cycle and retries the next one.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ServiceError>;
}

/// Black-box classifier that checks whether a piece of evidence really
/// supports the pole it claims to.
///
/// `Ok(None)` signals unavailability and is treated as
/// accept-without-validation.
#[async_trait]
pub trait StanceValidator: Send + Sync {
    async fn validate(
        &self,
        axis_label: &str,
        pole_left: &str,
        pole_right: &str,
        evidence_text: &str,
        claimed: PoleAlignment,
    ) -> Result<Option<StanceVerdict>, ServiceError>;
}

/// Maps a source identity to a bounded numeric reputation.
/// `None` = unknown source (scored as zero trust).
pub trait ReputationProvider: Send + Sync {
    fn reputation(&self, source_id: &str) -> Option<f64>;
}

/// A reputation provider that knows nobody. Every source scores zero trust.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReputation;

impl ReputationProvider for NoReputation {
    fn reputation(&self, _source_id: &str) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reputation_knows_nobody() {
        assert!(NoReputation.reputation("anyone").is_none());
    }
}
