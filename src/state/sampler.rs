use super::session::Lockout;
use crate::catalog::CatalogProvider;
use crate::types::CandidateId;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("No acceptable title after {0} attempts")]
    Exhausted(u32),

    #[error("Catalog access is blocked")]
    LockedOut,
}

/// Draw random titles until one is unseen and has a usable name
///
/// Returns `LockedOut` both when the lockout was already set and when the
/// catalog answers with a permission/rate-limit status; the caller trips it.
pub async fn sample_candidate(
    catalog: &dyn CatalogProvider,
    lockout: &Lockout,
    recent: &HashSet<CandidateId>,
    attempts: u32,
) -> Result<CandidateId, SampleError> {
    for attempt in 1..=attempts {
        if lockout.is_set() {
            return Err(SampleError::LockedOut);
        }

        let summary = match catalog.random_title().await {
            Ok(summary) => summary,
            Err(e) if e.is_lockout() => {
                tracing::warn!(error = %e, attempt, "Random title request rejected");
                return Err(SampleError::LockedOut);
            }
            Err(e) => {
                tracing::debug!(error = %e, attempt, "Random title request failed");
                continue;
            }
        };

        let Some(id) = summary.id else {
            tracing::debug!(attempt, "Random title without id");
            continue;
        };

        if recent.contains(&id) {
            tracing::debug!(id, attempt, "Skipping recently played title");
            continue;
        }

        if !summary.has_usable_name() {
            tracing::debug!(id, attempt, "Skipping title without a name");
            continue;
        }

        tracing::debug!(id, attempt, "Sampled candidate");
        return Ok(id);
    }

    tracing::warn!(attempts, "Sampler exhausted without an acceptable title");
    Err(SampleError::Exhausted(attempts))
}
