//! Interest rotation across successive runs.
//!
//! The persisted offset round-robins which interests get queried first,
//! so repeated discovery for the same (city, interest set) surfaces
//! variety instead of always the same leading interests.

use tracing::warn;

use crate::storage::EventStore;
use crate::types::DiscoveryRequest;

/// Rotate the request's interests by the persisted offset, then advance
/// and persist the offset for the next run. Storage failures fall back
/// to the unrotated order; rotation is advisory.
pub async fn rotated_interests(store: &dyn EventStore, request: &DiscoveryRequest) -> Vec<String> {
    let interests = request.interests.clone();
    if interests.len() < 2 {
        return interests;
    }

    let signature = request.interest_signature();
    let offset = match store.get_rotation(&request.city, &signature).await {
        Ok(offset) => offset.unwrap_or(0),
        Err(e) => {
            warn!(error = %e, "Failed to read rotation offset");
            0
        }
    };

    let n = interests.len();
    let start = (offset.rem_euclid(n as i64)) as usize;
    let mut rotated = Vec::with_capacity(n);
    rotated.extend_from_slice(&interests[start..]);
    rotated.extend_from_slice(&interests[..start]);

    if let Err(e) = store
        .set_rotation(&request.city, &signature, offset.wrapping_add(1))
        .await
    {
        warn!(error = %e, "Failed to persist rotation offset");
    }

    rotated
}
