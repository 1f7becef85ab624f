//! Proximity ranking of a route's tail after an insertion.
//!
//! The ranking itself is an external concern; the engine only depends on
//! [`ProximityRanker`]. [`NearestNeighborRanker`] is the in-process fallback
//! used when no routing provider is configured.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::nearest_index;
use crate::models::location::GeoPoint;

#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub stop_id: Uuid,
    pub location: Option<GeoPoint>,
}

#[async_trait]
pub trait ProximityRanker: Send + Sync {
    /// Returns every candidate's stop id in visiting order, starting from
    /// `anchor`.
    async fn rank(
        &self,
        candidates: Vec<RankCandidate>,
        anchor: GeoPoint,
    ) -> Result<Vec<Uuid>, AppError>;
}

/// Greedy nearest-neighbour walk over great-circle distance. Stops without
/// coordinates keep their relative order and go last.
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborRanker;

#[async_trait]
impl ProximityRanker for NearestNeighborRanker {
    async fn rank(
        &self,
        candidates: Vec<RankCandidate>,
        anchor: GeoPoint,
    ) -> Result<Vec<Uuid>, AppError> {
        let (mut located, unlocated): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|candidate| candidate.location.is_some());

        let mut ordered = Vec::with_capacity(located.len() + unlocated.len());
        let mut cursor = anchor;

        while !located.is_empty() {
            let points: Vec<GeoPoint> = located
                .iter()
                .filter_map(|candidate| candidate.location)
                .collect();
            let Some(next) = nearest_index(&cursor, &points) else {
                break;
            };
            let candidate = located.remove(next);
            if let Some(location) = candidate.location {
                cursor = location;
            }
            ordered.push(candidate.stop_id);
        }

        ordered.extend(unlocated.into_iter().map(|candidate| candidate.stop_id));
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{NearestNeighborRanker, ProximityRanker, RankCandidate};
    use crate::models::location::GeoPoint;

    fn candidate(seed: u128, location: Option<(f64, f64)>) -> RankCandidate {
        RankCandidate {
            stop_id: Uuid::from_u128(seed),
            location: location.map(|(lat, lng)| GeoPoint { lat, lng }),
        }
    }

    #[tokio::test]
    async fn walks_outward_from_anchor() {
        let anchor = GeoPoint { lat: 0.0, lng: 0.0 };
        let ranked = NearestNeighborRanker
            .rank(
                vec![
                    candidate(1, Some((0.0, 0.3))),
                    candidate(2, Some((0.0, 0.1))),
                    candidate(3, Some((0.0, 0.2))),
                ],
                anchor,
            )
            .await
            .unwrap();

        assert_eq!(
            ranked,
            vec![Uuid::from_u128(2), Uuid::from_u128(3), Uuid::from_u128(1)]
        );
    }

    #[tokio::test]
    async fn unlocated_stops_trail_in_original_order() {
        let anchor = GeoPoint { lat: 0.0, lng: 0.0 };
        let ranked = NearestNeighborRanker
            .rank(
                vec![
                    candidate(1, None),
                    candidate(2, Some((1.0, 1.0))),
                    candidate(3, None),
                ],
                anchor,
            )
            .await
            .unwrap();

        assert_eq!(
            ranked,
            vec![Uuid::from_u128(2), Uuid::from_u128(1), Uuid::from_u128(3)]
        );
    }
}
