//! Distance-threshold decision logic for identification and verification.
//!
//! Pure functions over embeddings: no I/O, no shared state beyond the
//! gallery snapshot passed in.

use crate::types::{Embedding, EmbeddingError, GalleryEntry, MatchDecision};

/// Default maximum distance for identification against the gallery.
pub const DEFAULT_IDENTIFY_TOLERANCE: f32 = 0.5;

/// Default maximum distance for one-to-one verification.
///
/// Looser than identification on purpose: verification compares against
/// a single enrolled photo rather than picking one person out of many.
pub const DEFAULT_VERIFY_TOLERANCE: f32 = 0.6;

/// Match a probe embedding against an entire gallery snapshot.
///
/// First-match policy: the first entry in gallery iteration order whose
/// distance is at or under `tolerance` wins, even when a later entry is
/// nearer. With several enrolled photos inside tolerance the earliest
/// entry is reported; switching to nearest-match would change results
/// for galleries holding multiple similar faces.
///
/// With no candidate (or an empty gallery) the decision carries
/// `is_match = false` and the smallest distance observed, which is
/// `f32::INFINITY` when the gallery is empty.
pub fn identify(
    probe: &Embedding,
    gallery: &[GalleryEntry],
    tolerance: f32,
) -> Result<MatchDecision, EmbeddingError> {
    let mut nearest = f32::INFINITY;

    for entry in gallery {
        let distance = probe.distance(&entry.embedding)?;
        if distance <= tolerance {
            return Ok(MatchDecision {
                matched_name: Some(entry.name.clone()),
                distance,
                is_match: true,
                confidence: 1.0 - distance,
            });
        }
        if distance < nearest {
            nearest = distance;
        }
    }

    Ok(MatchDecision {
        matched_name: None,
        distance: nearest,
        is_match: false,
        confidence: 1.0 - nearest,
    })
}

/// Compare a probe embedding against exactly one reference embedding.
///
/// The boundary is inclusive: `distance == tolerance` is a match.
/// Reported distance and confidence are rounded to 4 decimal digits;
/// the match decision itself uses the unrounded distance.
pub fn verify(
    probe: &Embedding,
    reference: &Embedding,
    tolerance: f32,
) -> Result<MatchDecision, EmbeddingError> {
    let distance = probe.distance(reference)?;

    Ok(MatchDecision {
        matched_name: None,
        distance: round4(distance),
        is_match: distance <= tolerance,
        confidence: round4(1.0 - distance),
    })
}

fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}
