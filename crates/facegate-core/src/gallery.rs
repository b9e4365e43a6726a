//! In-memory gallery of reference embeddings with atomic replacement.
//!
//! Readers take an `Arc` snapshot once per request and never observe a
//! mid-rebuild state: a rebuild accumulates its candidate entries off to
//! the side and swaps the active reference only after the whole source
//! list has been processed. A rebuild that fails leaves the previously
//! active gallery untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::decode;
use crate::oracle::EmbeddingOracle;
use crate::source::Asset;
use crate::types::GalleryEntry;

/// Outcome of the most recent rebuild attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebuildOutcome {
    /// No rebuild has been attempted since startup.
    Never,
    Succeeded {
        count: usize,
        at: DateTime<Utc>,
    },
    Failed {
        reason: String,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct GalleryStatus {
    pub entry_count: usize,
    pub last_rebuild: RebuildOutcome,
}

/// The reference set of known faces.
///
/// The active snapshot reference is the only shared mutable state; all
/// mutation is whole-snapshot replacement. Concurrent rebuilds are each
/// individually atomic and the last writer wins.
pub struct Gallery {
    active: RwLock<Arc<Vec<GalleryEntry>>>,
    last_rebuild: RwLock<RebuildOutcome>,
}

impl Gallery {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(Arc::new(Vec::new())),
            last_rebuild: RwLock::new(RebuildOutcome::Never),
        }
    }

    /// The active snapshot. O(1): clones the `Arc`, never the entries.
    pub fn current(&self) -> Arc<Vec<GalleryEntry>> {
        self.active.read().clone()
    }

    pub fn status(&self) -> GalleryStatus {
        GalleryStatus {
            entry_count: self.active.read().len(),
            last_rebuild: self.last_rebuild.read().clone(),
        }
    }

    /// Record a failed enumeration. The active snapshot is untouched.
    pub fn record_failure(&self, reason: &str) {
        *self.last_rebuild.write() = RebuildOutcome::Failed {
            reason: reason.to_string(),
            at: Utc::now(),
        };
    }

    /// Rebuild the gallery from downloaded assets.
    ///
    /// Assets that cannot be decoded, fail embedding extraction, or
    /// contain no detectable face are skipped with a log line; one bad
    /// photo never aborts the rebuild. The active snapshot is swapped
    /// only after every asset has been processed. Returns the new entry
    /// count; an empty gallery is a valid result.
    pub async fn rebuild(&self, sources: Vec<Asset>, oracle: &dyn EmbeddingOracle) -> usize {
        let mut candidate = Vec::with_capacity(sources.len());

        for asset in sources {
            let image = match decode::decode_rgb(&asset.content) {
                Ok(image) => image,
                Err(err) => {
                    tracing::warn!(asset = %asset.asset_id, error = %err, "skipping undecodable asset");
                    continue;
                }
            };

            let embeddings = match oracle.extract(&image).await {
                Ok(embeddings) => embeddings,
                Err(err) => {
                    tracing::warn!(asset = %asset.asset_id, error = %err, "skipping asset: extraction failed");
                    continue;
                }
            };

            // Multiple faces in one reference photo: take the first in
            // detection order.
            let Some(embedding) = embeddings.into_iter().next() else {
                tracing::info!(asset = %asset.asset_id, "skipping asset: no face detected");
                continue;
            };

            let name = entry_name(&asset);
            tracing::debug!(name = %name, asset = %asset.asset_id, "loaded reference face");
            candidate.push(GalleryEntry { name, embedding });
        }

        let count = candidate.len();
        *self.active.write() = Arc::new(candidate);
        *self.last_rebuild.write() = RebuildOutcome::Succeeded {
            count,
            at: Utc::now(),
        };
        tracing::info!(count, "gallery rebuilt");
        count
    }
}

impl Default for Gallery {
    fn default() -> Self {
        Self::new()
    }
}

/// Display name for an asset: the explicit name when the library
/// supplies one, otherwise the final path segment of the asset id.
fn entry_name(asset: &Asset) -> String {
    match asset.display_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => asset
            .asset_id
            .rsplit('/')
            .next()
            .unwrap_or(&asset.asset_id)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::types::Embedding;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Derives the embedding from the top-left pixel's red channel.
    /// Red 0 means "no face"; red 255 means "extraction fails".
    struct PixelOracle;

    #[async_trait]
    impl EmbeddingOracle for PixelOracle {
        async fn extract(&self, image: &RgbImage) -> Result<Vec<Embedding>, OracleError> {
            let red = image.get_pixel(0, 0).0[0];
            match red {
                0 => Ok(Vec::new()),
                255 => Err(OracleError::Service("backend offline".into())),
                _ => Ok(vec![Embedding::new(vec![red as f32 / 100.0, 0.0])]),
            }
        }
    }

    fn png(red: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([red, 0, 0]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn asset(id: &str, name: Option<&str>, red: u8) -> Asset {
        Asset {
            asset_id: id.to_string(),
            display_name: name.map(str::to_string),
            content: png(red),
        }
    }

    #[tokio::test]
    async fn test_rebuild_skips_faceless_entry() {
        let gallery = Gallery::new();
        let sources = vec![
            asset("members/alice", None, 10),
            asset("members/blank-wall", None, 0),
            asset("members/carol", None, 30),
        ];

        let count = gallery.rebuild(sources, &PixelOracle).await;
        assert_eq!(count, 2);

        let snapshot = gallery.current();
        let names: Vec<&str> = snapshot.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_rebuild_skips_failing_and_undecodable_entries() {
        let gallery = Gallery::new();
        let mut garbage = asset("members/corrupt", None, 10);
        garbage.content = b"not an image".to_vec();
        let sources = vec![
            garbage,
            asset("members/flaky", None, 255),
            asset("members/dave", None, 20),
        ];

        assert_eq!(gallery.rebuild(sources, &PixelOracle).await, 1);
        assert_eq!(gallery.current()[0].name, "dave");
    }

    #[tokio::test]
    async fn test_rebuild_prefers_explicit_display_name() {
        let gallery = Gallery::new();
        let sources = vec![
            asset("members/img-0042", Some("Jane Doe"), 10),
            asset("members/img-0043", Some(""), 10),
        ];

        gallery.rebuild(sources, &PixelOracle).await;
        let snapshot = gallery.current();
        assert_eq!(snapshot[0].name, "Jane Doe");
        assert_eq!(snapshot[1].name, "img-0043");
    }

    #[tokio::test]
    async fn test_empty_source_list_yields_valid_empty_gallery() {
        let gallery = Gallery::new();
        gallery.rebuild(vec![asset("members/alice", None, 10)], &PixelOracle).await;

        assert_eq!(gallery.rebuild(Vec::new(), &PixelOracle).await, 0);
        assert!(gallery.current().is_empty());
        assert!(matches!(
            gallery.status().last_rebuild,
            RebuildOutcome::Succeeded { count: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_record_failure_leaves_snapshot_intact() {
        let gallery = Gallery::new();
        gallery.rebuild(vec![asset("members/alice", None, 10)], &PixelOracle).await;
        let before = gallery.current();

        gallery.record_failure("asset library: connection refused");

        let status = gallery.status();
        assert_eq!(status.entry_count, 1);
        assert!(matches!(status.last_rebuild, RebuildOutcome::Failed { .. }));
        assert!(Arc::ptr_eq(&before, &gallery.current()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_observe_torn_snapshot() {
        let gallery = Arc::new(Gallery::new());
        let stop = Arc::new(AtomicBool::new(false));

        // Alternate between two entries named "a" and three named "b";
        // a torn read would mix names or see a stale length.
        let mut readers = Vec::new();
        for _ in 0..3 {
            let gallery = Arc::clone(&gallery);
            let stop = Arc::clone(&stop);
            readers.push(tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = gallery.current();
                    match snapshot.len() {
                        0 => {}
                        2 => assert!(snapshot.iter().all(|e| e.name == "a")),
                        3 => assert!(snapshot.iter().all(|e| e.name == "b")),
                        n => panic!("torn snapshot of length {n}"),
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        for round in 0..25 {
            let sources = if round % 2 == 0 {
                vec![asset("g/a", Some("a"), 10), asset("g/a2", Some("a"), 20)]
            } else {
                vec![
                    asset("g/b", Some("b"), 10),
                    asset("g/b2", Some("b"), 20),
                    asset("g/b3", Some("b"), 30),
                ]
            };
            gallery.rebuild(sources, &PixelOracle).await;
        }

        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
