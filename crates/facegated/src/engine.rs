//! The engine binds the gallery, the embedding oracle, and the asset
//! source into the surface the HTTP layer exposes: identify, verify,
//! refresh, status.

use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use thiserror::Error;

use facegate_core::matcher;
use facegate_core::{
    AssetSource, Embedding, EmbeddingError, EmbeddingOracle, Gallery, GalleryStatus, MatchDecision,
    OracleError, SourceError,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Assets(#[from] SourceError),
    /// Probe and gallery embeddings disagreed on length. The oracle
    /// broke its fixed-length contract; the request fails, the process
    /// does not.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Result of identification. A probe without a detectable face is a
/// normal outcome, not an error.
pub enum IdentifyOutcome {
    NoFace,
    Decision(MatchDecision),
}

/// Result of verification. The two no-face cases are distinguished so
/// callers can tell the user which photo to retake.
pub enum VerifyOutcome {
    NoFaceInEnrolled,
    NoFaceInCheckin,
    Decision(MatchDecision),
}

pub struct FaceEngine {
    gallery: Gallery,
    oracle: Arc<dyn EmbeddingOracle>,
    assets: Arc<dyn AssetSource>,
    identify_tolerance: f32,
    verify_tolerance: f32,
    asset_folder: String,
    oracle_timeout: Duration,
}

impl FaceEngine {
    pub fn new(
        oracle: Arc<dyn EmbeddingOracle>,
        assets: Arc<dyn AssetSource>,
        identify_tolerance: f32,
        verify_tolerance: f32,
        asset_folder: String,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            gallery: Gallery::new(),
            oracle,
            assets,
            identify_tolerance,
            verify_tolerance,
            asset_folder,
            oracle_timeout,
        }
    }

    /// Oracle call under the configured timeout, so a hung embedding
    /// service cannot wedge a request.
    async fn extract(&self, image: &RgbImage) -> Result<Vec<Embedding>, OracleError> {
        match tokio::time::timeout(self.oracle_timeout, self.oracle.extract(image)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.oracle_timeout.as_secs())),
        }
    }

    /// First embedding in extraction order, or `None` when the image
    /// contains no detectable face.
    async fn first_embedding(&self, image: &RgbImage) -> Result<Option<Embedding>, OracleError> {
        Ok(self.extract(image).await?.into_iter().next())
    }

    /// Match one probe photo against the whole gallery.
    pub async fn identify(&self, probe: &RgbImage) -> Result<IdentifyOutcome, EngineError> {
        let Some(embedding) = self.first_embedding(probe).await? else {
            return Ok(IdentifyOutcome::NoFace);
        };

        let snapshot = self.gallery.current();
        tracing::debug!(gallery = snapshot.len(), "matching probe against gallery");
        let decision = matcher::identify(&embedding, &snapshot, self.identify_tolerance)?;
        Ok(IdentifyOutcome::Decision(decision))
    }

    /// Compare an enrolled photo against a check-in photo.
    pub async fn verify(
        &self,
        enrolled: &RgbImage,
        checkin: &RgbImage,
    ) -> Result<VerifyOutcome, EngineError> {
        let Some(enrolled_embedding) = self.first_embedding(enrolled).await? else {
            return Ok(VerifyOutcome::NoFaceInEnrolled);
        };
        let Some(checkin_embedding) = self.first_embedding(checkin).await? else {
            return Ok(VerifyOutcome::NoFaceInCheckin);
        };

        let decision =
            matcher::verify(&checkin_embedding, &enrolled_embedding, self.verify_tolerance)?;
        tracing::info!(
            is_match = decision.is_match,
            distance = decision.distance,
            confidence = decision.confidence,
            "verification complete"
        );
        Ok(VerifyOutcome::Decision(decision))
    }

    /// Re-enumerate the asset folder and rebuild the gallery.
    ///
    /// Enumeration failure aborts this attempt and leaves the active
    /// gallery exactly as it was.
    pub async fn refresh_gallery(&self) -> Result<usize, EngineError> {
        tracing::info!(folder = %self.asset_folder, "gallery refresh requested");
        let assets = match self.assets.list_assets(&self.asset_folder).await {
            Ok(assets) => assets,
            Err(err) => {
                self.gallery.record_failure(&err.to_string());
                return Err(err.into());
            }
        };

        Ok(self.gallery.rebuild(assets, self.oracle.as_ref()).await)
    }

    pub fn gallery_status(&self) -> GalleryStatus {
        self.gallery.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use facegate_core::{Asset, RebuildOutcome};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Derives the embedding from the top-left pixel's red channel;
    /// red 0 means "no face".
    struct PixelOracle;

    #[async_trait]
    impl EmbeddingOracle for PixelOracle {
        async fn extract(&self, image: &RgbImage) -> Result<Vec<Embedding>, OracleError> {
            let red = image.get_pixel(0, 0).0[0];
            if red == 0 {
                Ok(Vec::new())
            } else {
                Ok(vec![Embedding::new(vec![red as f32 / 100.0, 0.0])])
            }
        }
    }

    /// Serves a fixed asset list until `fail` is flipped, then errors.
    struct FlakySource {
        assets: Vec<(String, u8)>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl AssetSource for FlakySource {
        async fn list_assets(&self, _folder: &str) -> Result<Vec<Asset>, SourceError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(SourceError::Library("connection refused".into()));
            }
            Ok(self
                .assets
                .iter()
                .map(|(name, red)| Asset {
                    asset_id: format!("members/{name}"),
                    display_name: None,
                    content: png(*red),
                })
                .collect())
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

    fn face(red: u8) -> RgbImage {
        RgbImage::from_pixel(4, 4, image::Rgb([red, 0, 0]))
    }

    fn engine(source: Arc<FlakySource>) -> FaceEngine {
        FaceEngine::new(
            Arc::new(PixelOracle),
            source,
            matcher::DEFAULT_IDENTIFY_TOLERANCE,
            matcher::DEFAULT_VERIFY_TOLERANCE,
            "members".into(),
            Duration::from_secs(5),
        )
    }

    fn members_source() -> Arc<FlakySource> {
        Arc::new(FlakySource {
            assets: vec![("alice".into(), 10), ("bob".into(), 60)],
            fail: AtomicBool::new(false),
        })
    }

    fn seeded_engine() -> FaceEngine {
        engine(members_source())
    }

    #[tokio::test]
    async fn test_identify_matches_enrolled_member() {
        let engine = seeded_engine();
        engine.refresh_gallery().await.unwrap();

        let outcome = engine.identify(&face(12)).await.unwrap();
        let IdentifyOutcome::Decision(decision) = outcome else {
            panic!("expected a decision");
        };
        assert!(decision.is_match);
        assert_eq!(decision.matched_name.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_identify_no_face_is_reported_not_errored() {
        let engine = seeded_engine();
        engine.refresh_gallery().await.unwrap();

        assert!(matches!(
            engine.identify(&face(0)).await.unwrap(),
            IdentifyOutcome::NoFace
        ));
    }

    #[tokio::test]
    async fn test_identify_empty_gallery_is_no_match() {
        let engine = seeded_engine();

        let outcome = engine.identify(&face(12)).await.unwrap();
        let IdentifyOutcome::Decision(decision) = outcome else {
            panic!("expected a decision");
        };
        assert!(!decision.is_match);
        assert_eq!(decision.matched_name, None);
    }

    #[tokio::test]
    async fn test_verify_distinguishes_which_photo_lacked_a_face() {
        let engine = seeded_engine();

        assert!(matches!(
            engine.verify(&face(0), &face(50)).await.unwrap(),
            VerifyOutcome::NoFaceInEnrolled
        ));
        assert!(matches!(
            engine.verify(&face(50), &face(0)).await.unwrap(),
            VerifyOutcome::NoFaceInCheckin
        ));
    }

    #[tokio::test]
    async fn test_verify_same_face_matches() {
        let engine = seeded_engine();

        let outcome = engine.verify(&face(50), &face(50)).await.unwrap();
        let VerifyOutcome::Decision(decision) = outcome else {
            panic!("expected a decision");
        };
        assert!(decision.is_match);
        assert_eq!(decision.distance, 0.0);
        assert_eq!(decision.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_verify_distant_faces_do_not_match() {
        let engine = seeded_engine();

        let outcome = engine.verify(&face(10), &face(90)).await.unwrap();
        let VerifyOutcome::Decision(decision) = outcome else {
            panic!("expected a decision");
        };
        assert!(!decision.is_match);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_gallery_intact() {
        let source = members_source();
        let engine = engine(Arc::clone(&source));

        assert_eq!(engine.refresh_gallery().await.unwrap(), 2);

        source.fail.store(true, Ordering::Relaxed);
        assert!(engine.refresh_gallery().await.is_err());

        let status = engine.gallery_status();
        assert_eq!(status.entry_count, 2, "gallery must survive a failed refresh");
        assert!(matches!(status.last_rebuild, RebuildOutcome::Failed { .. }));

        // The surviving entries still serve identification.
        let outcome = engine.identify(&face(12)).await.unwrap();
        assert!(matches!(outcome, IdentifyOutcome::Decision(d) if d.is_match));
    }
}
