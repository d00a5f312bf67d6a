//! Handing a finished file to the user.
//!
//! A native share is attempted first. When sharing is unavailable, is
//! cancelled, or fails, the file is downloaded instead. A cancelled share is
//! not an error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use vivitag_common::error::{VivitagError, VivitagResult};
use vivitag_render_engine::DeliverableFile;

/// Result of a share attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Cancelled,
    Unavailable,
}

/// A platform share sheet or similar handoff.
#[async_trait]
pub trait ShareTarget: Send + Sync {
    /// Whether this file can be shared at all.
    async fn can_share(&self, file: &DeliverableFile) -> bool;

    async fn share(&self, file: &DeliverableFile) -> VivitagResult<ShareOutcome>;
}

/// Direct save of a file.
pub trait DownloadTarget: Send + Sync {
    /// Save the file and return where it went.
    fn download(&self, file: &DeliverableFile) -> VivitagResult<PathBuf>;
}

/// Share target for hosts without a share sheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShare;

#[async_trait]
impl ShareTarget for NoShare {
    async fn can_share(&self, _file: &DeliverableFile) -> bool {
        false
    }

    async fn share(&self, _file: &DeliverableFile) -> VivitagResult<ShareOutcome> {
        Ok(ShareOutcome::Unavailable)
    }
}

/// Saves files into a directory, never overwriting an existing file.
#[derive(Debug, Clone)]
pub struct DirectoryDownload {
    dir: PathBuf,
}

impl DirectoryDownload {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadTarget for DirectoryDownload {
    fn download(&self, file: &DeliverableFile) -> VivitagResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = available_path(&self.dir, &file.file_name);
        std::fs::write(&path, &file.bytes)?;
        tracing::info!(path = %path.display(), bytes = file.len(), "Saved file");
        Ok(path)
    }
}

/// `name.ext`, then `name (1).ext`, `name (2).ext`, ... until one is free.
fn available_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Where a file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Delivery {
    Shared,
    Downloaded { path: PathBuf },
}

/// The pair of targets a file is delivered through.
pub struct DeliveryTargets {
    pub share: Box<dyn ShareTarget>,
    pub download: Box<dyn DownloadTarget>,
}

impl DeliveryTargets {
    pub fn new(share: Box<dyn ShareTarget>, download: Box<dyn DownloadTarget>) -> Self {
        Self { share, download }
    }

    /// Download-only delivery into a directory.
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(NoShare), Box::new(DirectoryDownload::new(dir)))
    }
}

/// Share the file, falling back to a download.
pub async fn deliver(file: &DeliverableFile, targets: &DeliveryTargets) -> VivitagResult<Delivery> {
    if targets.share.can_share(file).await {
        match targets.share.share(file).await {
            Ok(ShareOutcome::Shared) => {
                tracing::info!(file = %file.file_name, "Shared file");
                return Ok(Delivery::Shared);
            }
            Ok(outcome) => {
                tracing::info!(file = %file.file_name, ?outcome, "Share not completed");
            }
            Err(e) => {
                tracing::warn!(file = %file.file_name, error = %e, "Share failed");
            }
        }
    }

    let path = targets
        .download
        .download(file)
        .map_err(|e| VivitagError::delivery(format!("Failed to save {}: {e}", file.file_name)))?;
    Ok(Delivery::Downloaded { path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeShare {
        available: bool,
        outcome: ShareOutcome,
    }

    #[async_trait]
    impl ShareTarget for FakeShare {
        async fn can_share(&self, _file: &DeliverableFile) -> bool {
            self.available
        }

        async fn share(&self, _file: &DeliverableFile) -> VivitagResult<ShareOutcome> {
            Ok(self.outcome)
        }
    }

    #[derive(Default)]
    struct RecordingDownload {
        saved: Mutex<Vec<String>>,
    }

    impl DownloadTarget for RecordingDownload {
        fn download(&self, file: &DeliverableFile) -> VivitagResult<PathBuf> {
            if let Ok(mut saved) = self.saved.lock() {
                saved.push(file.file_name.clone());
            }
            Ok(PathBuf::from("/downloads").join(&file.file_name))
        }
    }

    fn clip() -> DeliverableFile {
        DeliverableFile::new("vivitag-clip-a.mp4", "video/mp4", vec![1, 2, 3])
    }

    fn targets(available: bool, outcome: ShareOutcome) -> DeliveryTargets {
        DeliveryTargets::new(
            Box::new(FakeShare { available, outcome }),
            Box::new(RecordingDownload::default()),
        )
    }

    #[tokio::test]
    async fn test_successful_share_skips_download() {
        let delivery = deliver(&clip(), &targets(true, ShareOutcome::Shared))
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Shared);
    }

    #[tokio::test]
    async fn test_cancelled_share_falls_back_to_download() {
        let delivery = deliver(&clip(), &targets(true, ShareOutcome::Cancelled))
            .await
            .unwrap();
        assert_eq!(
            delivery,
            Delivery::Downloaded {
                path: PathBuf::from("/downloads/vivitag-clip-a.mp4")
            }
        );
    }

    #[tokio::test]
    async fn test_unavailable_share_downloads() {
        let delivery = deliver(&clip(), &targets(false, ShareOutcome::Shared))
            .await
            .unwrap();
        assert!(matches!(delivery, Delivery::Downloaded { .. }));
    }

    #[tokio::test]
    async fn test_directory_download_never_overwrites() {
        let dir = std::env::temp_dir().join(format!("vivitag-dl-{}", uuid::Uuid::new_v4()));
        let targets = DeliveryTargets::directory(&dir);

        let first = deliver(&clip(), &targets).await.unwrap();
        let second = deliver(&clip(), &targets).await.unwrap();
        assert_eq!(
            first,
            Delivery::Downloaded {
                path: dir.join("vivitag-clip-a.mp4")
            }
        );
        assert_eq!(
            second,
            Delivery::Downloaded {
                path: dir.join("vivitag-clip-a (1).mp4")
            }
        );
        assert_eq!(std::fs::read(dir.join("vivitag-clip-a (1).mp4")).unwrap(), vec![1, 2, 3]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
