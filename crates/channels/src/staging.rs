use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{error::Result, transport::RawMessage};

/// Download-to-temporary-location and cleanup primitives.
///
/// Plugins that rewrite media (watermarking, format conversion) stage the
/// file through this trait; the pipeline guarantees `cleanup` runs exactly
/// once per unit that staged a file, on every exit path.
#[async_trait]
pub trait FileStager: Send + Sync {
    /// Download the media of `message` and return the local path.
    async fn stage(&self, message: &RawMessage) -> Result<PathBuf>;

    /// Remove a previously staged file.
    async fn cleanup(&self, path: &Path) -> Result<()>;
}

/// Stager for deployments that never rewrite media. `stage` is an error,
/// `cleanup` a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStager;

#[async_trait]
impl FileStager for NoopStager {
    async fn stage(&self, message: &RawMessage) -> Result<PathBuf> {
        Err(crate::Error::External {
            context: format!("stage media for message {}", message.id),
            source: "file staging is not configured".into(),
        })
    }

    async fn cleanup(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
