//! Packaging handler templates into deployable directories.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::error::Error;
use crate::template::{CONFIG_FILE_NAME, HandlerTemplate};

/// A directory holding a rendered handler, removed when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Path of the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Turns a handler template into something a [`Deployer`](crate::Deployer) accepts.
#[async_trait]
pub trait Packager: Send + Sync {
    /// Write the handler source and its configuration, rendered with
    /// `timeout_secs`, into a fresh scratch directory.
    async fn package(
        &self,
        template: &HandlerTemplate,
        timeout_secs: u64,
    ) -> Result<ScratchDir, Error>;
}

/// Packager writing into a uniquely named directory under a root.
#[derive(Debug, Clone, Default)]
pub struct ScratchPackager {
    root: Option<PathBuf>,
}

impl ScratchPackager {
    /// Create scratch directories in the system temp dir.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create scratch directories under `root`.
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[async_trait]
impl Packager for ScratchPackager {
    async fn package(
        &self,
        template: &HandlerTemplate,
        timeout_secs: u64,
    ) -> Result<ScratchDir, Error> {
        let root = self.root.clone().unwrap_or_else(std::env::temp_dir);
        let dir = tempfile::Builder::new()
            .prefix("fnshell-")
            .tempdir_in(&root)
            .map_err(Error::ScratchDir)?;

        tokio::fs::write(dir.path().join(&template.file_name), &template.source)
            .await
            .map_err(Error::ScratchDir)?;
        tokio::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            template.render_config(timeout_secs),
        )
        .await
        .map_err(Error::ScratchDir)?;

        tracing::debug!(path = %dir.path().display(), "packaged handler");
        Ok(ScratchDir { dir })
    }
}
