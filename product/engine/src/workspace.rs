use crate::download::DISPLAY_PREFIX;
use crate::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MANIFEST_FILE: &str = "manifest.csv";

/// Output location of one request. Display paths are relative to [`root`].
///
/// A scoped workspace is a private temporary directory removed when the
/// value is dropped. A fixed workspace reuses one directory and clears it on
/// creation; two requests sharing it at the same time will clobber each
/// other.
///
/// [`root`]: RequestWorkspace::root
#[derive(Debug)]
pub enum RequestWorkspace {
    Scoped(TempDir),
    Fixed(PathBuf),
}

impl RequestWorkspace {
    /// Creates a private directory under `parent`, or the system temp dir.
    pub fn scoped(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("imgscout-");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        std::fs::create_dir_all(dir.path().join(DISPLAY_PREFIX))?;
        Ok(Self::Scoped(dir))
    }

    /// Uses `root`, deleting any downloads left by a previous request.
    pub fn fixed(root: PathBuf) -> Result<Self> {
        let downloads = root.join(DISPLAY_PREFIX);
        if downloads.exists() {
            std::fs::remove_dir_all(&downloads)?;
        }
        std::fs::create_dir_all(&downloads)?;
        let manifest = root.join(MANIFEST_FILE);
        if manifest.exists() {
            std::fs::remove_file(manifest)?;
        }
        Ok(Self::Fixed(root))
    }

    pub fn root(&self) -> &Path {
        match self {
            Self::Scoped(dir) => dir.path(),
            Self::Fixed(root) => root,
        }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root().join(DISPLAY_PREFIX)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join(MANIFEST_FILE)
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, Self::Scoped(_))
    }
}
