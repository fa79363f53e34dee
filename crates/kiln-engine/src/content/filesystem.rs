use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use super::{ContentError, ContentSource};

/// Content rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSystemContent {
    root: PathBuf,
}

impl FileSystemContent {
    /// Roots content at `root`, creating the directory if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(ContentError::EmptyRoot);
        }

        fs::create_dir_all(&root).map_err(|source| ContentError::Io {
            path: root.clone(),
            source,
        })?;

        log::debug!("content root: {}", root.display());
        Ok(Self { root })
    }

    /// Roots content at `dir` next to the running executable.
    pub fn beside_executable(dir: impl AsRef<Path>) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(ContentError::EmptyRoot);
        }

        let exe = std::env::current_exe().map_err(ContentError::NoExecutable)?;
        let base = exe.parent().ok_or_else(|| {
            ContentError::NoExecutable(io::Error::new(
                io::ErrorKind::NotFound,
                "executable has no parent directory",
            ))
        })?;
        Self::new(base.join(dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a content path to a file path under the root.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, ContentError> {
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ContentError::OutsideRoot(path.to_path_buf()));
                }
            }
        }
        Ok(resolved)
    }
}

impl ContentSource for FileSystemContent {
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, ContentError> {
        let file_path = self.resolve(path)?;
        match File::open(&file_path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ContentError::NotFound(path.to_path_buf()))
            }
            Err(source) => Err(ContentError::Io {
                path: file_path,
                source,
            }),
        }
    }
}
