//! Read-only access to bundled content files.

mod error;
mod filesystem;

pub use error::ContentError;
pub use filesystem::FileSystemContent;

use std::io::Read;
use std::path::Path;

/// A store of named content items.
///
/// Paths are relative to the source's root and may not leave it.
pub trait ContentSource {
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, ContentError>;

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, ContentError> {
        let mut buf = Vec::new();
        self.open(path)?
            .read_to_end(&mut buf)
            .map_err(|source| ContentError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(buf)
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ContentError> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| ContentError::NotUtf8(path.to_path_buf()))
    }
}
