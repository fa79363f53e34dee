use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content root must not be empty")]
    EmptyRoot,

    #[error("{} is outside the content root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("content not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not valid UTF-8", .0.display())]
    NotUtf8(PathBuf),

    #[error("cannot locate the running executable")]
    NoExecutable(#[source] io::Error),

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
