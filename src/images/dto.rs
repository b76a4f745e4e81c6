use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::AsyncRead;

use super::services::mime_from_path;

/// Where the raw upload comes from.
pub enum UploadSource {
    Bytes(Bytes),
    Path(PathBuf),
    /// A stream of unknown length, e.g. a pipe.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            UploadSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            UploadSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// A file handed over by the picker, not yet read.
#[derive(Debug)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub source: UploadSource,
}

impl UploadFile {
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            source: UploadSource::Bytes(body.into()),
        }
    }

    /// Content type is guessed from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            content_type: mime_from_path(path).to_string(),
            source: UploadSource::Path(path.to_path_buf()),
        }
    }

    pub fn from_reader(
        name: impl Into<String>,
        content_type: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            source: UploadSource::Reader(Box::new(reader)),
        }
    }

    /// Size when it is known without reading the payload.
    pub fn known_len(&self) -> Option<u64> {
        match &self.source {
            UploadSource::Bytes(b) => Some(b.len() as u64),
            UploadSource::Path(_) | UploadSource::Reader(_) => None,
        }
    }
}

/// Image after the read step: what the estimator sees and what gets stored.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub content_type: String,
    pub bytes: Bytes,
    pub data_url: String,
}
