use std::path::Path;

use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("remote documents are not supported yet: {0}")]
    RemoteUnsupported(String),
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Whether `identifier` names a remote document rather than a local file.
pub fn is_remote(identifier: &str) -> bool {
    identifier.starts_with("http://") || identifier.starts_with("https://")
}

/// Read a document by local path. URLs are recognised but not fetched.
pub fn load(identifier: &str) -> Result<String, LoadError> {
    if is_remote(identifier) {
        debug!(url = identifier, "refusing remote document");
        return Err(LoadError::RemoteUnsupported(identifier.to_string()));
    }
    load_file(Path::new(identifier))
}

pub fn load_file(path: &Path) -> Result<String, LoadError> {
    info!(path = %path.display(), "loading markdown from file");
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}
