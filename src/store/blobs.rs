use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::{model, PortalError};

pub const PUBLIC_PREFIX: &str = "/files";

/// Attachment storage on the local filesystem, served back under
/// [`PUBLIC_PREFIX`].
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` at `path` and returns the URL to store on the record.
    pub async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, PortalError> {
        if !is_contained(path) {
            return Err(PortalError::validation("file", format!("bad attachment path {path:?}")));
        }

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        tracing::info!(path, size = bytes.len(), "attachment stored");
        Ok(format!("{PUBLIC_PREFIX}/{path}"))
    }

    /// Removes an attachment whose record was never saved. Failures are
    /// logged only.
    pub async fn discard(&self, url: &str) {
        let Some(path) = url.strip_prefix(PUBLIC_PREFIX).and_then(|rest| rest.strip_prefix('/')) else {
            tracing::warn!(url, "not an attachment url");
            return;
        };
        if !is_contained(path) {
            tracing::warn!(url, "refusing to discard outside the blob root");
            return;
        }

        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => tracing::info!(path, "orphaned attachment discarded"),
            Err(err) => tracing::warn!(path, error = %err, "could not discard attachment"),
        }
    }
}

fn is_contained(path: &str) -> bool {
    !path.split('/').any(|part| part.is_empty() || part == "." || part == "..")
}

/// `{collection}/{unix_millis}_{filename}` with the filename reduced to a
/// safe character set.
pub fn attachment_path(collection: &str, filename: &str, at: OffsetDateTime) -> String {
    let name: String = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let name = name.trim_start_matches('.');
    let name = if name.is_empty() { "attachment" } else { name };

    format!("{collection}/{}_{name}", model::to_millis(at))
}
