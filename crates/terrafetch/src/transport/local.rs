//! Local filesystem reads.

use crate::{
    content::{Content, infer_from_extension},
    error::{Error, Result},
};

/// Read the whole file at `path`.
///
/// Existence is checked here, at fetch time; a file that disappeared since
/// the reference was resolved is reported as unavailable.
pub(crate) async fn read_local(path: &str) -> Result<Content> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::resource_unavailable(path, format!("cannot open \"{path}\": {e}")))?;

    tracing::debug!(path, bytes = data.len(), "read local file");
    Ok(Content::new(infer_from_extension(path), data))
}
