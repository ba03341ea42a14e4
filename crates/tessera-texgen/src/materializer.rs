//! Result materializer: downloads a job's images into a local folder and
//! classifies them into a `TextureMaps` set.

use crate::scheduler::{CancelToken, TaskContext};
use crate::service::TextureService;
use crate::workspace;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{ContentHash, MapKind, Result, TesseraError, TextureEntry, TextureMaps};

/// A download in progress. Bytes go to `<name>.part`; the file only takes
/// its final name on `commit`. Dropping an uncommitted guard removes it.
struct PartialFile {
    part: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(target: &Path) -> Self {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        Self {
            part: target.with_file_name(name),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    fn commit(mut self) -> Result<PathBuf> {
        if self.target.exists() {
            std::fs::remove_file(&self.target)?;
        }
        std::fs::rename(&self.part, &self.target)?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.part);
        }
    }
}

/// Last path segment of a URL, without query or fragment
pub fn filename_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Blocking download of one URL to `dest`. Checks the cancel token before
/// and after the transfer.
pub fn download_to(
    service: &dyn TextureService,
    url: &str,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<ContentHash> {
    if cancel.is_cancelled() {
        return Err(TesseraError::Cancelled);
    }

    let partial = PartialFile::new(dest);
    {
        let file = File::create(&partial.part)?;
        let mut writer = BufWriter::new(file);
        service.download(url, &mut writer)?;
        writer.flush()?;
    }

    if cancel.is_cancelled() {
        return Err(TesseraError::Cancelled);
    }

    let hash = ContentHash::from_file(&partial.part)?;
    partial.commit()?;
    Ok(hash)
}

/// Download every result URL into `dir` and classify the files.
///
/// Files download one at a time. A failed download is logged and skipped,
/// so its map kind stays absent; cancellation aborts the whole set.
/// `on_file` runs on the host thread after each successful file.
pub async fn materialize(
    ctx: &TaskContext,
    service: Arc<dyn TextureService>,
    urls: &[String],
    dir: &Path,
    mut on_file: impl FnMut(&Path),
) -> Result<TextureMaps> {
    let target = dir.to_path_buf();
    ctx.blocking(move || workspace::prepare_dir(&target)).await?;

    let mut maps = TextureMaps::new();
    for url in urls {
        let Some(filename) = filename_from_url(url) else {
            tracing::warn!(url = %url, "Result URL has no file name; skipping");
            continue;
        };
        let dest = dir.join(filename);
        let kind = MapKind::from_filename(filename);

        let service = Arc::clone(&service);
        let cancel = ctx.cancel_token();
        let url_owned = url.clone();
        let dest_owned = dest.clone();
        let result = ctx
            .blocking(move || download_to(service.as_ref(), &url_owned, &dest_owned, &cancel))
            .await;

        match result {
            Ok(hash) => {
                tracing::info!(file = %dest.display(), kind = ?kind, "Downloaded result");
                on_file(&dest);
                if let Some(kind) = kind {
                    maps.insert(
                        kind,
                        TextureEntry {
                            path: dest,
                            content_hash: Some(hash),
                        },
                    );
                }
            }
            Err(TesseraError::Cancelled) => return Err(TesseraError::Cancelled),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Result download failed");
            }
        }
    }

    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockService;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tessera_mat_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://cdn.example.com/a/b/abc_albedo.jpg?sig=1"),
            Some("abc_albedo.jpg")
        );
        assert_eq!(filename_from_url("https://cdn.example.com/"), None);
        assert_eq!(filename_from_url("normal.jpg"), Some("normal.jpg"));
    }

    #[test]
    fn test_download_to_commits_and_hashes() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let service = MockService::new();
        let dest = dir.join("x_albedo.jpg");

        let hash = download_to(&service, "mock://x_albedo.jpg", &dest, &CancelToken::new()).unwrap();
        assert!(dest.is_file());
        assert!(!dir.join("x_albedo.jpg.part").exists());
        assert_eq!(hash, ContentHash::from_file(&dest).unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let service = MockService::new().with_download_status(500);
        let dest = dir.join("x_normal.jpg");

        let result = download_to(&service, "mock://x_normal.jpg", &dest, &CancelToken::new());
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dir.join("x_normal.jpg.part").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cancelled_download_is_not_started() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let result = download_to(&MockService::new(), "mock://a_albedo.jpg", &dir.join("a_albedo.jpg"), &token);
        assert!(matches!(result, Err(TesseraError::Cancelled)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
