//! Local working directory for exports and downloaded results

use std::path::{Path, PathBuf};
use tessera_core::{Result, TesseraError};

const UNTITLED: &str = "Untitled";

/// Directory holding exported meshes and result folders.
///
/// Lives beside the project file when there is one, otherwise on the
/// desktop, falling back to the home directory.
pub fn work_dir(project: Option<&Path>, subdirectory: &str) -> PathBuf {
    let base = project
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(dirs::desktop_dir)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(subdirectory)
}

/// Name for an uploaded mesh when the user gave none
pub fn default_asset_name(input: &str, project: Option<&Path>) -> String {
    let trimmed = input.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    project
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Make free text usable as one path component
pub fn sanitize_component(text: &str) -> String {
    let cleaned: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Folder for one job's results: `<work_dir>/<prompt>/<seed>`
pub fn result_dir(work_dir: &Path, prompt: &str, seed: u64) -> PathBuf {
    work_dir.join(sanitize_component(prompt)).join(seed.to_string())
}

/// Create `dir` if needed. Succeeds if it already exists.
pub fn prepare_dir(dir: &Path) -> Result<()> {
    if dir.is_file() {
        return Err(TesseraError::DownloadError(format!(
            "{} exists and is not a directory",
            dir.display()
        )));
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
