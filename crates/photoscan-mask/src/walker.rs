use std::path::{Path, PathBuf};

use crate::MaskError;

/// Check that the input folder exists and is a directory.
pub fn validate_folder(folder: impl AsRef<Path>) -> Result<(), MaskError> {
    let folder = folder.as_ref();
    if !folder.exists() {
        return Err(MaskError::FolderNotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(MaskError::NotADirectory(folder.to_path_buf()));
    }
    Ok(())
}

/// Recursively collect the files under `root` whose name ends with `suffix`.
///
/// The comparison ignores ASCII case, so `.jpg` also matches `IMG_0001.JPG`. The paths are
/// sorted so that the progress indices are stable between runs.
pub fn find_files(root: impl AsRef<Path>, suffix: &str) -> Result<Vec<PathBuf>, MaskError> {
    let suffix = suffix.to_ascii_lowercase();

    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(root.as_ref()) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
        if name.ends_with(&suffix) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    log::debug!(
        "Found {} files ending with {} under {}",
        paths.len(),
        suffix,
        root.as_ref().display()
    );

    Ok(paths)
}
