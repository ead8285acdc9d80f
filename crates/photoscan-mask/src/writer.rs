use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::normalize::normalize;
use crate::walker::{find_files, validate_folder};
use crate::{MaskBackend, MaskError, SourceFileType};

/// Suffix appended to a source path to name its mask.
pub const MASK_SUFFIX: &str = ".mask.png";

/// Path of the mask of a source photograph: the full source path followed by [`MASK_SUFFIX`].
pub fn mask_path_for(path: impl AsRef<Path>) -> PathBuf {
    let mut mask_path = OsString::from(path.as_ref().as_os_str());
    mask_path.push(MASK_SUFFIX);
    PathBuf::from(mask_path)
}

/// Counts of a masking run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskSummary {
    /// Number of masks written.
    pub processed: usize,
    /// Number of files skipped because their mask already existed.
    pub skipped: usize,
}

/// Write the mask of every file with the given backend.
///
/// Files that already have a mask are skipped unless `overwrite` is set; the backend is not
/// invoked for them. A progress line is printed for every file. The first error stops the run.
pub fn create_masks(
    files: &[PathBuf],
    file_type: SourceFileType,
    backend: &mut dyn MaskBackend,
    overwrite: bool,
) -> Result<MaskSummary, MaskError> {
    let total = files.len();
    let mut summary = MaskSummary::default();

    for (i, path) in files.iter().enumerate() {
        let mask_path = mask_path_for(path);
        if !overwrite && mask_path.exists() {
            println!("Skipping {} {}/{}", path.display(), i + 1, total);
            summary.skipped += 1;
            continue;
        }
        println!("{} {}/{}", path.display(), i + 1, total);

        let image = normalize(path, file_type)?;
        let mask = backend.process(image.path())?;
        mask.save(&mask_path)?;
        log::debug!("Wrote {}", mask_path.display());

        summary.processed += 1;
    }

    Ok(summary)
}

/// Mask every photograph of `file_type` under `folder`.
pub fn create_masks_in_folder(
    folder: impl AsRef<Path>,
    file_type: SourceFileType,
    backend: &mut dyn MaskBackend,
    overwrite: bool,
) -> Result<MaskSummary, MaskError> {
    let folder = folder.as_ref();
    validate_folder(folder)?;

    let files = find_files(folder, file_type.extension())?;
    log::info!("Found {} {} files", files.len(), file_type);

    create_masks(&files, file_type, backend, overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_path_for() {
        assert_eq!(
            mask_path_for("shots/DSC_0001.NEF"),
            PathBuf::from("shots/DSC_0001.NEF.mask.png")
        );
        assert_eq!(
            mask_path_for("img.jpg"),
            PathBuf::from("img.jpg.mask.png")
        );
    }
}
