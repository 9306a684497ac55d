// Dataset Directory Helpers
// Listing of dataset folders and sample manifests

use super::filename_patterns::is_image_file;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default CASIA v2.0 working subdirectories for manifests.
pub const SAMPLE_SUBDIRS: [&str; 4] = ["Au_additional", "Au_sample", "Sp_additional", "Sp_sample"];

/// Sorted names of the image files directly inside `dir`.
pub fn list_image_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| is_image_file(name))
        .collect();
    names.sort();
    Ok(names)
}

/// Sorted full paths of the image files directly inside `dir`.
pub fn list_image_paths(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(list_image_files(dir)?
        .into_iter()
        .map(|name| dir.join(name))
        .collect())
}

/// Write `<base_dir>/<subdir>.txt` listing every file in each existing subdirectory.
/// Missing subdirectories are skipped. Returns the manifests written.
pub fn write_listing(base_dir: &Path, subdirs: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for subdir in subdirs {
        let dir_path = base_dir.join(subdir);
        if !dir_path.is_dir() {
            continue;
        }

        let mut names: Vec<String> = fs::read_dir(&dir_path)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        let manifest = base_dir.join(format!("{}.txt", subdir));
        let mut out = fs::File::create(&manifest)?;
        for name in &names {
            writeln!(out, "{}", name)?;
        }
        info!("Listed {} files from {} into {}", names.len(), dir_path.display(), manifest.display());
        written.push(manifest);
    }

    Ok(written)
}
