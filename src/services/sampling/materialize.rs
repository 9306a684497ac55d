// Materialization
// Copies or moves a finished selection from the source to the destination directory

use super::SamplingError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    Copy,
    Move,
}

impl TransferMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferMode::Copy => "copy",
            TransferMode::Move => "move",
        }
    }
}

/// Transfer `selected` from `source_dir` to `dest_dir`, creating `dest_dir` if needed.
///
/// Every source file is checked before anything is transferred; a missing file
/// aborts the run with no output. In `Move` mode the source directory is
/// depleted, so sampling the same source again draws from the remaining files
/// only. Callers that need repeatable pools must copy instead.
///
/// Concurrent changes to `source_dir` after the existence check are not guarded against.
pub fn materialize(
    selected: &[String],
    source_dir: &Path,
    dest_dir: &Path,
    mode: TransferMode,
) -> Result<usize, SamplingError> {
    for name in selected {
        let src = source_dir.join(name);
        if !src.is_file() {
            return Err(SamplingError::MissingSource(src));
        }
    }

    fs::create_dir_all(dest_dir)?;

    for name in selected {
        let src = source_dir.join(name);
        let dst = dest_dir.join(name);
        match mode {
            TransferMode::Copy => {
                fs::copy(&src, &dst)?;
            }
            TransferMode::Move => move_file(&src, &dst)?,
        }
    }

    info!(
        "[SAMPLING] {} {} files {} -> {}",
        mode.as_str(),
        selected.len(),
        source_dir.display(),
        dest_dir.display()
    );
    Ok(selected.len())
}

fn move_file(src: &Path, dst: &Path) -> Result<(), SamplingError> {
    if let Err(e) = fs::rename(src, dst) {
        // rename cannot cross filesystems
        warn!("rename {} failed ({}), falling back to copy+remove", src.display(), e);
        fs::copy(src, dst)?;
        fs::remove_file(src)?;
    }
    Ok(())
}
