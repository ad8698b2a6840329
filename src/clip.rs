use std::path::{Path, PathBuf};

use crate::catalog::CategoryKind;
use crate::error::{ReelError, ReelResult};

/// A picked clip with its probed duration
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub path: PathBuf,
    pub kind: CategoryKind,
    /// Lowercase animal token from the file name
    pub animal: String,
    /// Playback length in seconds
    pub duration: f64,
}

/// Extract the animal token from a clip file name.
///
/// The name is split on `_` and the second segment, lowercased, is the
/// animal: `clip_Fox_01.mp4` gives `fox`. When given a path only the final
/// component is used.
pub fn animal_of(file_name: &str) -> ReelResult<String> {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);

    match base.split('_').nth(1) {
        Some(token) if !token.is_empty() => Ok(token.to_lowercase()),
        _ => Err(ReelError::MalformedFilename(base.to_string())),
    }
}
