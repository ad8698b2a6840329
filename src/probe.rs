use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command as ProcCommand;
use tracing::debug;

use crate::error::{ReelError, ReelResult};

/// Source of clip durations.
///
/// Probes are called one clip at a time and must return the playback length
/// in seconds.
pub trait DurationProbe {
    fn probe(&self, path: &Path) -> ReelResult<f64>;
}

impl<F> DurationProbe for F
where
    F: Fn(&Path) -> ReelResult<f64>,
{
    fn probe(&self, path: &Path) -> ReelResult<f64> {
        self(path)
    }
}

/// Reads the container duration with `ffprobe`
#[derive(Debug, Clone)]
pub struct FfprobeDuration {
    ffprobe: PathBuf,
}

impl FfprobeDuration {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }

    pub fn ffprobe_cmd(&self) -> &Path {
        &self.ffprobe
    }
}

impl Default for FfprobeDuration {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

pub(crate) fn ffprobe_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_os_string());
    args
}

/// Parse the single `duration` value ffprobe prints
pub(crate) fn parse_duration_output(input: &Path, stdout: &str) -> ReelResult<f64> {
    let value = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| ReelError::probe(input, "ffprobe printed no duration"))?;

    let seconds: f64 = value
        .parse()
        .map_err(|_| ReelError::probe(input, format!("unparsable duration '{}'", value)))?;

    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ReelError::probe(input, format!("unusable duration {}", seconds)));
    }
    Ok(seconds)
}

impl DurationProbe for FfprobeDuration {
    fn probe(&self, path: &Path) -> ReelResult<f64> {
        let output = ProcCommand::new(&self.ffprobe)
            .args(ffprobe_args(path))
            .output()
            .map_err(|e| ReelError::probe(path, format!("running {}: {}", self.ffprobe.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::probe(
                path,
                format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let seconds = parse_duration_output(path, &stdout)?;
        debug!(path = %path.display(), seconds, "probed clip");
        Ok(seconds)
    }
}
