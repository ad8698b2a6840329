use std::ffi::OsString;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command as ProcCommand, Stdio};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::error::{ReelError, ReelResult};

/// Lines of ffmpeg stderr kept in a render error
const STDERR_TAIL_LINES: usize = 20;

/// Status updates emitted while a render runs
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// The encoder was started for this many clips
    Started { clips: usize },
    /// Seconds of output written so far
    Progress { elapsed: f64 },
    /// The output file is complete
    Finished,
}

/// Turns an ordered list of clips into one output file
pub trait RenderSink {
    fn render(&self, clips: &[PathBuf], output: &Path, on_event: &mut dyn FnMut(RenderEvent)) -> ReelResult<()>;
}

/// Concatenates clips with ffmpeg's concat demuxer and re-encodes to H.264
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    ffmpeg: PathBuf,
}

impl FfmpegRenderer {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn ffmpeg_cmd(&self) -> &Path {
        &self.ffmpeg
    }
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Temporary concat list, removed when dropped
pub struct ConcatList {
    path: PathBuf,
}

impl ConcatList {
    pub fn write(clips: &[PathBuf]) -> ReelResult<Self> {
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let path = std::env::temp_dir().join(format!("reelmix_concat_{}_{}.txt", std::process::id(), stamp));

        let absolute = clips.iter().map(|c| absolutize(c)).collect::<ReelResult<Vec<_>>>()?;
        fs::write(&path, concat_list(&absolute)).map_err(|e| ReelError::io(&path, e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConcatList {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn absolutize(path: &Path) -> ReelResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| ReelError::io(path, e))?;
    Ok(cwd.join(path))
}

/// Body of a concat demuxer list, one `file '...'` line per clip
pub(crate) fn concat_list(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

pub(crate) fn ffmpeg_args(list: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-y",
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(list.as_os_str().to_os_string());
    for arg in ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-progress", "pipe:1"] {
        args.push(arg.into());
    }
    args.push(output.as_os_str().to_os_string());
    args
}

/// Output position from one `-progress` line, in seconds.
///
/// ffmpeg reports `out_time_us` and, despite the name, `out_time_ms` in
/// microseconds. `N/A` and unrelated keys give `None`.
pub(crate) fn parse_progress_line(line: &str) -> Option<f64> {
    let line = line.trim();
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    let micros: i64 = value.trim().parse().ok()?;
    (micros >= 0).then(|| micros as f64 / 1_000_000.0)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

impl RenderSink for FfmpegRenderer {
    fn render(&self, clips: &[PathBuf], output: &Path, on_event: &mut dyn FnMut(RenderEvent)) -> ReelResult<()> {
        if clips.is_empty() {
            return Err(ReelError::render("no clips to render", None, None));
        }

        let list = ConcatList::write(clips)?;
        let args = ffmpeg_args(list.path(), output);
        debug!("ffmpeg command: {} {:?}", self.ffmpeg.display(), args);

        let mut child = ProcCommand::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelError::render(format!("running {}: {}", self.ffmpeg.display(), e), None, None))?;

        on_event(RenderEvent::Started { clips: clips.len() });

        // Drain stderr on its own thread so a chatty encoder cannot block on a full pipe
        let stderr = child.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf);
            }
            buf
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if let Some(elapsed) = parse_progress_line(&line) {
                    on_event(RenderEvent::Progress { elapsed });
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| ReelError::render(format!("waiting for ffmpeg: {}", e), None, None))?;
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            warn!(code = ?status.code(), "ffmpeg failed");
            return Err(ReelError::render(
                format!("ffmpeg exited with {}", status),
                Some(stderr_tail(&stderr)),
                status.code(),
            ));
        }

        info!(output = %output.display(), clips = clips.len(), "render finished");
        on_event(RenderEvent::Finished);
        Ok(())
    }
}
