//! # reelmix - Random Reel Builder
//!
//! `reelmix` assembles a single video out of short clips taken from two asset
//! pools: any number of "Wall" directories and one "TV" directory. Clips are
//! picked at random, alternating Wall then TV, and never repeat the animal of
//! the clip just before them. Picking stops once the probed durations add up
//! to a minimum length, and the resulting list is rendered with ffmpeg.
//!
//! ## Features
//!
//! - Parallel scan of the asset directory layout
//! - Alternating Wall/TV selection that never repeats an animal back to back
//! - Duration probing through ffprobe
//! - Rendering through ffmpeg with progress reporting
//!
//! ## Example
//!
//! ```no_run
//! use reelmix::{AppConfig, ReelMaker};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig {
//!     asset_root: "input/decorations".into(),
//!     output_file: "output/reel.mp4".into(),
//!     min_duration_secs: 90.0,
//!     ..AppConfig::default()
//! };
//! let maker = ReelMaker::with_config(config)?;
//!
//! let catalog = maker.scan_catalog()?;
//! let mut rng = rand::thread_rng();
//! let sequence = maker.build_sequence(&catalog, &mut rng, |clip| {
//!     println!("picked {} {}", clip.kind, clip.animal);
//! })?;
//!
//! maker.render(&sequence, |event| println!("{:?}", event))?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod clip;
pub mod error;
pub mod probe;
pub mod render;
pub mod sequence;

pub use catalog::{Catalog, CatalogLayout, Category, CategoryKind};
pub use clip::{animal_of, Clip};
pub use error::{ReelError, ReelResult};
pub use probe::{DurationProbe, FfprobeDuration};
pub use render::{FfmpegRenderer, RenderEvent, RenderSink};
pub use sequence::{pick_candidate, Candidate, Sequence, SequenceBuilder};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration.
///
/// Missing fields in a config file fall back to the values of
/// [`AppConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the `TV` and `*Wall*` clip directories
    pub asset_root: PathBuf,
    /// Rendered video destination
    pub output_file: PathBuf,
    /// Picking stops once the sequence is at least this long (seconds)
    pub min_duration_secs: f64,
    /// Name of the single TV directory under the asset root
    pub tv_dir: String,
    /// Substring that marks a directory as a Wall category
    pub wall_marker: String,
    /// ffmpeg executable used for rendering
    pub ffmpeg_path: PathBuf,
    /// ffprobe executable used for duration probing
    pub ffprobe_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("input/'Creepy Crawlies 2' Decorations Collection - Horizontal"),
            output_file: PathBuf::from("output/halloween-video.mp4"),
            min_duration_secs: 60.0,
            tv_dir: "TV".to_string(),
            wall_marker: "Wall".to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl AppConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> ReelResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ReelError::io(path, e))?;
        let config: AppConfig = serde_json::from_str(&text)
            .map_err(|e| ReelError::Config(format!("parsing {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> ReelResult<()> {
        if !self.min_duration_secs.is_finite() || self.min_duration_secs < 0.0 {
            return Err(ReelError::Config(format!(
                "min_duration_secs must be a non-negative number, got {}",
                self.min_duration_secs
            )));
        }
        if self.tv_dir.trim().is_empty() {
            return Err(ReelError::Config("tv_dir cannot be empty".to_string()));
        }
        if self.wall_marker.is_empty() {
            return Err(ReelError::Config("wall_marker cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Directory layout used when scanning the asset root
    pub fn layout(&self) -> CatalogLayout {
        CatalogLayout {
            tv_dir: self.tv_dir.clone(),
            wall_marker: self.wall_marker.clone(),
        }
    }
}

/// Format a duration in seconds as `m:ss`.
///
/// The value is rounded to whole seconds first, so `format_duration(125.0)`
/// is `"2:05"` and `format_duration(59.6)` is `"1:00"`.
pub fn format_duration(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Main entry point tying the catalog, selection and render steps together
pub struct ReelMaker {
    config: AppConfig,
    probe: FfprobeDuration,
    renderer: FfmpegRenderer,
}

impl ReelMaker {
    /// Create a reel maker with default configuration
    pub fn new() -> Self {
        Self::from_valid_config(AppConfig::default())
    }

    /// Create a reel maker with custom configuration
    pub fn with_config(config: AppConfig) -> ReelResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// Load configuration from a file
    pub fn from_config_file(path: &Path) -> ReelResult<Self> {
        let config = AppConfig::from_json_file(path)?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: AppConfig) -> Self {
        let probe = FfprobeDuration::new(&config.ffprobe_path);
        let renderer = FfmpegRenderer::new(&config.ffmpeg_path);
        Self {
            config,
            probe,
            renderer,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Scan the configured asset root
    pub fn scan_catalog(&self) -> ReelResult<Catalog> {
        Catalog::scan_with_layout(&self.config.asset_root, &self.config.layout())
    }

    /// Pick clips until the configured minimum duration is reached.
    ///
    /// `on_pick` is called once per clip, in sequence order, right after its
    /// duration has been probed.
    pub fn build_sequence<R, F>(&self, catalog: &Catalog, rng: &mut R, on_pick: F) -> ReelResult<Sequence>
    where
        R: Rng + ?Sized,
        F: FnMut(&Clip),
    {
        SequenceBuilder::new(catalog, &self.probe).build_with_progress(
            rng,
            self.config.min_duration_secs,
            on_pick,
        )
    }

    /// Render a finished sequence to the configured output file
    pub fn render<F>(&self, sequence: &Sequence, mut on_event: F) -> ReelResult<()>
    where
        F: FnMut(RenderEvent),
    {
        self.renderer
            .render(&sequence.paths(), &self.config.output_file, &mut on_event)
    }
}

impl Default for ReelMaker {
    fn default() -> Self {
        Self::new()
    }
}
