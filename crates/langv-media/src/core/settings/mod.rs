//! Media Side-Channel Settings
//!
//! Tunables for thumbnails, subtitle extraction, playback sync and tool
//! discovery, with:
//! - Serde defaults for every field (old or partial files still load)
//! - Normalization that clamps bad values instead of failing
//! - Atomic file writes (temp file + rename)
//!
//! Storage location: {config_dir}/langv/media-settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::ffmpeg::THUMBNAIL_PRE_SEEK_MS;

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "media-settings.json";

/// Side-channel settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Seek-bar thumbnail settings
    #[serde(default)]
    pub thumbnails: ThumbnailSettings,

    /// Embedded subtitle settings
    #[serde(default)]
    pub subtitles: SubtitleSettings,

    /// Position/hover driver settings
    #[serde(default)]
    pub sync: PlaybackSyncSettings,

    /// External tool discovery
    #[serde(default)]
    pub tools: ToolSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            thumbnails: ThumbnailSettings::default(),
            subtitles: SubtitleSettings::default(),
            sync: PlaybackSyncSettings::default(),
            tools: ToolSettings::default(),
        }
    }
}

impl MediaSettings {
    /// Normalizes and clamps settings so runtime values are always usable.
    ///
    /// Tolerant on purpose: bad values are corrected instead of rejected.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        let t = &mut self.thumbnails;
        t.bucket_interval_ms = t.bucket_interval_ms.clamp(1_000, 600_000);
        t.max_cache_size = t.max_cache_size.clamp(1, 1_000);
        t.width = t.width.clamp(16, 1920);
        t.height = t.height.clamp(16, 1080);
        t.quality = t.quality.clamp(2, 31);
        t.generation_timeout_ms = t.generation_timeout_ms.clamp(500, 60_000);
        t.guard_wait_ms = t.guard_wait_ms.clamp(0, 1_000);
        t.pre_seek_ms = t.pre_seek_ms.clamp(0, 120_000);

        let s = &mut self.subtitles;
        s.extraction_timeout_ms = s.extraction_timeout_ms.clamp(1_000, 600_000);
        s.probe_timeout_ms = s.probe_timeout_ms.clamp(500, 120_000);

        let p = &mut self.sync;
        p.position_tick_ms = p.position_tick_ms.clamp(10, 1_000);
        p.hover_debounce_ms = p.hover_debounce_ms.clamp(0, 2_000);
        p.seek_tolerance_ms = p.seek_tolerance_ms.clamp(100, 30_000);
        p.min_position_change_ms = p.min_position_change_ms.clamp(1, 1_000);

        self.tools.validation_timeout_ms = self.tools.validation_timeout_ms.clamp(250, 30_000);
    }
}

/// Seek-bar thumbnail settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailSettings {
    /// Thumbnails enabled (still requires FFmpeg)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache bucket width in milliseconds
    #[serde(default = "default_bucket_interval_ms")]
    pub bucket_interval_ms: i64,

    /// Maximum number of cached frames per video
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Output raster width
    #[serde(default = "default_thumbnail_width")]
    pub width: u32,

    /// Output raster height
    #[serde(default = "default_thumbnail_height")]
    pub height: u32,

    /// JPEG quality scale for `-q:v`
    #[serde(default = "default_thumbnail_quality")]
    pub quality: u8,

    /// Deadline for one generation (both seek attempts)
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// How long a request waits for the generation guard before giving up
    #[serde(default = "default_guard_wait_ms")]
    pub guard_wait_ms: u64,

    /// Input-side pre-seek margin for combined seeking
    #[serde(default = "default_pre_seek_ms")]
    pub pre_seek_ms: i64,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket_interval_ms: default_bucket_interval_ms(),
            max_cache_size: default_max_cache_size(),
            width: default_thumbnail_width(),
            height: default_thumbnail_height(),
            quality: default_thumbnail_quality(),
            generation_timeout_ms: default_generation_timeout_ms(),
            guard_wait_ms: default_guard_wait_ms(),
            pre_seek_ms: default_pre_seek_ms(),
        }
    }
}

fn default_bucket_interval_ms() -> i64 {
    10_000
}

fn default_max_cache_size() -> usize {
    60
}

fn default_thumbnail_width() -> u32 {
    200
}

fn default_thumbnail_height() -> u32 {
    112
}

fn default_thumbnail_quality() -> u8 {
    5
}

fn default_generation_timeout_ms() -> u64 {
    3_000
}

fn default_guard_wait_ms() -> u64 {
    50
}

fn default_pre_seek_ms() -> i64 {
    THUMBNAIL_PRE_SEEK_MS
}

/// Embedded subtitle settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSettings {
    /// Deadline for demuxing one subtitle stream
    #[serde(default = "default_extraction_timeout_ms")]
    pub extraction_timeout_ms: u64,

    /// Deadline for listing subtitle streams
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            extraction_timeout_ms: default_extraction_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

fn default_extraction_timeout_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

/// Position and hover driver settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSyncSettings {
    /// Subtitle sync tick
    #[serde(default = "default_position_tick_ms")]
    pub position_tick_ms: u64,

    /// Idle time after the last hover move before a thumbnail is requested
    #[serde(default = "default_hover_debounce_ms")]
    pub hover_debounce_ms: u64,

    /// A pending seek clears once playback reports a time this close to it
    #[serde(default = "default_seek_tolerance_ms")]
    pub seek_tolerance_ms: i64,

    /// Position changes smaller than this are ignored by the position driver
    #[serde(default = "default_min_position_change_ms")]
    pub min_position_change_ms: i64,
}

impl Default for PlaybackSyncSettings {
    fn default() -> Self {
        Self {
            position_tick_ms: default_position_tick_ms(),
            hover_debounce_ms: default_hover_debounce_ms(),
            seek_tolerance_ms: default_seek_tolerance_ms(),
            min_position_change_ms: default_min_position_change_ms(),
        }
    }
}

fn default_position_tick_ms() -> u64 {
    100
}

fn default_hover_debounce_ms() -> u64 {
    150
}

fn default_seek_tolerance_ms() -> i64 {
    2_000
}

fn default_min_position_change_ms() -> i64 {
    1
}

/// External tool discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    /// Explicit ffmpeg binary (tried before any search)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ffprobe binary (tried before the ffmpeg sibling)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Deadline for each `-version` validation call
    #[serde(default = "default_validation_timeout_ms")]
    pub validation_timeout_ms: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            validation_timeout_ms: default_validation_timeout_ms(),
        }
    }
}

fn default_validation_timeout_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

/// Default directory for the settings file
pub fn default_settings_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("langv")
}

/// Loads and saves [`MediaSettings`]
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager for the given directory
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: dir.as_ref().join(SETTINGS_FILE),
        }
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> MediaSettings {
        if !self.settings_path.exists() {
            info!("Media settings file not found, using defaults");
            return MediaSettings::default();
        }

        let result = fs::read_to_string(&self.settings_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))
            .and_then(|content| {
                serde_json::from_str::<MediaSettings>(&content)
                    .map_err(|e| format!("Failed to parse settings file: {}", e))
            });

        match result {
            Ok(mut settings) => {
                settings.normalize();
                settings
            }
            Err(e) => {
                warn!("Failed to load media settings, using defaults: {}", e);
                MediaSettings::default()
            }
        }
    }

    /// Save settings using an atomic write (temp file + rename)
    pub fn save(&self, settings: &MediaSettings) -> Result<MediaSettings, String> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let mut normalized = settings.clone();
        normalized.normalize();

        let content = serde_json::to_string_pretty(&normalized)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)
            .map_err(|e| format!("Failed to create temp settings file: {}", e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| format!("Failed to write settings: {}", e))?;
        file.sync_all()
            .map_err(|e| format!("Failed to sync settings file: {}", e))?;
        drop(file);

        if cfg!(windows) && self.settings_path.exists() {
            // rename does not overwrite on Windows
            let _ = fs::remove_file(&self.settings_path);
        }
        fs::rename(&temp_path, &self.settings_path)
            .map_err(|e| format!("Failed to finalize settings file: {}", e))?;

        info!("Media settings saved to {:?}", self.settings_path);
        Ok(normalized)
    }
}
