use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;
use serde::de::{self, Deserializer, Unexpected};

use crate::error::{Error, Result};
use crate::processing::layout::Corner;

/// Which images are eligible for display, judged by their shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectFilter {
    #[default]
    Any,
    Landscape,
    Portrait,
    /// Follow the orientation of the monitor. The presenter resolves this to
    /// `Landscape` or `Portrait` before anything is rendered.
    MatchMonitor,
}

impl AspectFilter {
    /// Parses the first letter of `raw` (`a`, `l`, `p`, `m`). Anything else
    /// falls back to `Any`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('l') => Self::Landscape,
            Some('p') => Self::Portrait,
            Some('m') => Self::MatchMonitor,
            _ => Self::Any,
        }
    }

    /// Orientation of a surface of the given size; square counts as landscape.
    pub fn for_surface(width: u32, height: u32) -> Self {
        if width >= height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }

    pub fn accepts(self, width: u32, height: u32) -> bool {
        match self {
            Self::Any | Self::MatchMonitor => true,
            Self::Landscape => width >= height,
            Self::Portrait => height >= width,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::MatchMonitor => "monitor",
        }
    }
}

impl fmt::Display for AspectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AspectFilter {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A daily time-of-day range during which images may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindow {
    #[serde(default, deserialize_with = "deserialize_time_of_day")]
    pub start: Option<NaiveTime>,
    #[serde(default, deserialize_with = "deserialize_time_of_day")]
    pub end: Option<NaiveTime>,
}

impl TimeWindow {
    /// Start is inclusive, end exclusive. A missing start means midnight, a
    /// missing end means the end of the day; `start > end` wraps past midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let start = self.start.unwrap_or(NaiveTime::MIN);
        match self.end {
            None => time >= start,
            Some(end) if start <= end => time >= start && time < end,
            Some(end) => time >= start || time < end,
        }
    }
}

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw.trim(), fmt).ok())
}

fn deserialize_time_of_day<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| {
        parse_time_of_day(&value).ok_or_else(|| {
            de::Error::invalid_value(Unexpected::Str(&value), &"a time of day like 07:30")
        })
    })
    .transpose()
}

/// Display policy for a scope (global or per image).
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageDisplayOptions {
    /// Stretch one axis to the window and crop the other instead of
    /// letterboxing.
    #[serde(rename = "stretch")]
    pub fit_aspect_axis_to_window: bool,
    #[serde(rename = "aspect")]
    pub only_aspect: AspectFilter,
    #[serde(rename = "times")]
    pub time_windows: Vec<TimeWindow>,
}

impl ImageDisplayOptions {
    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        self.time_windows.is_empty() || self.time_windows.iter().any(|w| w.contains(time))
    }
}

/// RGB color written as `#RRGGBB` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayColor(pub [u8; 3]);

impl OverlayColor {
    pub const WHITE: Self = Self([255, 255, 255]);

    pub fn parse_hex(raw: &str) -> Option<Self> {
        let digits = raw.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |idx: usize| u8::from_str_radix(&digits[idx..idx + 2], 16).ok();
        Some(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl Default for OverlayColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl<'de> Deserialize<'de> for OverlayColor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse_hex(&raw)
            .ok_or_else(|| de::Error::invalid_value(Unexpected::Str(&raw), &"a color like #FFAA00"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackOrder {
    #[default]
    Shuffle,
    Sorted,
}

/// One image source: a directory tree, or a list file naming the images.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LibraryEntry {
    /// Root directory to scan for images.
    pub path: PathBuf,
    /// Text file with one image path per line, read instead of scanning
    /// `path`. Relative lines resolve against the list's own directory.
    pub image_list: Option<PathBuf>,
    /// Descend into subdirectories.
    pub recursive: bool,
    pub order: PlaybackOrder,
    /// While this entry is inside its time windows, entries without the flag
    /// contribute nothing.
    pub exclusive: bool,
    /// Replaces the base `stretch` for images from this entry.
    pub stretch: Option<bool>,
    /// The entry only contributes images inside these windows.
    pub times: Vec<TimeWindow>,
}

impl LibraryEntry {
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        self.times.is_empty() || self.times.iter().any(|w| w.contains(time))
    }

    /// Layers this entry's overrides onto `options`.
    pub fn apply_to(&self, options: &mut ImageDisplayOptions) {
        if let Some(stretch) = self.stretch {
            options.fit_aspect_axis_to_window = stretch;
        }
        if !self.times.is_empty() {
            options.time_windows = self.times.clone();
        }
    }

    pub fn describe(&self) -> String {
        match &self.image_list {
            Some(list) => format!("list {}", list.display()),
            None => self.path.display().to_string(),
        }
    }
}

impl Default for LibraryEntry {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            image_list: None,
            recursive: true,
            order: PlaybackOrder::default(),
            exclusive: false,
            stretch: None,
            times: Vec::new(),
        }
    }
}

/// Overrides read from an `options.json` placed beside the images. Keys
/// outside this set are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FolderOptions {
    pub stretch: Option<bool>,
    /// Narrows the requested aspect for images in this folder.
    pub aspect: Option<AspectFilter>,
    pub times: Vec<TimeWindow>,
}

impl FolderOptions {
    pub const FILE_NAME: &'static str = "options.json";

    /// Reads `dir/options.json`; a missing file is `Ok(None)`.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let data = match std::fs::read(dir.join(Self::FILE_NAME)) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        self.times.is_empty() || self.times.iter().any(|w| w.contains(time))
    }

    pub fn accepts(&self, width: u32, height: u32) -> bool {
        self.aspect.is_none_or(|aspect| aspect.accepts(width, height))
    }

    pub fn apply_to(&self, options: &mut ImageDisplayOptions) {
        if let Some(stretch) = self.stretch {
            options.fit_aspect_axis_to_window = stretch;
        }
        if !self.times.is_empty() {
            options.time_windows = self.times.clone();
        }
    }
}

/// `library:` takes a single entry or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn deserialize_library<'de, D>(deserializer: D) -> std::result::Result<Vec<LibraryEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(entries) => entries,
        OneOrMany::One(entry) => vec![entry],
    })
}

/// Text placed in one corner of the frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CornerTemplate {
    /// Text with `{path}`, `{file}` and `{dir}` placeholders.
    pub template: String,
    #[serde(default = "CornerTemplate::default_margin")]
    pub margin: u32,
    /// Font size in points.
    #[serde(default = "CornerTemplate::default_font_size")]
    pub font_size: u32,
}

impl CornerTemplate {
    const fn default_margin() -> u32 {
        20
    }

    const fn default_font_size() -> u32 {
        18
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct OverlayConfig {
    pub top_left: Option<CornerTemplate>,
    pub top_right: Option<CornerTemplate>,
    pub bottom_left: Option<CornerTemplate>,
    pub bottom_right: Option<CornerTemplate>,
}

impl OverlayConfig {
    pub fn corner(&self, corner: Corner) -> Option<&CornerTemplate> {
        match corner {
            Corner::TopLeft => self.top_left.as_ref(),
            Corner::TopRight => self.top_right.as_ref(),
            Corner::BottomLeft => self.bottom_left.as_ref(),
            Corner::BottomRight => self.bottom_right.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Corner::ALL.iter().all(|corner| self.corner(*corner).is_none())
    }
}

/// Upper bound accepted for `blur-radius`.
pub const MAX_BLUR_RADIUS: u32 = 1000;

/// File looked up in each configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

const SYSTEM_CONFIG_DIR: &str = "/etc/slide-frame";

/// Configuration locations in lookup order: `explicit` (a file, or a
/// directory holding [`CONFIG_FILE_NAME`]), then `~/.config/slide-frame`,
/// then `/etc/slide-frame`.
pub fn config_search_path(explicit: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(explicit) = explicit {
        if explicit.is_dir() {
            candidates.push(explicit.join(CONFIG_FILE_NAME));
        } else {
            candidates.push(explicit.to_path_buf());
        }
    }
    if let Some(home) = home {
        candidates.push(home.join(".config/slide-frame").join(CONFIG_FILE_NAME));
    }
    candidates.push(Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME));
    candidates
}

/// First candidate that exists as a file.
pub fn locate_config(candidates: &[PathBuf]) -> Option<&Path> {
    candidates.iter().map(PathBuf::as_path).find(|path| path.is_file())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Image sources, visited in turn.
    #[serde(deserialize_with = "deserialize_library")]
    pub library: Vec<LibraryEntry>,
    /// How long each image stays on screen before the next one is picked.
    #[serde(with = "humantime_serde")]
    pub rotation_interval: Duration,
    /// Base display policy applied to every image.
    pub display: ImageDisplayOptions,
    /// Blur strength of the background, in pixels. At most
    /// [`MAX_BLUR_RADIUS`].
    pub blur_radius: u32,
    /// 255 leaves the background untouched, 0 turns it black.
    pub background_opacity: u32,
    pub overlay_color: OverlayColor,
    /// Cross-fade duration; zero switches instantly.
    pub transition_seconds: f32,
    /// How often the primary monitor geometry is polled for changes.
    #[serde(with = "humantime_serde")]
    pub display_poll_interval: Duration,
    pub overlay: OverlayConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure_option(
            !self.library.is_empty(),
            "library",
            "must name at least one image source",
        )?;
        for entry in &self.library {
            ensure_option(
                entry.image_list.is_some() || !entry.path.as_os_str().is_empty(),
                "library.path",
                "must not be empty without an image-list",
            )?;
        }
        ensure_option(
            self.rotation_interval > Duration::ZERO,
            "rotation-interval",
            "must be positive",
        )?;
        ensure_option(
            self.display_poll_interval > Duration::ZERO,
            "display-poll-interval",
            "must be positive",
        )?;
        ensure_option(
            self.blur_radius <= MAX_BLUR_RADIUS,
            "blur-radius",
            &format!("must be at most {MAX_BLUR_RADIUS}"),
        )?;
        ensure_option(
            self.background_opacity <= u32::from(u8::MAX),
            "background-opacity",
            "must be between 0 and 255",
        )?;
        ensure_option(
            self.transition_seconds.is_finite() && self.transition_seconds >= 0.0,
            "transition-seconds",
            "must be a non-negative number",
        )?;
        for corner in Corner::ALL {
            if let Some(template) = self.overlay.corner(corner) {
                ensure_option(
                    template.font_size > 0,
                    "overlay.font-size",
                    "must be greater than zero",
                )?;
            }
        }
        Ok(self)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_secs_f32(self.transition_seconds.max(0.0))
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            library: Vec::new(),
            rotation_interval: Duration::from_secs(30),
            display: ImageDisplayOptions::default(),
            blur_radius: 20,
            background_opacity: 150,
            overlay_color: OverlayColor::default(),
            transition_seconds: 0.0,
            display_poll_interval: Duration::from_secs(1),
            overlay: OverlayConfig::default(),
        }
    }
}

fn ensure_option(condition: bool, field: &'static str, reason: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::InvalidOption {
            field,
            reason: reason.to_string(),
        })
    }
}
