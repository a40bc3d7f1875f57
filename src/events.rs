use std::path::PathBuf;

use crate::config::ImageDisplayOptions;

/// One image the selector wants on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    /// `None` until the first image arrives, and after an aspect flip.
    pub filename: Option<PathBuf>,
    /// Clockwise rotation in degrees.
    pub rotation: i32,
    pub options: ImageDisplayOptions,
}

/// Selector -> viewer.
#[derive(Debug, Clone)]
pub enum SelectorUpdate {
    ShowImage(ImageDetails),
    /// Base display options from the configuration; sent once at startup.
    BaseOptions(ImageDisplayOptions),
}

/// Viewer -> selector.
#[derive(Debug, Clone)]
pub enum SelectorRequest {
    /// Pick a new image now using the given (resolved) base options.
    Refresh { base: ImageDisplayOptions },
}
