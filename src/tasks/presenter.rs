//! The presentation core: turns the selected image into the frame on screen
//! and keeps it consistent with the display.
//!
//! Everything here runs synchronously on the UI thread. The host adapter
//! feeds events in through the `on_*` methods and drains [`HostCommand`]s
//! afterwards; nothing in this module talks to the windowing system directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ab_glyph::{FontArc, PxScale};
use image::{ImageReader, Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::config::{AspectFilter, Configuration, ImageDisplayOptions, OverlayColor};
use crate::error::{Error, Result};
use crate::events::ImageDetails;
use crate::processing::compose::composite;
use crate::processing::layout::Size;
use crate::processing::overlay::{TextOverlay, points_to_px, render_overlays};
use crate::processing::resolve::resolve;
use crate::processing::text::draw_centered_text;
use crate::tasks::gesture::{TouchPoint, is_quit_combination};
use crate::tasks::reconcile::{WindowMode, WindowReconciler, resolve_monitor_aspect};
use crate::tasks::transition::TransitionState;

pub const ASPECT_CHANGED_NOTICE: &str = "Monitor aspect changed, updating image...";
const NOTICE_FONT_PT: u32 = 24;

/// Asks the image selector for a new image right away.
pub trait ImageRequester {
    /// `base` carries the currently resolved base options.
    fn schedule_image_update(&self, base: &ImageDisplayOptions);
}

/// Decodes images into RGBA.
pub trait ImageLoader {
    fn load(&self, path: &Path) -> Result<RgbaImage>;
}

/// Loads images from the filesystem, sniffing the format from content.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLoader;

impl ImageLoader for DiskLoader {
    fn load(&self, path: &Path) -> Result<RgbaImage> {
        let decode_err = |source| Error::Decode {
            path: path.to_path_buf(),
            source,
        };
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let image = reader.decode().map_err(decode_err)?;
        Ok(image.to_rgba8())
    }
}

/// Requests the host adapter carries out after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    ResizeWindow(Size),
    RequestFullscreen { after: Duration },
    /// `current_frame()` changed and should be shown.
    Present,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentationState {
    pub blur_radius: u32,
    pub background_opacity: u8,
    pub overlay_color: OverlayColor,
    pub transition: Duration,
    pub base_options: ImageDisplayOptions,
    /// The base options asked for `MatchMonitor`; `base_options.only_aspect`
    /// then holds the resolved orientation.
    pub aspect_matches_monitor: bool,
    pub current_image: ImageDetails,
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            blur_radius: 20,
            background_opacity: 150,
            overlay_color: OverlayColor::WHITE,
            transition: Duration::ZERO,
            base_options: ImageDisplayOptions::default(),
            aspect_matches_monitor: false,
            current_image: ImageDetails::default(),
        }
    }
}

impl PresentationState {
    /// Appearance settings from `cfg`. Base options arrive separately through
    /// [`Presenter::set_base_options`].
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            blur_radius: cfg.blur_radius,
            background_opacity: clamp_opacity(cfg.background_opacity),
            overlay_color: cfg.overlay_color,
            transition: cfg.transition(),
            ..Self::default()
        }
    }
}

fn clamp_opacity(value: u32) -> u8 {
    value.min(u32::from(u8::MAX)) as u8
}

struct CachedSource {
    path: PathBuf,
    image: Arc<RgbaImage>,
}

pub struct Presenter {
    state: PresentationState,
    reconciler: WindowReconciler,
    loader: Box<dyn ImageLoader>,
    requester: Option<Box<dyn ImageRequester>>,
    overlay: Option<Box<dyn TextOverlay>>,
    font: Option<FontArc>,
    source: Option<CachedSource>,
    /// Last fully composed frame; the target of any running transition.
    composed: Option<Arc<RgbaImage>>,
    transition: Option<TransitionState>,
    /// What is on screen right now.
    frame: Option<Arc<RgbaImage>>,
    commands: Vec<HostCommand>,
}

impl Presenter {
    pub fn new(
        state: PresentationState,
        reconciler: WindowReconciler,
        loader: Box<dyn ImageLoader>,
    ) -> Self {
        Self {
            state,
            reconciler,
            loader,
            requester: None,
            overlay: None,
            font: None,
            source: None,
            composed: None,
            transition: None,
            frame: None,
            commands: Vec::new(),
        }
    }

    pub fn with_requester(mut self, requester: Box<dyn ImageRequester>) -> Self {
        self.requester = Some(requester);
        self
    }

    pub fn with_overlay(mut self, overlay: Box<dyn TextOverlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn window_size(&self) -> Size {
        self.reconciler.window_size()
    }

    pub fn base_options(&self) -> &ImageDisplayOptions {
        &self.state.base_options
    }

    pub fn set_blur_radius(&mut self, radius: u32) {
        self.state.blur_radius = radius;
    }

    /// Values above 255 are clamped.
    pub fn set_background_opacity(&mut self, opacity: u32) {
        self.state.background_opacity = clamp_opacity(opacity);
    }

    pub fn set_overlay_color(&mut self, color: OverlayColor) {
        self.state.overlay_color = color;
    }

    /// Negative or non-finite values disable the crossfade.
    pub fn set_transition_seconds(&mut self, seconds: f32) {
        self.state.transition = if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f32(seconds)
        } else {
            Duration::ZERO
        };
    }

    /// Replaces the base options. `MatchMonitor` is resolved against the
    /// current window and the selector is asked for an image that fits it.
    /// Other filters leave picking to the selector's own schedule.
    pub fn set_base_options(&mut self, options: ImageDisplayOptions) {
        self.state.aspect_matches_monitor = options.only_aspect == AspectFilter::MatchMonitor;
        self.state.base_options = options;
        if self.state.aspect_matches_monitor {
            let resolved = resolve_monitor_aspect(self.reconciler.window_size());
            debug!(aspect = %resolved, "resolved monitor aspect");
            self.state.base_options.only_aspect = resolved;
            self.request_image();
        }
    }

    pub fn set_image(&mut self, details: ImageDetails, now: Instant) {
        debug!(filename = ?details.filename, rotation = details.rotation, "set image");
        self.state.current_image = details;
        self.render(now, true);
    }

    pub fn on_resize(&mut self, size: Size, mode: WindowMode, now: Instant) {
        self.reconciler.set_window_size(size);
        self.reconciler.set_mode(mode);
        self.reconcile(now);
    }

    pub fn on_display_geometry_changed(&mut self, now: Instant) {
        self.reconcile(now);
    }

    /// Returns true when the touch set is the quit gesture.
    pub fn on_touch(&mut self, points: &[TouchPoint]) -> bool {
        if is_quit_combination(points) {
            info!("quit gesture recognized");
            self.commands.push(HostCommand::Quit);
            true
        } else {
            false
        }
    }

    /// Advances the crossfade. Returns true while more ticks are needed.
    pub fn on_animation_tick(&mut self, now: Instant) -> bool {
        let Some(transition) = &self.transition else {
            return false;
        };
        if transition.is_complete(now) {
            self.frame = Some(Arc::clone(&transition.to));
            self.transition = None;
            self.commands.push(HostCommand::Present);
            false
        } else {
            self.frame = Some(Arc::new(transition.sample(now)));
            self.commands.push(HostCommand::Present);
            true
        }
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn current_frame(&self) -> Option<&RgbaImage> {
        self.frame.as_deref()
    }

    pub fn drain_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.commands)
    }

    fn reconcile(&mut self, now: Instant) {
        let outcome = self.reconciler.reconcile(
            &mut self.state.base_options,
            self.state.aspect_matches_monitor,
        );
        if let Some(size) = outcome.resized {
            self.commands.push(HostCommand::ResizeWindow(size));
        }

        if outcome.aspect.is_some() {
            self.state.current_image.filename = None;
            warn!("{ASPECT_CHANGED_NOTICE}");
            self.show_notice(ASPECT_CHANGED_NOTICE);
            self.request_image();
        } else if self.frame_is_stale() {
            self.render(now, false);
        }

        if let Some(after) = outcome.request_fullscreen {
            self.commands.push(HostCommand::RequestFullscreen { after });
        }
    }

    fn frame_is_stale(&self) -> bool {
        let window = self.reconciler.window_size();
        self.composed
            .as_ref()
            .is_some_and(|frame| frame.dimensions() != (window.width, window.height))
    }

    fn request_image(&self) {
        match &self.requester {
            Some(requester) => requester.schedule_image_update(&self.state.base_options),
            None => debug!("no image requester attached"),
        }
    }

    fn render(&mut self, now: Instant, animate: bool) {
        let window = self.reconciler.window_size();
        let Some(path) = self.state.current_image.filename.clone() else {
            return;
        };
        if window.is_empty() {
            debug!("window has no area yet; deferring render");
            return;
        }

        let source = match self.load_source(&path) {
            Ok(image) => image,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load image");
                self.show_notice(&format!("Unable to show {}", path.display()));
                return;
            }
        };

        let details = &self.state.current_image;
        let resolved = resolve(&source, details.rotation, window, &details.options);
        let mut frame = composite(
            &resolved,
            window,
            &details.options,
            self.state.blur_radius,
            self.state.background_opacity,
        );
        if let (Some(font), Some(overlay)) = (&self.font, &self.overlay) {
            render_overlays(&mut frame, font, overlay.as_ref(), &path, self.state.overlay_color);
        }

        let next = Arc::new(frame);
        let previous = if animate { self.frame.clone() } else { None };
        self.composed = Some(Arc::clone(&next));
        self.transition = TransitionState::begin(previous, Arc::clone(&next), self.state.transition, now);
        self.frame = Some(match &self.transition {
            Some(transition) => Arc::new(transition.sample(now)),
            None => next,
        });
        self.commands.push(HostCommand::Present);
    }

    fn load_source(&mut self, path: &Path) -> Result<Arc<RgbaImage>> {
        if let Some(cached) = self.source.as_ref().filter(|cached| cached.path == path) {
            return Ok(Arc::clone(&cached.image));
        }
        let image = Arc::new(self.loader.load(path)?);
        self.source = Some(CachedSource {
            path: path.to_path_buf(),
            image: Arc::clone(&image),
        });
        Ok(image)
    }

    /// Replaces the screen with `message` on black, without a transition.
    fn show_notice(&mut self, message: &str) {
        let window = self.reconciler.window_size();
        let mut frame = RgbaImage::from_pixel(
            window.width.max(1),
            window.height.max(1),
            Rgba([0, 0, 0, 255]),
        );
        if let Some(font) = &self.font {
            let scale = PxScale::from(points_to_px(NOTICE_FONT_PT));
            draw_centered_text(&mut frame, font, message, self.state.overlay_color, scale);
        }
        let frame = Arc::new(frame);
        self.transition = None;
        self.composed = Some(Arc::clone(&frame));
        self.frame = Some(frame);
        self.commands.push(HostCommand::Present);
    }
}
