use std::time::Duration;

use tracing::{debug, info};

use crate::config::{AspectFilter, ImageDisplayOptions};
use crate::processing::layout::Size;

/// Delay before fullscreen is requested again while the window is not
/// fullscreen.
pub const FULLSCREEN_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Reports the primary display's pixel size, if one can be determined.
pub trait DisplayInfoProvider {
    fn primary_display_size(&self) -> Option<Size>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Windowed,
    Fullscreen,
}

/// What one reconcile pass decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The window should be resized to this and the frame re-rendered.
    pub resized: Option<Size>,
    /// The monitor-matched aspect flipped to this value.
    pub aspect: Option<AspectFilter>,
    /// Fullscreen should be requested again after this delay.
    pub request_fullscreen: Option<Duration>,
}

pub fn resolve_monitor_aspect(size: Size) -> AspectFilter {
    AspectFilter::for_surface(size.width, size.height)
}

/// Keeps the window aligned with the primary display.
pub struct WindowReconciler {
    window: Size,
    mode: WindowMode,
    display: Box<dyn DisplayInfoProvider>,
}

impl WindowReconciler {
    pub fn new(display: Box<dyn DisplayInfoProvider>, window: Size, mode: WindowMode) -> Self {
        Self {
            window,
            mode,
            display,
        }
    }

    pub fn window_size(&self) -> Size {
        self.window
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn set_window_size(&mut self, size: Size) {
        self.window = size;
    }

    pub fn set_mode(&mut self, mode: WindowMode) {
        self.mode = mode;
    }

    /// One reconcile pass. When `matches_monitor` is set, `base.only_aspect`
    /// is updated in place and the flip is reported in the result.
    pub fn reconcile(
        &mut self,
        base: &mut ImageDisplayOptions,
        matches_monitor: bool,
    ) -> Reconciliation {
        let mut outcome = Reconciliation::default();

        match self.display.primary_display_size() {
            Some(screen) if !screen.is_empty() => {
                if screen != self.window {
                    info!(
                        from_width = self.window.width,
                        from_height = self.window.height,
                        width = screen.width,
                        height = screen.height,
                        "display geometry changed; resizing window"
                    );
                    self.window = screen;
                    outcome.resized = Some(screen);
                }
                if matches_monitor {
                    let desired = resolve_monitor_aspect(self.window);
                    if desired != base.only_aspect {
                        info!(from = %base.only_aspect, to = %desired, "monitor aspect changed");
                        base.only_aspect = desired;
                        outcome.aspect = Some(desired);
                    }
                }
            }
            _ => debug!("primary display size unavailable; skipping geometry check"),
        }

        if self.mode != WindowMode::Fullscreen {
            outcome.request_fullscreen = Some(FULLSCREEN_RETRY_DELAY);
        }
        outcome
    }
}
