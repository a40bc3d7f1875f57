use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use softbuffer::{Context as SoftContext, Surface};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, StartCause, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId, WindowLevel},
};

use crate::{
    config::{Configuration, ImageDisplayOptions},
    events::{SelectorRequest, SelectorUpdate},
    processing::{layout::Size, overlay::TemplateOverlay, text::load_font},
    tasks::{
        gesture::TouchPoint,
        presenter::{DiskLoader, HostCommand, ImageRequester, PresentationState, Presenter},
        reconcile::{DisplayInfoProvider, FULLSCREEN_RETRY_DELAY, WindowMode, WindowReconciler},
    },
};

const INITIAL_RECONCILE_DELAY: Duration = Duration::from_millis(5);
const ANIMATION_FRAME: Duration = Duration::from_millis(16);

#[derive(Debug)]
enum ViewerEvent {
    Selector(SelectorUpdate),
    Cancelled,
}

type UpdateReceiver = mpsc::Receiver<SelectorUpdate>;
type RequestSender = mpsc::Sender<SelectorRequest>;
type WindowHandle = Arc<Window>;

struct ChannelRequester(RequestSender);

impl ImageRequester for ChannelRequester {
    fn schedule_image_update(&self, base: &ImageDisplayOptions) {
        let request = SelectorRequest::Refresh { base: base.clone() };
        if let Err(err) = self.0.try_send(request) {
            warn!("failed to request a new image: {err}");
        }
    }
}

struct MonitorDisplay(WindowHandle);

impl DisplayInfoProvider for MonitorDisplay {
    fn primary_display_size(&self) -> Option<Size> {
        let monitor = self.0.primary_monitor().or_else(|| self.0.current_monitor())?;
        let size = monitor.size();
        Some(Size::new(size.width, size.height))
    }
}

fn window_mode(window: &Window) -> WindowMode {
    if window.fullscreen().is_some() {
        WindowMode::Fullscreen
    } else {
        WindowMode::Windowed
    }
}

fn to_size(size: PhysicalSize<u32>) -> Size {
    Size::new(size.width, size.height)
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    requests: Option<RequestSender>,
    /// Updates that arrived before the window existed.
    pending: Vec<SelectorUpdate>,
    window: Option<WindowHandle>,
    _context: Option<SoftContext<WindowHandle>>,
    surface: Option<Surface<WindowHandle, WindowHandle>>,
    presenter: Option<Presenter>,
    touches: HashMap<u64, PhysicalPosition<f64>>,
    fullscreen_at: Option<Instant>,
    reconcile_at: Option<Instant>,
    next_poll: Instant,
}

impl ViewerApp {
    fn new(cfg: Configuration, cancel: CancellationToken, requests: RequestSender) -> Self {
        let next_poll = Instant::now() + cfg.display_poll_interval;
        Self {
            cfg,
            cancel,
            requests: Some(requests),
            pending: Vec::new(),
            window: None,
            _context: None,
            surface: None,
            presenter: None,
            touches: HashMap::new(),
            fullscreen_at: None,
            reconcile_at: None,
            next_poll,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }

        let attrs = Window::default_attributes()
            .with_title("slide-frame")
            .with_decorations(false)
            .with_fullscreen(Some(Fullscreen::Borderless(None)))
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_active(true);
        let window = event_loop
            .create_window(attrs)
            .context("failed to create viewer window")?;
        window.set_cursor_visible(false);
        let window = WindowHandle::new(window);

        let context = SoftContext::new(window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer context: {err:?}"))?;
        let surface = Surface::new(&context, window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer surface: {err:?}"))?;

        let reconciler = WindowReconciler::new(
            Box::new(MonitorDisplay(window.clone())),
            to_size(window.inner_size()),
            window_mode(&window),
        );
        let mut presenter = Presenter::new(
            PresentationState::from_config(&self.cfg),
            reconciler,
            Box::new(DiskLoader),
        );
        if let Some(requests) = self.requests.take() {
            presenter = presenter.with_requester(Box::new(ChannelRequester(requests)));
        }
        if let Some(overlay) = TemplateOverlay::from_config(&self.cfg.overlay) {
            presenter = presenter.with_overlay(Box::new(overlay));
        }
        match load_font() {
            Ok(font) => presenter = presenter.with_font(font),
            Err(err) => warn!("text overlays disabled: {err:?}"),
        }

        info!(
            width = window.inner_size().width,
            height = window.inner_size().height,
            "viewer window ready"
        );
        self._context = Some(context);
        self.surface = Some(surface);
        self.presenter = Some(presenter);
        self.window = Some(window);
        self.resize_surface();
        self.reconcile_at = Some(Instant::now() + INITIAL_RECONCILE_DELAY);

        let now = Instant::now();
        for update in std::mem::take(&mut self.pending) {
            self.apply_update(update, now);
        }
        Ok(())
    }

    fn resize_surface(&mut self) {
        let (Some(window), Some(surface)) = (self.window.as_ref(), self.surface.as_mut()) else {
            return;
        };
        let size = window.inner_size();
        if let (Some(width), Some(height)) = (
            NonZeroU32::new(size.width.max(1)),
            NonZeroU32::new(size.height.max(1)),
        ) && let Err(err) = surface.resize(width, height)
        {
            warn!("failed to resize softbuffer surface: {err:?}");
        }
    }

    fn apply_update(&mut self, update: SelectorUpdate, now: Instant) {
        let Some(presenter) = self.presenter.as_mut() else {
            self.pending.push(update);
            return;
        };
        match update {
            SelectorUpdate::ShowImage(details) => presenter.set_image(details, now),
            SelectorUpdate::BaseOptions(options) => presenter.set_base_options(options),
        }
    }

    fn sync_window(&mut self, now: Instant) {
        let (Some(window), Some(presenter)) = (self.window.as_ref(), self.presenter.as_mut())
        else {
            return;
        };
        presenter.on_resize(to_size(window.inner_size()), window_mode(window), now);
    }

    fn apply_commands(&mut self, event_loop: &ActiveEventLoop) {
        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };
        let commands = presenter.drain_commands();
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let mut applied_now = false;
        for command in commands {
            match command {
                HostCommand::ResizeWindow(size) => {
                    debug!(width = size.width, height = size.height, "requesting window size");
                    match window.request_inner_size(PhysicalSize::new(size.width, size.height)) {
                        Some(applied) => {
                            // no Resized event is guaranteed in this case
                            debug!(
                                width = applied.width,
                                height = applied.height,
                                "window size applied immediately"
                            );
                            applied_now = true;
                        }
                        None => debug!("window size request pending"),
                    }
                }
                HostCommand::RequestFullscreen { after } => {
                    let at = Instant::now() + after;
                    self.fullscreen_at = Some(self.fullscreen_at.map_or(at, |prev| prev.min(at)));
                }
                HostCommand::Present => window.request_redraw(),
                HostCommand::Quit => {
                    self.cancel.cancel();
                    event_loop.exit();
                }
            }
        }
        if applied_now {
            self.resize_surface();
        }
    }

    fn touch_points(&self) -> Vec<TouchPoint> {
        let Some(window) = self.window.as_ref() else {
            return Vec::new();
        };
        let size = window.inner_size();
        let w = f64::from(size.width.max(1));
        let h = f64::from(size.height.max(1));
        self.touches
            .values()
            .map(|pos| TouchPoint::new((pos.x / w) as f32, (pos.y / h) as f32))
            .collect()
    }

    fn draw(&mut self) {
        let (Some(window), Some(surface), Some(presenter)) = (
            self.window.as_ref(),
            self.surface.as_mut(),
            self.presenter.as_ref(),
        ) else {
            return;
        };
        let size = window.inner_size();
        match surface.buffer_mut() {
            Ok(mut buffer) => {
                blit_centered(
                    &mut buffer,
                    size.width.max(1),
                    size.height.max(1),
                    presenter.current_frame(),
                );
                if let Err(err) = buffer.present() {
                    error!("softbuffer present error: {err:?}");
                }
            }
            Err(err) => error!("softbuffer buffer access error: {err:?}"),
        }
    }

    fn next_deadline(&self, now: Instant) -> Instant {
        let mut deadline = self.next_poll;
        for at in [self.fullscreen_at, self.reconcile_at].into_iter().flatten() {
            deadline = deadline.min(at);
        }
        if self.presenter.as_ref().is_some_and(Presenter::is_animating) {
            deadline = deadline.min(now + ANIMATION_FRAME);
        }
        deadline
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.ensure_window(event_loop) {
            error!("failed to initialize viewer: {err:?}");
            self.cancel.cancel();
            event_loop.exit();
            return;
        }
        self.apply_commands(event_loop);
    }

    fn new_events(&mut self, event_loop: &ActiveEventLoop, cause: StartCause) {
        if !matches!(cause, StartCause::ResumeTimeReached { .. }) {
            return;
        }
        let now = Instant::now();

        if self.fullscreen_at.is_some_and(|at| at <= now) {
            self.fullscreen_at = None;
            if let Some(window) = self.window.as_ref()
                && window.fullscreen().is_none()
            {
                debug!("re-requesting fullscreen");
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                // check again so the request repeats until it sticks
                self.reconcile_at.get_or_insert(now + FULLSCREEN_RETRY_DELAY);
            }
        }

        if self.reconcile_at.is_some_and(|at| at <= now) {
            self.reconcile_at = None;
            self.sync_window(now);
        }

        if self.next_poll <= now {
            self.next_poll = now + self.cfg.display_poll_interval;
            if let Some(presenter) = self.presenter.as_mut() {
                presenter.on_display_geometry_changed(now);
            }
        }

        if let Some(presenter) = self.presenter.as_mut() {
            presenter.on_animation_tick(now);
        }
        self.apply_commands(event_loop);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }
        let now = Instant::now();
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("viewer window closed");
                self.cancel.cancel();
                event_loop.exit();
                return;
            }
            WindowEvent::Resized(size) => {
                debug!(width = size.width, height = size.height, "window resized");
                self.resize_surface();
                self.sync_window(now);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                if let Err(err) = inner_size_writer.request_inner_size(size) {
                    debug!(error = %err, "scale change keeps the platform size");
                }
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.on_display_geometry_changed(now);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.on_display_geometry_changed(now);
                }
            }
            WindowEvent::Touch(touch) => {
                match touch.phase {
                    TouchPhase::Started | TouchPhase::Moved => {
                        self.touches.insert(touch.id, touch.location);
                        let points = self.touch_points();
                        if let Some(presenter) = self.presenter.as_mut() {
                            presenter.on_touch(&points);
                        }
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => {
                        self.touches.remove(&touch.id);
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape)
                {
                    info!("escape pressed; quitting");
                    self.cancel.cancel();
                    event_loop.exit();
                    return;
                }
            }
            WindowEvent::RedrawRequested => self.draw(),
            _ => {}
        }
        self.apply_commands(event_loop);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let deadline = self.next_deadline(Instant::now());
        event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Selector(update) => {
                self.apply_update(update, Instant::now());
                self.apply_commands(event_loop);
            }
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }
}

/// Copies `frame` into a 0RGB surface buffer, centered over black. Alpha is
/// composited against the black fill.
pub fn blit_centered(buffer: &mut [u32], width: u32, height: u32, frame: Option<&RgbaImage>) {
    buffer.fill(0);
    let Some(frame) = frame else {
        return;
    };
    let (fw, fh) = frame.dimensions();
    let dst_x = width.saturating_sub(fw) / 2;
    let dst_y = height.saturating_sub(fh) / 2;
    let src_x = fw.saturating_sub(width) / 2;
    let src_y = fh.saturating_sub(height) / 2;
    let copy_w = fw.min(width);
    let copy_h = fh.min(height);
    for y in 0..copy_h {
        let row = ((dst_y + y) * width) as usize;
        for x in 0..copy_w {
            let idx = row + (dst_x + x) as usize;
            let Some(slot) = buffer.get_mut(idx) else {
                return;
            };
            let [r, g, b, a] = frame.get_pixel(src_x + x, src_y + y).0;
            let scale = |c: u8| (u32::from(c) * u32::from(a) + 127) / 255;
            *slot = (scale(r) << 16) | (scale(g) << 8) | scale(b);
        }
    }
}

pub fn run_windowed(
    cfg: Configuration,
    updates: UpdateReceiver,
    requests: RequestSender,
    cancel: CancellationToken,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;

    let cancel_task = {
        let cancel = cancel.clone();
        let proxy = event_loop.create_proxy();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let forward_task = {
        let proxy = event_loop.create_proxy();
        let mut updates = updates;
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                if proxy.send_event(ViewerEvent::Selector(update)).is_err() {
                    break;
                }
            }
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, requests);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();
    forward_task.abort();

    run_result.context("viewer event loop failed")
}
