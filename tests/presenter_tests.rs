use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use slide_frame::config::{AspectFilter, ImageDisplayOptions};
use slide_frame::events::ImageDetails;
use slide_frame::processing::layout::Size;
use slide_frame::tasks::gesture::TouchPoint;
use slide_frame::tasks::presenter::{
    HostCommand, ImageLoader, ImageRequester, PresentationState, Presenter,
};
use slide_frame::tasks::reconcile::{
    DisplayInfoProvider, FULLSCREEN_RETRY_DELAY, WindowMode, WindowReconciler,
};

struct FakeDisplay(Rc<Cell<Option<Size>>>);

impl DisplayInfoProvider for FakeDisplay {
    fn primary_display_size(&self) -> Option<Size> {
        self.0.get()
    }
}

#[derive(Default)]
struct MemoryLoader {
    images: HashMap<PathBuf, RgbaImage>,
    loads: Rc<Cell<usize>>,
}

impl ImageLoader for MemoryLoader {
    fn load(&self, path: &Path) -> slide_frame::Result<RgbaImage> {
        self.loads.set(self.loads.get() + 1);
        self.images.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string()).into()
        })
    }
}

struct RecordingRequester(Rc<RefCell<Vec<ImageDisplayOptions>>>);

impl ImageRequester for RecordingRequester {
    fn schedule_image_update(&self, base: &ImageDisplayOptions) {
        self.0.borrow_mut().push(base.clone());
    }
}

struct Harness {
    presenter: Presenter,
    display: Rc<Cell<Option<Size>>>,
    requests: Rc<RefCell<Vec<ImageDisplayOptions>>>,
    loads: Rc<Cell<usize>>,
}

const WINDOW: Size = Size::new(96, 54);

fn harness() -> Harness {
    let display = Rc::new(Cell::new(Some(WINDOW)));
    let requests = Rc::new(RefCell::new(Vec::new()));
    let loads = Rc::new(Cell::new(0));

    let mut images = HashMap::new();
    images.insert(
        PathBuf::from("/lib/red.png"),
        RgbaImage::from_pixel(120, 80, Rgba([200, 0, 0, 255])),
    );
    images.insert(
        PathBuf::from("/lib/blue.png"),
        RgbaImage::from_pixel(80, 120, Rgba([0, 0, 200, 255])),
    );
    let loader = MemoryLoader {
        images,
        loads: Rc::clone(&loads),
    };

    let reconciler = WindowReconciler::new(
        Box::new(FakeDisplay(Rc::clone(&display))),
        WINDOW,
        WindowMode::Fullscreen,
    );
    let state = PresentationState {
        blur_radius: 2,
        ..PresentationState::default()
    };
    let presenter = Presenter::new(state, reconciler, Box::new(loader))
        .with_requester(Box::new(RecordingRequester(Rc::clone(&requests))));
    Harness {
        presenter,
        display,
        requests,
        loads,
    }
}

fn image(path: &str) -> ImageDetails {
    ImageDetails {
        filename: Some(PathBuf::from(path)),
        rotation: 0,
        options: ImageDisplayOptions::default(),
    }
}

fn frame_size(presenter: &Presenter) -> Option<(u32, u32)> {
    presenter.current_frame().map(|frame| frame.dimensions())
}

#[test]
fn new_image_is_visible_immediately_without_transition() {
    let mut h = harness();
    let now = Instant::now();
    h.presenter.set_image(image("/lib/red.png"), now);

    assert_eq!(frame_size(&h.presenter), Some((96, 54)));
    assert!(!h.presenter.is_animating());
    assert_eq!(h.presenter.drain_commands(), vec![HostCommand::Present]);
    // center of the letterboxed foreground
    let center = h.presenter.current_frame().unwrap().get_pixel(48, 27).0;
    assert_eq!(center, [200, 0, 0, 255]);
}

#[test]
fn empty_filename_renders_nothing() {
    let mut h = harness();
    h.presenter.set_image(ImageDetails::default(), Instant::now());
    assert!(h.presenter.current_frame().is_none());
    assert!(h.presenter.drain_commands().is_empty());
}

#[test]
fn crossfade_runs_to_completion() {
    let mut h = harness();
    h.presenter.set_transition_seconds(1.0);
    let start = Instant::now();
    h.presenter.set_image(image("/lib/red.png"), start);
    assert!(!h.presenter.is_animating(), "first image has nothing to fade from");

    h.presenter.set_image(image("/lib/blue.png"), start);
    assert!(h.presenter.is_animating());
    let before = h.presenter.current_frame().unwrap().get_pixel(48, 27).0;
    assert_eq!(before, [200, 0, 0, 255]);

    assert!(h.presenter.on_animation_tick(start + Duration::from_millis(500)));
    let mid = h.presenter.current_frame().unwrap().get_pixel(48, 27).0;
    assert!(mid[0] > 0 && mid[2] > 0, "expected a blend, got {mid:?}");

    assert!(!h.presenter.on_animation_tick(start + Duration::from_secs(1)));
    assert!(!h.presenter.is_animating());
    let done = h.presenter.current_frame().unwrap().get_pixel(48, 27).0;
    assert_eq!(done, [0, 0, 200, 255]);
}

#[test]
fn unreadable_image_shows_warning_frame() {
    let mut h = harness();
    h.presenter.set_image(image("/lib/missing.png"), Instant::now());
    assert_eq!(frame_size(&h.presenter), Some((96, 54)));
    assert_eq!(h.presenter.drain_commands(), vec![HostCommand::Present]);
}

#[test]
fn match_monitor_resolves_against_window() {
    let mut h = harness();
    h.presenter.set_base_options(ImageDisplayOptions {
        only_aspect: AspectFilter::MatchMonitor,
        ..ImageDisplayOptions::default()
    });
    assert!(h.presenter.state().aspect_matches_monitor);
    assert_eq!(h.presenter.base_options().only_aspect, AspectFilter::Landscape);
    let requests = h.requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].only_aspect, AspectFilter::Landscape);
}

#[test]
fn fixed_aspect_base_options_leave_picking_to_the_selector() {
    let mut h = harness();
    h.presenter.set_base_options(ImageDisplayOptions {
        only_aspect: AspectFilter::Portrait,
        ..ImageDisplayOptions::default()
    });
    assert!(!h.presenter.state().aspect_matches_monitor);
    assert_eq!(h.presenter.base_options().only_aspect, AspectFilter::Portrait);
    assert!(h.requests.borrow().is_empty());

    h.presenter.set_base_options(ImageDisplayOptions::default());
    assert!(h.requests.borrow().is_empty());
}

#[test]
fn monitor_rotation_clears_image_and_requests_once() {
    let mut h = harness();
    h.presenter.set_base_options(ImageDisplayOptions {
        only_aspect: AspectFilter::MatchMonitor,
        ..ImageDisplayOptions::default()
    });
    let now = Instant::now();
    h.presenter.set_image(image("/lib/red.png"), now);
    h.presenter.drain_commands();

    h.display.set(Some(Size::new(54, 96)));
    h.presenter.on_display_geometry_changed(now);

    assert_eq!(
        h.presenter.drain_commands(),
        vec![
            HostCommand::ResizeWindow(Size::new(54, 96)),
            HostCommand::Present
        ]
    );
    assert_eq!(h.presenter.base_options().only_aspect, AspectFilter::Portrait);
    assert_eq!(h.presenter.state().current_image.filename, None);
    assert_eq!(frame_size(&h.presenter), Some((54, 96)), "notice fills the window");
    assert_eq!(h.requests.borrow().len(), 2);
    assert_eq!(h.requests.borrow()[1].only_aspect, AspectFilter::Portrait);

    // the host confirms the resize; nothing else should happen
    h.presenter
        .on_resize(Size::new(54, 96), WindowMode::Fullscreen, now);
    h.presenter.on_display_geometry_changed(now);
    assert!(h.presenter.drain_commands().is_empty());
    assert_eq!(h.requests.borrow().len(), 2);
}

#[test]
fn steady_state_reconcile_is_a_noop() {
    let mut h = harness();
    h.presenter.set_base_options(ImageDisplayOptions {
        only_aspect: AspectFilter::MatchMonitor,
        ..ImageDisplayOptions::default()
    });
    h.presenter.set_image(image("/lib/red.png"), Instant::now());
    h.presenter.drain_commands();

    for _ in 0..3 {
        h.presenter.on_display_geometry_changed(Instant::now());
    }
    assert!(h.presenter.drain_commands().is_empty());
    assert_eq!(h.requests.borrow().len(), 1);
}

#[test]
fn resize_rerenders_without_decoding_or_fading() {
    let mut h = harness();
    h.presenter.set_transition_seconds(2.0);
    let now = Instant::now();
    h.presenter.set_image(image("/lib/red.png"), now);
    h.presenter.set_image(image("/lib/blue.png"), now);
    assert!(h.presenter.is_animating());
    assert_eq!(h.loads.get(), 2);

    h.display.set(Some(Size::new(64, 64)));
    h.presenter
        .on_resize(Size::new(64, 64), WindowMode::Fullscreen, now);

    assert!(!h.presenter.is_animating());
    assert_eq!(frame_size(&h.presenter), Some((64, 64)));
    assert_eq!(h.loads.get(), 2, "source should come from the cache");
    let center = h.presenter.current_frame().unwrap().get_pixel(32, 32).0;
    assert_eq!(center, [0, 0, 200, 255]);
}

#[test]
fn display_mismatch_requests_resize() {
    let mut h = harness();
    h.presenter.set_image(image("/lib/red.png"), Instant::now());
    h.presenter.drain_commands();

    h.display.set(Some(Size::new(120, 60)));
    h.presenter.on_display_geometry_changed(Instant::now());
    let commands = h.presenter.drain_commands();
    assert_eq!(commands[0], HostCommand::ResizeWindow(Size::new(120, 60)));
    assert!(commands.contains(&HostCommand::Present));
    assert_eq!(frame_size(&h.presenter), Some((120, 60)));
    assert_eq!(h.requests.borrow().len(), 0);
}

#[test]
fn windowed_mode_requests_fullscreen() {
    let mut h = harness();
    h.presenter
        .on_resize(WINDOW, WindowMode::Windowed, Instant::now());
    assert_eq!(
        h.presenter.drain_commands(),
        vec![HostCommand::RequestFullscreen {
            after: FULLSCREEN_RETRY_DELAY
        }]
    );
}

#[test]
fn missing_display_skips_geometry() {
    let mut h = harness();
    h.display.set(None);
    h.presenter
        .on_resize(Size::new(10, 10), WindowMode::Windowed, Instant::now());
    assert_eq!(
        h.presenter.drain_commands(),
        vec![HostCommand::RequestFullscreen {
            after: FULLSCREEN_RETRY_DELAY
        }]
    );
    assert_eq!(h.presenter.window_size(), Size::new(10, 10));
}

#[test]
fn four_corner_touch_quits() {
    let mut h = harness();
    let corners = [
        TouchPoint::new(0.01, 0.01),
        TouchPoint::new(0.99, 0.01),
        TouchPoint::new(0.01, 0.99),
        TouchPoint::new(0.99, 0.99),
    ];
    assert!(!h.presenter.on_touch(&corners[..3]));
    assert!(h.presenter.drain_commands().is_empty());
    assert!(h.presenter.on_touch(&corners));
    assert_eq!(h.presenter.drain_commands(), vec![HostCommand::Quit]);
}

#[test]
fn setters_clamp_inputs() {
    let mut h = harness();
    h.presenter.set_background_opacity(999);
    assert_eq!(h.presenter.state().background_opacity, 255);
    h.presenter.set_transition_seconds(-3.0);
    assert_eq!(h.presenter.state().transition, Duration::ZERO);
    h.presenter.set_blur_radius(7);
    assert_eq!(h.presenter.state().blur_radius, 7);
}
