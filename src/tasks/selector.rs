use std::collections::{HashMap, VecDeque};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use rand::seq::SliceRandom;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::{
    AspectFilter, Configuration, FolderOptions, ImageDisplayOptions, LibraryEntry, PlaybackOrder,
};
use crate::events::{ImageDetails, SelectorRequest, SelectorUpdate};

/// Playback queue over the library. Each pass visits every image once.
#[derive(Debug)]
pub struct Playlist {
    order: PlaybackOrder,
    items: Vec<PathBuf>,
    queue: VecDeque<PathBuf>,
}

impl Playlist {
    pub fn new(order: PlaybackOrder, mut items: Vec<PathBuf>) -> Self {
        items.sort();
        items.dedup();
        Self {
            order,
            items,
            queue: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, path: PathBuf) {
        if let Err(idx) = self.items.binary_search(&path) {
            self.items.insert(idx, path.clone());
            // an empty queue refills from `items` anyway
            if !self.queue.is_empty() {
                self.queue.push_back(path);
            }
        }
    }

    pub fn remove(&mut self, path: &Path) {
        if let Ok(idx) = self.items.binary_search_by(|p| p.as_path().cmp(path)) {
            self.items.remove(idx);
        }
        self.queue.retain(|p| p != path);
    }

    fn refill(&mut self) {
        let mut pass = self.items.clone();
        if self.order == PlaybackOrder::Shuffle {
            pass.shuffle(&mut rand::rng());
        }
        self.queue = pass.into();
    }

    /// Walks the queue until `accept` returns a value, trying each library
    /// entry at most once.
    pub fn next_matching<T>(
        &mut self,
        mut accept: impl FnMut(&Path) -> Option<T>,
    ) -> Option<(PathBuf, T)> {
        for _ in 0..self.items.len() {
            if self.queue.is_empty() {
                self.refill();
            }
            let path = self.queue.pop_front()?;
            if let Some(found) = accept(&path) {
                return Some((path, found));
            }
        }
        None
    }
}

/// Oriented size and display rotation of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProbe {
    pub width: u32,
    pub height: u32,
    pub rotation: i32,
}

pub fn probe_image(path: &Path) -> Result<ImageProbe> {
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("failed to read dimensions of {}", path.display()))?;
    let rotation = read_orientation(path).map_or(0, rotation_for_orientation);
    let (width, height) = if rotation % 180 == 0 {
        (width, height)
    } else {
        (height, width)
    };
    Ok(ImageProbe {
        width,
        height,
        rotation,
    })
}

/// Clockwise degrees for an EXIF orientation tag. Mirrored variants are
/// shown unrotated.
pub fn rotation_for_orientation(orientation: u16) -> i32 {
    match orientation {
        3 => 180,
        6 => 90,
        8 => 270,
        _ => 0,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)? as u16;
    debug!(orientation = value, path = %path.display(), "exif orientation");
    Some(value)
}

pub fn scan_library(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(root).follow_links(true);
    let walker = if recursive { walker } else { walker.max_depth(1) };
    walker
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image(p))
        .collect()
}

#[inline]
fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "gif", "webp"].contains(&e.as_str())
    )
}

/// Reads an image list file: one path per line, blank lines and `#`
/// comments skipped, relative paths resolved against the list's directory.
pub fn read_image_list(list: &Path) -> Result<Vec<PathBuf>> {
    let text = fs::read_to_string(list)
        .with_context(|| format!("failed to read image list {}", list.display()))?;
    let base = list.parent().unwrap_or(Path::new(""));
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| base.join(line))
        .collect())
}

/// One configured library entry and its playback queue.
#[derive(Debug)]
pub struct Source {
    entry: LibraryEntry,
    playlist: Playlist,
}

impl Source {
    pub fn load(entry: LibraryEntry) -> Self {
        let items = match &entry.image_list {
            Some(list) => read_image_list(list).unwrap_or_else(|err| {
                warn!(error = %err, "image list unavailable");
                Vec::new()
            }),
            None => scan_library(&entry.path, entry.recursive),
        };
        debug!(source = %entry.describe(), images = items.len(), "scanned source");
        let playlist = Playlist::new(entry.order, items);
        Self { entry, playlist }
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    /// Directory watched for changes; list-backed sources are static.
    fn watch_root(&self) -> Option<(&Path, RecursiveMode)> {
        if self.entry.image_list.is_some() {
            return None;
        }
        let mode = if self.entry.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        Some((self.entry.path.as_path(), mode))
    }

    fn covers(&self, path: &Path) -> bool {
        if self.entry.image_list.is_some() {
            return false;
        }
        if self.entry.recursive {
            path.starts_with(&self.entry.path)
        } else {
            path.parent() == Some(self.entry.path.as_path())
        }
    }
}

/// Every source plus a cache of per-folder overrides.
#[derive(Debug, Default)]
pub struct Library {
    sources: Vec<Source>,
    /// Index into the eligible sources to try first on the next pick.
    cursor: usize,
    folders: HashMap<PathBuf, Option<FolderOptions>>,
}

impl Library {
    pub fn new(entries: &[LibraryEntry]) -> Self {
        Self {
            sources: entries.iter().cloned().map(Source::load).collect(),
            ..Self::default()
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Total images over all sources.
    pub fn len(&self) -> usize {
        self.sources.iter().map(Source::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(Source::is_empty)
    }

    /// Sources allowed to contribute at `now`. An active exclusive source
    /// shuts out every non-exclusive one.
    fn eligible(&self, now: NaiveTime) -> Vec<usize> {
        let active: Vec<usize> = (0..self.sources.len())
            .filter(|&idx| self.sources[idx].entry.is_active_at(now))
            .collect();
        if active.iter().any(|&idx| self.sources[idx].entry.exclusive) {
            active
                .into_iter()
                .filter(|&idx| self.sources[idx].entry.exclusive)
                .collect()
        } else {
            active
        }
    }

    /// Picks the next image that fits `base` at `now`. Sources take turns;
    /// each image must also pass its folder's aspect and time overrides.
    pub fn pick(&mut self, base: &ImageDisplayOptions, now: NaiveTime) -> Option<ImageDetails> {
        if !base.is_active_at(now) {
            debug!(%now, "outside configured time windows; not picking");
            return None;
        }
        let eligible = self.eligible(now);
        if eligible.is_empty() {
            debug!(%now, "no library entry is scheduled right now");
            return None;
        }
        let aspect = base.only_aspect;
        let candidates = self.len();
        let Self {
            sources,
            cursor,
            folders,
        } = self;
        for step in 0..eligible.len() {
            let slot = (*cursor + step) % eligible.len();
            let source = &mut sources[eligible[slot]];
            let picked = source.playlist.next_matching(|path| {
                let folder = path.parent().and_then(|dir| folder_options(folders, dir));
                if let Some(folder) = &folder
                    && !folder.is_active_at(now)
                {
                    return None;
                }
                match probe_image(path) {
                    Ok(probe)
                        if aspect.accepts(probe.width, probe.height)
                            && folder
                                .as_ref()
                                .is_none_or(|f| f.accepts(probe.width, probe.height)) =>
                    {
                        Some((probe, folder))
                    }
                    Ok(_) => None,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable image");
                        None
                    }
                }
            });
            if let Some((path, (probe, folder))) = picked {
                *cursor = (slot + 1) % eligible.len();
                let mut options = base.clone();
                source.entry.apply_to(&mut options);
                if let Some(folder) = &folder {
                    folder.apply_to(&mut options);
                }
                return Some(ImageDetails {
                    filename: Some(path),
                    rotation: probe.rotation,
                    options,
                });
            }
        }
        warn!(%aspect, candidates, "no image matches the current filter");
        None
    }

    pub fn apply_fs_event(&mut self, event: Event) {
        debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
        for path in event.paths {
            if path.file_name() == Some(OsStr::new(FolderOptions::FILE_NAME)) {
                if let Some(dir) = path.parent() {
                    debug!(dir = %dir.display(), "folder options changed");
                    self.folders.remove(dir);
                }
                continue;
            }
            if !is_image(&path) {
                continue;
            }
            let added = match event.kind {
                EventKind::Create(CreateKind::File) => true,
                EventKind::Remove(RemoveKind::File) => false,
                // renames arrive as one event per side; existence tells which
                EventKind::Modify(ModifyKind::Name(_)) => path.exists(),
                _ => continue,
            };
            for source in self.sources.iter_mut().filter(|s| s.covers(&path)) {
                if added {
                    info!(path = %path.display(), "fs: add");
                    source.playlist.add(path.clone());
                } else {
                    info!(path = %path.display(), "fs: remove");
                    source.playlist.remove(&path);
                }
            }
        }
    }
}

fn folder_options(
    cache: &mut HashMap<PathBuf, Option<FolderOptions>>,
    dir: &Path,
) -> Option<FolderOptions> {
    cache
        .entry(dir.to_path_buf())
        .or_insert_with(|| match FolderOptions::load(dir) {
            Ok(found) => found,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "ignoring unreadable folder options");
                None
            }
        })
        .clone()
}

#[instrument(
    skip(cfg, to_viewer, requests, cancel),
    fields(sources = cfg.library.len())
)]
pub async fn run(
    cfg: Configuration,
    to_viewer: Sender<SelectorUpdate>,
    mut requests: Receiver<SelectorRequest>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut library = Library::new(&cfg.library);
    info!(discovered = library.len(), "startup scan complete");

    let mut base = cfg.display.clone();
    if to_viewer
        .send(SelectorUpdate::BaseOptions(base.clone()))
        .await
        .is_err()
    {
        return Ok(());
    }

    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    for (root, mode) in library.sources().iter().filter_map(Source::watch_root) {
        match watcher.watch(root, mode) {
            Ok(()) => info!(watching = %root.display(), "library watcher initialized"),
            Err(err) => warn!(root = %root.display(), error = %err, "failed to watch library root"),
        }
    }

    // `MatchMonitor` waits for the viewer's refresh, which carries the
    // resolved aspect; any other base picks straight away.
    let period = cfg.rotation_interval;
    let first = if base.only_aspect == AspectFilter::MatchMonitor {
        Instant::now() + period
    } else {
        Instant::now()
    };
    let mut ticker = time::interval_at(first, period);

    loop {
        let details = tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting selector task");
                break;
            }

            Some(request) = requests.recv() => match request {
                SelectorRequest::Refresh { base: requested } => {
                    debug!(aspect = %requested.only_aspect, "refresh requested");
                    base = requested;
                    ticker.reset();
                    library.pick(&base, Local::now().time())
                }
            },

            _ = ticker.tick() => library.pick(&base, Local::now().time()),

            Some(res) = watch_rx.recv() => {
                match res {
                    Ok(event) => library.apply_fs_event(event),
                    Err(err) => error!("watch error: {err}"),
                }
                None
            }
        };

        if let Some(details) = details {
            info!(path = ?details.filename, rotation = details.rotation, "next image");
            if to_viewer.send(SelectorUpdate::ShowImage(details)).await.is_err() {
                debug!("viewer channel closed; exiting selector task");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeWindow;
    use base64::Engine;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn sorted_playlist_cycles_in_order() {
        let mut playlist = Playlist::new(PlaybackOrder::Sorted, paths(&["c.jpg", "a.jpg", "b.jpg"]));
        let picked: Vec<_> = (0..4)
            .map(|_| playlist.next_matching(|_| Some(())).unwrap().0)
            .collect();
        assert_eq!(picked, paths(&["a.jpg", "b.jpg", "c.jpg", "a.jpg"]));
    }

    #[test]
    fn shuffled_pass_visits_everything_once() {
        let mut playlist = Playlist::new(PlaybackOrder::Shuffle, paths(&["a", "b", "c", "d"]));
        let mut seen: Vec<_> = (0..4)
            .map(|_| playlist.next_matching(|_| Some(())).unwrap().0)
            .collect();
        seen.sort();
        assert_eq!(seen, paths(&["a", "b", "c", "d"]));
    }

    #[test]
    fn next_matching_gives_up_after_one_lap() {
        let mut playlist = Playlist::new(PlaybackOrder::Sorted, paths(&["a", "b"]));
        let mut calls = 0;
        let found = playlist.next_matching(|_| {
            calls += 1;
            None::<()>
        });
        assert!(found.is_none());
        assert_eq!(calls, 2);
    }

    #[test]
    fn removed_paths_are_not_picked() {
        let mut playlist = Playlist::new(PlaybackOrder::Sorted, paths(&["a", "b"]));
        playlist.remove(Path::new("a"));
        playlist.add(PathBuf::from("c"));
        playlist.add(PathBuf::from("c"));
        assert_eq!(playlist.len(), 2);
        let picked: Vec<_> = (0..2)
            .map(|_| playlist.next_matching(|_| Some(())).unwrap().0)
            .collect();
        assert!(!picked.contains(&PathBuf::from("a")));
    }

    #[test]
    fn empty_playlist_yields_nothing() {
        let mut playlist = Playlist::new(PlaybackOrder::Shuffle, Vec::new());
        assert!(playlist.next_matching(|_| Some(())).is_none());
    }

    #[test]
    fn exif_orientation_six_is_quarter_turn() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        let probe = probe_image(&path).unwrap();
        assert_eq!(probe.rotation, 90);
        assert_eq!((probe.width, probe.height), (1, 2));
    }

    #[test]
    fn orientation_table() {
        assert_eq!(rotation_for_orientation(1), 0);
        assert_eq!(rotation_for_orientation(3), 180);
        assert_eq!(rotation_for_orientation(6), 90);
        assert_eq!(rotation_for_orientation(8), 270);
        assert_eq!(rotation_for_orientation(2), 0);
    }

    #[test]
    fn scan_respects_recursion_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.JPG"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/deep.png"), b"x").unwrap();

        assert_eq!(scan_library(dir.path(), true).len(), 2);
        assert_eq!(scan_library(dir.path(), false).len(), 1);
    }

    fn png(path: &Path, width: u32, height: u32) {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        image::RgbaImage::from_pixel(width, height, image::Rgba([9, 9, 9, 255]))
            .save(path)
            .unwrap();
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sorted_entry(path: &Path) -> LibraryEntry {
        LibraryEntry {
            order: PlaybackOrder::Sorted,
            ..LibraryEntry::for_path(path)
        }
    }

    #[test]
    fn exclusive_entry_shuts_out_others_inside_its_window() {
        let dir = tempfile::tempdir().unwrap();
        let day = dir.path().join("day");
        let special = dir.path().join("special");
        png(&day.join("wide.png"), 20, 10);
        png(&special.join("tall.png"), 10, 20);

        let entries = vec![
            sorted_entry(&day),
            LibraryEntry {
                exclusive: true,
                times: vec![TimeWindow {
                    start: Some(at(8, 0)),
                    end: Some(at(20, 0)),
                }],
                ..sorted_entry(&special)
            },
        ];
        let mut library = Library::new(&entries);
        assert_eq!(library.len(), 2);
        let base = ImageDisplayOptions::default();

        for _ in 0..3 {
            let details = library.pick(&base, at(12, 0)).unwrap();
            assert_eq!(details.filename, Some(special.join("tall.png")));
        }
        let details = library.pick(&base, at(21, 0)).unwrap();
        assert_eq!(details.filename, Some(day.join("wide.png")));
    }

    #[test]
    fn entries_take_turns() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        png(&first.join("a.png"), 20, 10);
        png(&second.join("b.png"), 20, 10);

        let mut library = Library::new(&[sorted_entry(&first), sorted_entry(&second)]);
        let base = ImageDisplayOptions::default();
        let picked: Vec<_> = (0..4)
            .map(|_| library.pick(&base, at(12, 0)).unwrap().filename.unwrap())
            .collect();
        assert_eq!(
            picked,
            vec![
                first.join("a.png"),
                second.join("b.png"),
                first.join("a.png"),
                second.join("b.png"),
            ]
        );
    }

    #[test]
    fn entry_and_folder_overrides_reach_image_options() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("lib");
        png(&root.join("top.png"), 20, 10);
        png(&root.join("night/dark.png"), 20, 10);
        std::fs::write(
            root.join("night").join(FolderOptions::FILE_NAME),
            r#"{"stretch": false, "times": [{"start": "22:00", "end": "06:00"}]}"#,
        )
        .unwrap();
        let entry = LibraryEntry {
            stretch: Some(true),
            ..sorted_entry(&root)
        };
        let base = ImageDisplayOptions::default();

        let mut library = Library::new(std::slice::from_ref(&entry));
        for _ in 0..3 {
            let details = library.pick(&base, at(12, 0)).unwrap();
            assert_eq!(details.filename, Some(root.join("top.png")));
            assert!(details.options.fit_aspect_axis_to_window);
            assert!(details.options.time_windows.is_empty());
        }

        let mut library = Library::new(std::slice::from_ref(&entry));
        let details = library.pick(&base, at(23, 0)).unwrap();
        assert_eq!(details.filename, Some(root.join("night/dark.png")));
        assert!(!details.options.fit_aspect_axis_to_window);
        assert_eq!(details.options.time_windows.len(), 1);
    }

    #[test]
    fn folder_aspect_narrows_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("lib");
        png(&root.join("wide.png"), 20, 10);
        std::fs::write(root.join(FolderOptions::FILE_NAME), r#"{"aspect": "portrait"}"#).unwrap();

        let mut library = Library::new(&[sorted_entry(&root)]);
        assert!(library.pick(&ImageDisplayOptions::default(), at(12, 0)).is_none());
    }

    #[test]
    fn base_time_windows_gate_every_pick() {
        let dir = tempfile::tempdir().unwrap();
        png(&dir.path().join("a.png"), 20, 10);
        let mut library = Library::new(&[sorted_entry(dir.path())]);
        let base = ImageDisplayOptions {
            time_windows: vec![TimeWindow {
                start: Some(at(7, 0)),
                end: Some(at(9, 0)),
            }],
            ..ImageDisplayOptions::default()
        };
        assert!(library.pick(&base, at(12, 0)).is_none());
        assert!(library.pick(&base, at(8, 0)).is_some());
    }

    #[test]
    fn image_list_resolves_relative_lines() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.txt");
        std::fs::write(&list, "a.png\n# skipped\n\n  sub/b.jpg  \n/abs/c.png\n").unwrap();
        assert_eq!(
            read_image_list(&list).unwrap(),
            vec![
                dir.path().join("a.png"),
                dir.path().join("sub/b.jpg"),
                PathBuf::from("/abs/c.png"),
            ]
        );

        let source = Source::load(LibraryEntry {
            image_list: Some(list),
            ..LibraryEntry::default()
        });
        assert_eq!(source.len(), 3);
        assert!(source.watch_root().is_none());
    }

    #[test]
    fn fs_events_reach_the_covering_source() {
        let dir = tempfile::tempdir().unwrap();
        let flat = dir.path().join("flat");
        std::fs::create_dir_all(&flat).unwrap();
        let entry = LibraryEntry {
            recursive: false,
            ..sorted_entry(&flat)
        };
        let mut library = Library::new(&[entry]);
        assert!(library.is_empty());

        let create = |path: PathBuf| Event::new(EventKind::Create(CreateKind::File)).add_path(path);
        library.apply_fs_event(create(flat.join("new.png")));
        library.apply_fs_event(create(flat.join("deep/nested.png")));
        library.apply_fs_event(create(dir.path().join("elsewhere.png")));
        assert_eq!(library.len(), 1);

        library
            .folders
            .insert(flat.clone(), Some(FolderOptions::default()));
        library.apply_fs_event(create(flat.join(FolderOptions::FILE_NAME)));
        assert!(library.folders.is_empty());

        library.apply_fs_event(
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(flat.join("new.png")),
        );
        assert!(library.is_empty());
    }
}
