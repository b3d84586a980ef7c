use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, GstError};

pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sub"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v"];

/// Minimum common-prefix ratio for a fuzzy subtitle/video match.
const PREFIX_SIMILARITY_THRESHOLD: f64 = 0.7;

static TV_SERIES_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"s\d{1,2}e\d{1,2}",
        r"season\s*\d+",
        r"episode\s*\d+",
        r"\d{1,2}x\d{1,2}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("tv series pattern is valid"))
    .collect()
});

/// One subtitle and/or video considered together for one translator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub subtitle: Option<PathBuf>,
    pub video: Option<PathBuf>,
    /// Folder the file names are relative to
    pub folder: PathBuf,
}

impl FilePair {
    pub fn new(subtitle: Option<PathBuf>, video: Option<PathBuf>, folder: PathBuf) -> Self {
        Self { subtitle, video, folder }
    }

    pub fn subtitle_path(&self) -> Option<PathBuf> {
        self.subtitle.as_ref().map(|path| self.resolve(path))
    }

    pub fn video_path(&self) -> Option<PathBuf> {
        self.video.as_ref().map(|path| self.resolve(path))
    }

    pub fn status(&self) -> MatchStatus {
        match (&self.subtitle, &self.video) {
            (Some(_), Some(_)) => MatchStatus::Matched,
            (Some(_), None) => MatchStatus::SubtitleOnly,
            (None, Some(_)) => MatchStatus::VideoOnly,
            (None, None) => MatchStatus::Empty,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        // Placeholders and empty names stay as they are so the builder can reject them.
        if path.is_absolute() || path.as_os_str().is_empty() || !crate::command::is_usable_path(path) {
            path.to_path_buf()
        } else {
            self.folder.join(path)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Matched,
    SubtitleOnly,
    VideoOnly,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Subtitle,
    Video,
    Other,
}

pub fn classify(path: &Path) -> FileKind {
    let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
        return FileKind::Other;
    };
    let extension = extension.to_lowercase();
    if SUBTITLE_EXTENSIONS.contains(&extension.as_str()) {
        FileKind::Subtitle
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        FileKind::Video
    } else {
        FileKind::Other
    }
}

/// Subtitle and video files found directly inside a folder.
#[derive(Debug, Default, Clone)]
pub struct FolderScan {
    pub subtitles: Vec<PathBuf>,
    pub videos: Vec<PathBuf>,
}

impl FolderScan {
    pub fn all_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.subtitles.iter().chain(self.videos.iter())
    }
}

pub fn scan_folder<P: AsRef<Path>>(folder: P) -> Result<FolderScan> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Err(GstError::Config(format!("{} is not a directory", folder.display())));
    }

    let mut scan = FolderScan::default();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        match classify(entry.path()) {
            FileKind::Subtitle => scan.subtitles.push(entry.path().to_path_buf()),
            FileKind::Video => scan.videos.push(entry.path().to_path_buf()),
            FileKind::Other => {}
        }
    }

    info!(
        "Found {} subtitle and {} video files in {}",
        scan.subtitles.len(),
        scan.videos.len(),
        folder.display()
    );
    Ok(scan)
}

fn lower_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn prefix_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let common = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    common as f64 / longest as f64
}

/// Pair every subtitle with its best video, then append videos left without subtitles.
pub fn match_pairs(subtitles: &[PathBuf], videos: &[PathBuf], folder: &Path) -> Vec<FilePair> {
    let video_stems: Vec<(String, &PathBuf)> =
        videos.iter().map(|video| (lower_stem(video), video)).collect();

    let mut pairs = Vec::new();
    let mut matched: HashSet<&PathBuf> = HashSet::new();

    for subtitle in subtitles {
        let subtitle_stem = lower_stem(subtitle);

        let exact = video_stems
            .iter()
            .find(|(stem, _)| *stem == subtitle_stem)
            .map(|(_, video)| *video);

        let best = exact.or_else(|| {
            let mut best: Option<(&PathBuf, f64)> = None;
            for (stem, video) in &video_stems {
                let score = prefix_similarity(&subtitle_stem, stem);
                if score > PREFIX_SIMILARITY_THRESHOLD
                    && best.map_or(true, |(_, best_score)| score > best_score)
                {
                    best = Some((video, score));
                }
            }
            best.map(|(video, _)| video)
        });

        if let Some(video) = best {
            debug!("Matched {} with {}", subtitle.display(), video.display());
            matched.insert(video);
        }
        pairs.push(FilePair::new(Some(subtitle.clone()), best.cloned(), folder.to_path_buf()));
    }

    for video in videos {
        if !matched.contains(video) {
            pairs.push(FilePair::new(None, Some(video.clone()), folder.to_path_buf()));
        }
    }

    pairs
}

/// Turn command-line paths into pairs: folders are scanned and matched, files
/// become single-sided pairs by extension.
pub fn collect_pairs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<FilePair>> {
    let mut pairs = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            let scan = scan_folder(path)?;
            pairs.extend(match_pairs(&scan.subtitles, &scan.videos, path));
        } else if path.is_file() {
            let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
            match classify(path) {
                FileKind::Subtitle => pairs.push(FilePair::new(Some(path.to_path_buf()), None, folder)),
                FileKind::Video => pairs.push(FilePair::new(None, Some(path.to_path_buf()), folder)),
                FileKind::Other => {
                    return Err(GstError::Config(format!(
                        "Unsupported file type: {}",
                        path.display()
                    )));
                }
            }
        } else {
            return Err(GstError::NotFound(path.display().to_string()));
        }
    }

    Ok(pairs)
}

/// The first TV-series marker found in a file name, e.g. "s01e02".
pub fn detect_tv_series_marker(filename: &str) -> Option<String> {
    let lower = filename.to_lowercase();
    TV_SERIES_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(&lower).map(|m| m.as_str().to_string()))
}

/// Distinct TV-series markers across a set of files; empty means "movie".
pub fn detect_tv_series<'a, I>(files: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut markers: Vec<String> = Vec::new();
    for file in files {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Some(marker) = detect_tv_series_marker(&name) {
            if !markers.contains(&marker) {
                markers.push(marker);
            }
        }
    }
    markers
}
