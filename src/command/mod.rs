// Translator invocation building
//
// - language: filename language tokens and language name lookups
// - GstCommand / GstCommandBuilder: argument vectors for `gst translate`

pub mod language;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::TranslationConfig;
use crate::console::Console;
use crate::error::{Result, GstError};
use crate::pairing::FilePair;
use language::clean_filename_stem;

/// Placeholder values the pair list uses for "no file".
pub const SENTINEL_PATHS: &[&str] = &["No match", "None"];

/// Batch size hint for the 2.0 model family.
const GEMINI_2_0_BATCH_SIZE: &str = "100";

const STYLE_GUIDE: &str = "When translating text, follow these formatting rules:
1. Line length: Keep lines to 40-50 characters when possible, breaking at natural phrase boundaries or punctuation marks.
2. Dialogue formatting: When text contains dialogue between multiple speakers, format each speaker's lines separately, starting each with a dash (-).
3. Spacing: Ensure proper spacing between words and after punctuation marks.
4. Sentence breaks: If a sentence continues on the next line, maintain proper spacing between the end of one line and the beginning of the next.";

/// A fully built translator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GstCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Subtitle file the translator is asked to write
    pub output_path: PathBuf,
}

impl GstCommand {
    pub fn new<P: Into<PathBuf>>(program: P, output_path: PathBuf) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output_path,
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a flag followed by its value
    pub fn flag<S1: Into<String>, S2: Into<String>>(self, flag: S1, value: S2) -> Self {
        self.arg(flag).arg(value)
    }

    pub fn path_flag<P: AsRef<Path>>(self, flag: &str, path: P) -> Self {
        self.flag(flag, path.as_ref().to_string_lossy().to_string())
    }

    /// Number of times `flag` appears in the argument list.
    pub fn count_flag(&self, flag: &str) -> usize {
        self.args.iter().filter(|arg| *arg == flag).count()
    }

    /// Value following the first occurrence of `flag`.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|index| self.args.get(index + 1))
            .map(String::as_str)
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Printable form with the API key masked.
impl fmt::Display for GstCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                write!(f, " ****")?;
                mask_next = false;
            } else {
                write!(f, " {}", arg)?;
                mask_next = arg == "-k";
            }
        }
        Ok(())
    }
}

/// True when `path` names an actual file rather than being empty or a placeholder.
pub fn is_usable_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    if text.trim().is_empty() || SENTINEL_PATHS.contains(&text.as_ref()) {
        return false;
    }
    match path.file_name() {
        Some(name) => !SENTINEL_PATHS.contains(&name.to_string_lossy().as_ref()),
        None => true,
    }
}

/// `<cleaned stem>.<language_code>.srt` next to `source`.
pub fn derive_output_path(source: &Path, language_code: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned = clean_filename_stem(&stem);
    let filename = format!("{}.{}.srt", cleaned, language_code);
    match source.parent() {
        Some(parent) => parent.join(filename),
        None => PathBuf::from(filename),
    }
}

/// Description passed to the translator, if there is anything to describe.
pub fn build_description(overview: &str, movie_title: &str, is_tv_series: bool) -> Option<String> {
    let overview = overview.trim();
    let movie_title = movie_title.trim();
    let content_type = if is_tv_series { "TV series" } else { "movie" };

    match (overview.is_empty(), movie_title.is_empty()) {
        (false, false) => Some(format!(
            "{} It is a {} called {}. Description: {}",
            STYLE_GUIDE, content_type, movie_title, overview
        )),
        (false, true) => Some(overview.to_string()),
        (true, false) => Some(format!("It is a {} called {}.", content_type, movie_title)),
        (true, true) => None,
    }
}

/// Builds `gst translate` invocations for file pairs.
pub struct GstCommandBuilder {
    executable: PathBuf,
    console: Console,
}

impl GstCommandBuilder {
    pub fn new<P: Into<PathBuf>>(executable: P, console: Console) -> Self {
        Self {
            executable: executable.into(),
            console,
        }
    }

    pub fn build_for_pair(&self, pair: &FilePair, config: &TranslationConfig) -> Result<GstCommand> {
        let subtitle = pair.subtitle_path();
        let video = pair.video_path();
        self.build(subtitle.as_deref(), video.as_deref(), config)
    }

    /// Map one subtitle/video combination and the run settings to a command.
    ///
    /// Fails when neither path is usable; the caller must not run anything then.
    pub fn build(
        &self,
        subtitle: Option<&Path>,
        video: Option<&Path>,
        config: &TranslationConfig,
    ) -> Result<GstCommand> {
        let subtitle = subtitle.filter(|path| is_usable_path(path));
        let video = video.filter(|path| is_usable_path(path));

        let source = subtitle
            .or(video)
            .ok_or_else(|| GstError::Build("no usable subtitle or video file".to_string()))?;

        let output_path = derive_output_path(source, &config.language_code);
        let mut cmd = GstCommand::new(&self.executable, output_path.clone()).arg("translate");

        if let Some(subtitle) = subtitle {
            cmd = cmd.path_flag("-i", subtitle);
        }

        cmd = cmd.path_flag("-o", &output_path);
        let output_name = output_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        self.console.status(format!("   Output: {}", output_name));
        if let Some(stem) = source.file_stem() {
            let stem = stem.to_string_lossy();
            let cleaned = clean_filename_stem(&stem);
            if cleaned != stem {
                self.console.status(format!("   Cleaned: '{}' -> '{}'", stem, cleaned));
            }
        }
        self.console.status(format!("   Language code: {}", config.language_code));

        cmd = cmd.flag("-l", config.language.as_str());
        self.console.status(format!("   Language: {}", config.language));

        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            self.console.status("   No Gemini API key provided");
        } else {
            cmd = cmd.flag("-k", api_key);
            self.console.status("   Using Gemini API key");
        }

        cmd = cmd.flag("--model", config.model.as_str());
        self.console.status(format!("   Model: {}", config.model));

        if config.model.contains("2.0") {
            cmd = cmd.flag("--batch-size", GEMINI_2_0_BATCH_SIZE);
            self.console.status(format!(
                "   Batch size: {} (Gemini 2.0 optimization)",
                GEMINI_2_0_BATCH_SIZE
            ));
        }

        if let Some(description) =
            build_description(&config.overview, &config.movie_title, config.is_tv_series)
        {
            let preview: String = description.chars().take(50).collect();
            self.console.status(format!("   Description: {}...", preview));
            cmd = cmd.flag("--description", description);
        }

        match video {
            Some(video) if config.extract_audio => {
                cmd = cmd.path_flag("-v", video).arg("--extract-audio");
                self.console.status("   Extract audio: enabled");
            }
            Some(video) => {
                self.console.status("   Video file available but extract audio disabled, trying subtitle extraction");
                cmd = cmd.path_flag("-v", video);
            }
            None => {
                self.console.status("   No video file, processing subtitle only");
            }
        }

        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationSignal;
    use crate::config::AppConfig;

    fn config() -> TranslationConfig {
        let mut app = AppConfig::default();
        app.language = "Polish".to_string();
        app.language_code = "pl".to_string();
        app.gemini_api_key = "secret".to_string();
        TranslationConfig::from_app(&app, CancellationSignal::new())
    }

    fn builder() -> GstCommandBuilder {
        GstCommandBuilder::new("/usr/bin/gst", Console::detached())
    }

    #[test]
    fn test_subtitle_only_command() {
        let cmd = builder()
            .build(Some(Path::new("/movies/Film.2020.en.srt")), None, &config())
            .unwrap();

        assert_eq!(
            cmd.argv(),
            vec![
                "/usr/bin/gst",
                "translate",
                "-i",
                "/movies/Film.2020.en.srt",
                "-o",
                "/movies/Film.2020.pl.srt",
                "-l",
                "Polish",
                "-k",
                "secret",
                "--model",
                "gemini-2.5-flash",
            ]
        );
        assert_eq!(cmd.output_path, PathBuf::from("/movies/Film.2020.pl.srt"));
        assert_eq!(cmd.count_flag("-v"), 0);
    }

    #[test]
    fn test_no_usable_path_is_build_failure() {
        let b = builder();
        let cfg = config();
        for (subtitle, video) in [
            (None, None),
            (Some(""), Some("")),
            (Some("No match"), Some("None")),
            (Some("/movies/None"), None),
        ] {
            let result = b.build(subtitle.map(Path::new), video.map(Path::new), &cfg);
            assert!(matches!(result, Err(GstError::Build(_))), "{:?}/{:?}", subtitle, video);
        }
    }

    #[test]
    fn test_sentinels_are_case_sensitive() {
        assert!(!is_usable_path(Path::new("No match")));
        assert!(!is_usable_path(Path::new("None")));
        assert!(is_usable_path(Path::new("none")));
        assert!(is_usable_path(Path::new("NO MATCH")));
    }

    #[test]
    fn test_video_only_derives_output_from_video() {
        let mut cfg = config();
        cfg.extract_audio = true;
        let cmd = builder()
            .build(Some(Path::new("No match")), Some(Path::new("/movies/Film.mkv")), &cfg)
            .unwrap();

        assert_eq!(cmd.count_flag("-i"), 0);
        assert_eq!(cmd.flag_value("-o"), Some("/movies/Film.pl.srt"));
        assert_eq!(cmd.flag_value("-v"), Some("/movies/Film.mkv"));
        assert_eq!(cmd.count_flag("--extract-audio"), 1);
    }

    #[test]
    fn test_video_without_audio_extraction_still_passes_video() {
        let cmd = builder()
            .build(
                Some(Path::new("/movies/Film.srt")),
                Some(Path::new("/movies/Film.mkv")),
                &config(),
            )
            .unwrap();

        assert_eq!(cmd.flag_value("-v"), Some("/movies/Film.mkv"));
        assert_eq!(cmd.count_flag("--extract-audio"), 0);
    }

    #[test]
    fn test_api_key_omitted_when_blank() {
        let mut cfg = config();
        cfg.api_key = "   ".to_string();
        let cmd = builder().build(Some(Path::new("a.srt")), None, &cfg).unwrap();
        assert_eq!(cmd.count_flag("-k"), 0);
        assert_eq!(cmd.count_flag("--model"), 1);
        assert_eq!(cmd.count_flag("-l"), 1);
    }

    #[test]
    fn test_batch_size_only_for_2_0_models() {
        let mut cfg = config();
        cfg.model = "gemini-2.0-flash".to_string();
        let cmd = builder().build(Some(Path::new("a.srt")), None, &cfg).unwrap();
        assert_eq!(cmd.count_flag("--batch-size"), 1);
        assert_eq!(cmd.flag_value("--batch-size"), Some("100"));

        cfg.model = "gemini-2.5-flash".to_string();
        let cmd = builder().build(Some(Path::new("a.srt")), None, &cfg).unwrap();
        assert_eq!(cmd.count_flag("--batch-size"), 0);
    }

    #[test]
    fn test_description_variants() {
        assert_eq!(
            build_description("", "Alpha", false).as_deref(),
            Some("It is a movie called Alpha.")
        );
        assert_eq!(
            build_description("", "Alpha", true).as_deref(),
            Some("It is a TV series called Alpha.")
        );
        assert_eq!(build_description("A plot.", "", false).as_deref(), Some("A plot."));
        assert_eq!(build_description("  ", "", false), None);

        let full = build_description("A plot.", "Alpha", true).unwrap();
        assert!(full.starts_with(STYLE_GUIDE));
        assert!(full.ends_with("It is a TV series called Alpha. Description: A plot."));
    }

    #[test]
    fn test_description_flag_presence() {
        let cfg = config().with_movie_title("Alpha");
        let cmd = builder().build(Some(Path::new("a.srt")), None, &cfg).unwrap();
        assert_eq!(cmd.flag_value("--description"), Some("It is a movie called Alpha."));

        let cmd = builder().build(Some(Path::new("a.srt")), None, &config()).unwrap();
        assert_eq!(cmd.count_flag("--description"), 0);
    }

    #[test]
    fn test_display_masks_api_key() {
        let cmd = builder().build(Some(Path::new("a.srt")), None, &config()).unwrap();
        let shown = cmd.to_string();
        assert!(shown.contains("-k ****"));
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn test_derive_output_path_relative() {
        assert_eq!(derive_output_path(Path::new("Show.S01E01.eng.srt"), "ko"), PathBuf::from("Show.S01E01.ko.srt"));
    }
}
