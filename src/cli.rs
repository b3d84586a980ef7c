use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (defaults to the per-user settings file)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate subtitles for files or whole folders with gst
    Translate(TranslateArgs),

    /// Show how the files in a folder would be paired
    Scan {
        /// Folder containing subtitles and videos
        folder: PathBuf,
    },

    /// Look up movie and series details on TMDB
    Tmdb {
        #[command(subcommand)]
        action: TmdbAction,
    },

    /// Inspect or change the stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct TranslateArgs {
    /// Subtitle files, video files or folders to process
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Target language name, e.g. "Korean"
    #[arg(short, long)]
    pub language: Option<String>,

    /// Target language code used in output names; derived from the language when omitted
    #[arg(long)]
    pub language_code: Option<String>,

    /// Translation model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Gemini API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Plot summary passed to the translator as context
    #[arg(long)]
    pub overview: Option<String>,

    /// Movie or series title
    #[arg(long)]
    pub title: Option<String>,

    /// Treat the content as a TV series
    #[arg(long)]
    pub tv: bool,

    /// Ask gst to extract audio from the video
    #[arg(long)]
    pub extract_audio: bool,

    /// Do not insert the "Translated by" caption
    #[arg(long)]
    pub no_attribution: bool,

    /// TMDB id used to fetch the overview automatically
    #[arg(long)]
    pub tmdb_id: Option<String>,

    /// Path to the gst executable
    #[arg(long)]
    pub gst: Option<PathBuf>,

    /// Store the given options as the new defaults
    #[arg(long)]
    pub save: bool,
}

#[derive(Subcommand)]
pub enum TmdbAction {
    /// Check that the stored TMDB key is accepted
    Verify,

    /// Fetch details for a TMDB id
    Fetch {
        /// TMDB id
        #[arg(long)]
        id: String,

        /// Look up a TV series instead of a movie
        #[arg(long)]
        tv: bool,
    },

    /// Search by title
    Search {
        /// Title to search for
        #[arg(long)]
        title: String,

        /// Release year (first air year for series)
        #[arg(long)]
        year: Option<String>,

        /// Search TV series instead of movies
        #[arg(long)]
        tv: bool,

        /// Maximum number of results
        #[arg(long, default_value = "5")]
        limit: usize,

        /// Show only the best match (exact year first)
        #[arg(long)]
        best: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current settings (API keys masked)
    Show,

    /// Print the settings file location
    Path,

    /// Report problems with the current settings
    Validate,

    /// Restore the defaults
    Reset,

    /// Change a single setting
    Set {
        key: String,
        value: String,
    },

    /// Replace the settings with the contents of another file
    Import {
        file: PathBuf,
    },

    /// Write the current settings to another file
    Export {
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_translate_flags() {
        let args = Args::try_parse_from([
            "gstrun", "-v", "translate", "movie.srt", "show/", "--language", "Polish", "--tv",
            "--no-attribution", "--tmdb-id", "603", "--gst", "/opt/gst",
        ])
        .unwrap();

        assert!(args.verbose);
        let Commands::Translate(translate) = args.command else {
            panic!("expected translate");
        };
        assert_eq!(translate.paths, vec![PathBuf::from("movie.srt"), PathBuf::from("show/")]);
        assert_eq!(translate.language.as_deref(), Some("Polish"));
        assert!(translate.tv);
        assert!(translate.no_attribution);
        assert!(!translate.extract_audio);
        assert_eq!(translate.tmdb_id.as_deref(), Some("603"));
        assert_eq!(translate.gst, Some(PathBuf::from("/opt/gst")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "gstrun", "translate", "movie.srt", "-v", "-c", "/tmp/settings.json",
        ])
        .unwrap();
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/settings.json")));

        let args = Args::try_parse_from(["gstrun", "config", "show", "--verbose"]).unwrap();
        assert!(args.verbose);
    }

    #[test]
    fn test_translate_requires_paths() {
        assert!(Args::try_parse_from(["gstrun", "translate"]).is_err());
    }

    #[test]
    fn test_tmdb_search_defaults() {
        let args = Args::try_parse_from(["gstrun", "tmdb", "search", "--title", "Dune"]).unwrap();
        match args.command {
            Commands::Tmdb { action: TmdbAction::Search { title, year, tv, limit, best } } => {
                assert_eq!(title, "Dune");
                assert!(year.is_none());
                assert!(!tv);
                assert_eq!(limit, 5);
                assert!(!best);
            }
            _ => panic!("expected tmdb search"),
        }
    }
}
