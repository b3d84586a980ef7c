use tracing::{debug, info};

use crate::cancel::CancellationSignal;
use crate::cli::TranslateArgs;
use crate::command::language::language_code_for;
use crate::config::{AppConfig, TranslationConfig};
use crate::console::Console;
use crate::metadata::{fetch_quietly, MediaKind, MetadataProvider};
use crate::pairing::{detect_tv_series, FilePair};

/// Apply the command-line options of a translate run on top of the stored settings.
pub fn apply_overrides(config: &mut AppConfig, args: &TranslateArgs) {
    if let Some(language) = &args.language {
        config.language = language.clone();
        // A new language without an explicit code gets its code re-derived.
        if args.language_code.is_none() {
            config.language_code = language_code_for(language);
        }
    }
    if let Some(code) = &args.language_code {
        config.language_code = code.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.gemini_api_key = api_key.clone();
    }
    if let Some(tmdb_id) = &args.tmdb_id {
        config.tmdb_id = tmdb_id.clone();
    }
    if let Some(gst) = &args.gst {
        config.gst_path = Some(gst.to_string_lossy().to_string());
    }
    if args.tv {
        config.is_tv_series = true;
    }
    if args.extract_audio {
        config.extract_audio = true;
    }
    if args.no_attribution {
        config.add_translator_info = false;
    }
}

/// Mark the run as a TV series when any of the files carries an episode marker.
pub fn detect_series(config: &mut AppConfig, pairs: &[FilePair], console: &Console) {
    if config.is_tv_series {
        return;
    }

    let files: Vec<_> = pairs
        .iter()
        .flat_map(|pair| pair.subtitle.iter().chain(pair.video.iter()))
        .cloned()
        .collect();
    let markers = detect_tv_series(&files);
    if !markers.is_empty() {
        console.status(format!("TV series detected: {}", markers.join(", ")));
        config.is_tv_series = true;
    }
}

/// Whether the overview should be fetched before the run.
pub fn wants_auto_fetch(config: &AppConfig, args: &TranslateArgs) -> bool {
    let has_overview = args.overview.as_deref().is_some_and(|o| !o.trim().is_empty());
    config.auto_fetch_tmdb && config.has_tmdb_api_key() && config.has_tmdb_id() && !has_overview
}

/// Settings for one batch run: stored settings, command-line text and, when
/// enabled, details fetched from the metadata provider.
pub async fn prepare_translation(
    config: &AppConfig,
    args: &TranslateArgs,
    provider: Option<&dyn MetadataProvider>,
    console: &Console,
    cancel: CancellationSignal,
) -> TranslationConfig {
    let mut overview = args.overview.clone().unwrap_or_default();
    let mut title = args.title.clone().unwrap_or_default();

    match provider {
        Some(provider) if wants_auto_fetch(config, args) => {
            let kind = MediaKind::from_series_flag(config.is_tv_series);
            if let Some(details) = fetch_quietly(provider, &config.tmdb_id, kind, console).await {
                overview = details.overview;
                if title.trim().is_empty() {
                    title = details.title;
                }
            }
        }
        _ => debug!("Skipping TMDB auto-fetch"),
    }

    let translation = TranslationConfig::from_app(config, cancel)
        .with_overview(overview)
        .with_movie_title(title);
    info!(
        "Translating to {} ({}) with {}",
        translation.language, translation.language_code, translation.model
    );
    translation
}
