//! gstrun - batch front-end for the gst subtitle translator
//!
//! Pairs subtitles with videos, runs `gst translate` for each pair with
//! live output, and stamps the produced subtitles with the model name.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gstrun::batch::BatchCoordinator;
use gstrun::cancel::CancellationSignal;
use gstrun::cli::{Args, Commands, ConfigAction, TmdbAction, TranslateArgs};
use gstrun::config::{AppConfig, ConfigStore};
use gstrun::console::{Console, ConsoleMessage};
use gstrun::metadata::tmdb::poster_url;
use gstrun::metadata::{find_best_match, parse_media_id, MediaDetails, MediaKind, MetadataProvider, SearchQuery, TmdbClient};
use gstrun::pairing::{collect_pairs, detect_tv_series, match_pairs, scan_folder, MatchStatus};
use gstrun::runner::ExecutableLocator;
use gstrun::workflow::{apply_overrides, detect_series, prepare_translation};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let store = match &args.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::at_default_location(),
    };

    let log_dir = store
        .path()
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("log");
    setup_logging(args.verbose, &log_dir)?;

    match args.command {
        Commands::Translate(translate) => run_translate(&store, translate).await?,
        Commands::Scan { folder } => run_scan(&folder)?,
        Commands::Tmdb { action } => run_tmdb(&store.load(), action).await?,
        Commands::Config { action } => run_config(&store, action)?,
    }

    Ok(())
}

async fn run_translate(store: &ConfigStore, translate: TranslateArgs) -> Result<()> {
    let mut config = store.load();
    apply_overrides(&mut config, &translate);
    if translate.save {
        store.save(&config)?;
    }
    for issue in config.validate() {
        warn!("{}", issue);
    }

    let pairs = collect_pairs(&translate.paths)?;
    if pairs.is_empty() {
        bail!("No subtitle or video files found");
    }

    let (console, mut receiver) = Console::channel();
    detect_series(&mut config, &pairs, &console);

    let tmdb = if config.has_tmdb_api_key() {
        match TmdbClient::new(config.tmdb_api_key.clone()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("TMDB client unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };
    let provider = tmdb.as_ref().map(|client| client as &dyn MetadataProvider);

    let cancel = CancellationSignal::new();
    let translation = prepare_translation(&config, &translate, provider, &console, cancel.clone()).await;

    let locator = ExecutableLocator::default().with_explicit(config.gst_path.as_ref().map(PathBuf::from));
    let coordinator = BatchCoordinator::new(locator, console);
    let batch = tokio::spawn(async move { coordinator.run(&pairs, &translation).await });

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    // The channel closes once the coordinator and its runner are dropped.
    while let Some(message) = receiver.recv().await {
        match &message {
            ConsoleMessage::Status(text) => {
                pb.set_message(text.clone());
                pb.println(text);
            }
            ConsoleMessage::Output { line, .. } => pb.println(format!("  {}", line)),
        }
    }
    pb.finish_and_clear();

    let summary = batch.await.context("batch task failed")??;
    if summary.cancelled {
        bail!("Processing cancelled after {} of {} pairs", summary.succeeded, summary.total);
    }
    if !summary.is_success() {
        bail!("{} of {} pairs failed", summary.total - summary.succeeded, summary.total);
    }

    info!("All {} pairs processed", summary.total);
    Ok(())
}

fn run_scan(folder: &Path) -> Result<()> {
    let scan = scan_folder(folder)?;
    let pairs = match_pairs(&scan.subtitles, &scan.videos, folder);

    let name = |path: Option<&PathBuf>| {
        path.and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("{:<4} {:<45} {:<45} {:<10}", "#", "Subtitle", "Video", "Status");
    println!("{}", "-".repeat(106));
    for (index, pair) in pairs.iter().enumerate() {
        let status = match pair.status() {
            MatchStatus::Matched => "Matched",
            MatchStatus::SubtitleOnly => "Sub only",
            MatchStatus::VideoOnly => "Video only",
            MatchStatus::Empty => "Empty",
        };
        println!(
            "{:<4} {:<45} {:<45} {:<10}",
            index + 1,
            name(pair.subtitle.as_ref()),
            name(pair.video.as_ref()),
            status
        );
    }

    let markers = detect_tv_series(scan.all_files());
    if markers.is_empty() {
        println!("\nLooks like a movie");
    } else {
        println!("\nTV series markers: {}", markers.join(", "));
    }
    Ok(())
}

async fn run_tmdb(config: &AppConfig, action: TmdbAction) -> Result<()> {
    if !config.has_tmdb_api_key() {
        bail!("TMDB API key is not set (use `gstrun config set tmdb_api_key <KEY>`)");
    }
    let client = TmdbClient::new(config.tmdb_api_key.clone())?;

    match action {
        TmdbAction::Verify => {
            client.verify_key().await?;
            println!("TMDB API key is valid ({:?})", client.auth());
        }
        TmdbAction::Fetch { id, tv } => {
            let id = parse_media_id(&id)?;
            client.verify_key().await?;
            let details = client.details(id, MediaKind::from_series_flag(tv)).await?;
            print_details(&details);
        }
        TmdbAction::Search { title, year, tv, limit, best } => {
            let kind = MediaKind::from_series_flag(tv);
            if best {
                match find_best_match(&client, &title, kind, year.as_deref()).await? {
                    Some(details) => print_details(&details),
                    None => println!("No {} found for '{}'", kind.to_string().to_lowercase(), title),
                }
                return Ok(());
            }

            let results = client.search(&SearchQuery::new(title.clone(), kind).year(year).limit(limit)).await?;
            if results.is_empty() {
                println!("No {} found for '{}'", kind.to_string().to_lowercase(), title);
            }
            for item in results {
                println!("{:<10} {:<50} {:>4.1}", item.id, item.display_name(), item.vote_average);
            }
        }
    }
    Ok(())
}

fn print_details(details: &MediaDetails) {
    println!("{}: {}", details.kind, details.display_name());
    println!("TMDB ID: {}", details.id);
    if let Some(poster) = &details.poster_path {
        println!("Poster: {}", poster_url(poster));
    }
    if details.overview.is_empty() {
        println!("\n(no overview)");
    } else {
        println!("\n{}", details.overview);
    }
}

fn run_config(store: &ConfigStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = store.load().masked();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Path => println!("{}", store.path().display()),
        ConfigAction::Validate => {
            let issues = store.load().validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            } else {
                for issue in &issues {
                    println!("- {}", issue);
                }
                bail!("{} configuration issue(s) found", issues.len());
            }
        }
        ConfigAction::Reset => {
            store.reset()?;
            println!("Configuration reset to defaults");
        }
        ConfigAction::Set { key, value } => {
            let mut config = store.load();
            config.set_value(&key, &value)?;
            store.save(&config)?;
            println!("{} updated", key);
        }
        ConfigAction::Import { file } => {
            let config = store.import(&file)?;
            store.save(&config)?;
            println!("Configuration imported from {}", file.display());
        }
        ConfigAction::Export { file } => {
            store.export(&store.load(), &file)?;
            println!("Configuration exported to {}", file.display());
        }
    }
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "gstrun.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console lines go to stderr so they do not mix with command output on stdout
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}", log_level, log_dir.join("gstrun.log").display());
    Ok(())
}
