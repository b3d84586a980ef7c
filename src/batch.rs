use std::path::PathBuf;
use tracing::{info, warn};

use crate::command::GstCommandBuilder;
use crate::config::TranslationConfig;
use crate::console::Console;
use crate::error::Result;
use crate::pairing::FilePair;
use crate::runner::{ExecutableLocator, ProcessRunner, RunOutcome};
use crate::subtitle::{insert_attribution, AttributionOutcome};

const SEPARATOR_WIDTH: usize = 30;

/// Tally of one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    /// Pairs that were started (built or run), including the one cancelled
    pub attempted: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    /// True only when every pair succeeded and nothing was cancelled.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.succeeded == self.total
    }
}

/// Runs the translator over a list of pairs, one after another.
pub struct BatchCoordinator {
    locator: ExecutableLocator,
    runner: ProcessRunner,
    console: Console,
}

impl BatchCoordinator {
    pub fn new(locator: ExecutableLocator, console: Console) -> Self {
        Self {
            locator,
            runner: ProcessRunner::new(console.clone()),
            console,
        }
    }

    /// Process `pairs` in order.
    ///
    /// Fails only when the translator cannot be found; per-pair problems are
    /// logged and counted.
    pub async fn run(&self, pairs: &[FilePair], config: &TranslationConfig) -> Result<BatchSummary> {
        let executable = match self.locator.locate() {
            Ok(executable) => executable,
            Err(e) => {
                self.console.status("ERROR: 'gst' program not found");
                self.console.status("Check if 'gst' is installed or available in PATH");
                return Err(e);
            }
        };

        self.console.status(format!("Found gst: {}", executable.display()));
        self.separator();

        let builder = GstCommandBuilder::new(&executable, self.console.clone());
        let cancel = &config.cancel;
        let mut summary = BatchSummary {
            total: pairs.len(),
            ..BatchSummary::default()
        };

        for (index, pair) in pairs.iter().enumerate() {
            if cancel.is_cancelled() {
                self.console.status(format!(
                    "Cancelling before pair {}/{}",
                    index + 1,
                    summary.total
                ));
                summary.cancelled = true;
                break;
            }

            summary.attempted += 1;
            self.console.status(format!("Processing pair {}/{}:", index + 1, summary.total));

            match self.run_pair(&builder, pair, index, config).await {
                RunOutcome::Succeeded => summary.succeeded += 1,
                RunOutcome::Cancelled => {
                    summary.cancelled = true;
                    break;
                }
                RunOutcome::Failed { .. } | RunOutcome::Error(_) => {
                    if cancel.is_cancelled() {
                        summary.cancelled = true;
                        break;
                    }
                }
            }

            self.separator();
        }

        self.report(&summary);
        Ok(summary)
    }

    async fn run_pair(
        &self,
        builder: &GstCommandBuilder,
        pair: &FilePair,
        index: usize,
        config: &TranslationConfig,
    ) -> RunOutcome {
        let number = index + 1;

        match &pair.subtitle {
            Some(subtitle) => self.console.status(format!("   Subtitles: {}", subtitle.display())),
            None => self.console.status(format!("   No subtitle file for pair {}", number)),
        }
        if let Some(video) = &pair.video {
            self.console.status(format!("   Video: {}", video.display()));
        }

        let command = match builder.build_for_pair(pair, config) {
            Ok(command) => command,
            Err(e) => {
                warn!("Pair {}: {}", number, e);
                self.console.status(format!("Failed to build command for pair {}: {}", number, e));
                return RunOutcome::Error(e.to_string());
            }
        };

        let outcome = self.runner.run(&command, index, &config.cancel).await;

        if outcome.is_success() && config.add_translator_info && !config.cancel.is_cancelled() {
            self.add_attribution(command.output_path.clone(), config.attribution_text())
                .await;
        }

        outcome
    }

    /// Post-processing never changes the pair's result.
    async fn add_attribution(&self, output: PathBuf, text: String) {
        let name = output
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| output.display().to_string());

        let result = tokio::task::spawn_blocking(move || insert_attribution(&output, &text)).await;

        match result {
            Ok(Ok(AttributionOutcome::Inserted)) => {
                self.console.status(format!("Added translator info to: {}", name));
            }
            Ok(Ok(AttributionOutcome::AlreadyPresent)) => {
                self.console.status(format!("Translator info already present in: {}", name));
            }
            Ok(Err(e)) => {
                warn!("Could not add translator info to {}: {}", name, e);
                self.console.status(format!("Could not add translator info: {}", e));
            }
            Err(e) => {
                warn!("Translator info task failed: {}", e);
                self.console.status(format!("Could not add translator info: {}", e));
            }
        }
    }

    fn report(&self, summary: &BatchSummary) {
        if summary.cancelled {
            let finished = summary.attempted.saturating_sub(1);
            self.console.status("Processing cancelled!");
            self.console.status(format!(
                "Processed before cancellation: {}/{}",
                summary.succeeded, finished
            ));
            info!(
                "Batch cancelled after {} of {} pairs ({} succeeded)",
                summary.attempted, summary.total, summary.succeeded
            );
        } else {
            self.console.status("Processing completed!");
            self.console
                .status(format!("Successful: {}/{}", summary.succeeded, summary.total));
            info!("Batch completed: {}/{} succeeded", summary.succeeded, summary.total);
        }
    }

    fn separator(&self) {
        self.console.status("─".repeat(SEPARATOR_WIDTH));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cancel::CancellationSignal;
    use crate::config::AppConfig;
    use crate::console::ConsoleMessage;
    use crate::error::GstError;
    use std::ffi::OsString;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;

    /// Fake translator: echoes its input, writes a caption to the `-o` path,
    /// hangs when the input mentions "slow" and fails when it mentions "bad".
    const FAKE_GST: &str = r#"#!/bin/sh
input=""
output=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift ;;
    -o) output="$2"; shift ;;
  esac
  shift
done
name=$(basename "$input")
echo "started $name"
case "$name" in
  *slow*) exec sleep 30 ;;
  *bad*) echo "failure" >&2; exit 2 ;;
esac
printf '1\n00:00:10,000 --> 00:00:12,000\nTranslated\n' > "$output"
echo "done $name"
"#;

    fn install_fake_gst(dir: &Path) {
        let path = dir.join("gst");
        std::fs::write(&path, FAKE_GST).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn locator(bin: &Path) -> ExecutableLocator {
        ExecutableLocator::new("gst")
            .with_search_path(Some(bin.as_os_str()))
            .with_working_dir(bin)
    }

    fn config(add_translator_info: bool) -> TranslationConfig {
        let mut app = AppConfig::default();
        app.language = "Polish".to_string();
        app.language_code = "pl".to_string();
        app.add_translator_info = add_translator_info;
        TranslationConfig::from_app(&app, CancellationSignal::new())
    }

    fn subtitle_pair(dir: &Path, name: &str) -> FilePair {
        let path = dir.join(name);
        std::fs::write(&path, "1\n00:00:10,000 --> 00:00:12,000\nHello\n").unwrap();
        FilePair::new(Some(path), None, dir.to_path_buf())
    }

    #[tokio::test]
    async fn test_missing_executable_fails_whole_batch() {
        let empty = tempfile::tempdir().unwrap();
        let (console, mut receiver) = Console::channel();
        let coordinator = BatchCoordinator::new(
            ExecutableLocator::new("gst")
                .with_search_path(None::<OsString>)
                .with_working_dir(empty.path()),
            console,
        );

        let pairs = vec![subtitle_pair(empty.path(), "a.srt")];
        let result = coordinator.run(&pairs, &config(false)).await;

        assert!(matches!(result, Err(GstError::ExecutableNotFound(_))));
        let lines: Vec<String> = receiver.drain().iter().map(|m| m.text().to_string()).collect();
        assert_eq!(lines[0], "ERROR: 'gst' program not found");
        assert!(!lines.iter().any(|line| line.starts_with("Processing pair")));
    }

    #[tokio::test]
    async fn test_all_pairs_succeed_and_get_attribution() {
        let bin = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();
        install_fake_gst(bin.path());

        let pairs = vec![
            subtitle_pair(media.path(), "One.en.srt"),
            subtitle_pair(media.path(), "Two.en.srt"),
        ];
        let (console, _receiver) = Console::channel();
        let summary = BatchCoordinator::new(locator(bin.path()), console)
            .run(&pairs, &config(true))
            .await
            .unwrap();

        assert_eq!(summary, BatchSummary { succeeded: 2, attempted: 2, total: 2, cancelled: false });
        assert!(summary.is_success());

        let written = std::fs::read_to_string(media.path().join("One.pl.srt")).unwrap();
        assert!(written.starts_with("1\n00:00:01,000 --> 00:00:05,000\n# Translated by gemini-2.5-flash #\n"));
        assert!(written.contains("2\n00:00:10,000 --> 00:00:12,000\nTranslated\n"));
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_batch_continues() {
        let bin = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();
        install_fake_gst(bin.path());

        let pairs = vec![
            FilePair::new(Some("No match".into()), Some("None".into()), media.path().to_path_buf()),
            subtitle_pair(media.path(), "bad.srt"),
            subtitle_pair(media.path(), "good.srt"),
        ];
        let (console, mut receiver) = Console::channel();
        let summary = BatchCoordinator::new(locator(bin.path()), console)
            .run(&pairs, &config(false))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.attempted, 3);
        assert!(!summary.cancelled);
        assert!(!summary.is_success());

        let messages = receiver.drain();
        assert!(messages.iter().any(|m| m.text().starts_with("Failed to build command for pair 1")));
        assert!(messages.contains(&ConsoleMessage::Output { pair: 1, line: "failure".to_string() }));
        assert!(messages.iter().any(|m| m.text() == "Successful: 1/3"));
    }

    #[tokio::test]
    async fn test_attribution_failure_keeps_pair_successful() {
        let bin = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();
        let script = FAKE_GST.replace("printf '1\\n00:00:10,000 --> 00:00:12,000\\nTranslated\\n' > \"$output\"", "true");
        let path = bin.path().join("gst");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let pairs = vec![subtitle_pair(media.path(), "a.srt")];
        let (console, mut receiver) = Console::channel();
        let summary = BatchCoordinator::new(locator(bin.path()), console)
            .run(&pairs, &config(true))
            .await
            .unwrap();

        assert!(summary.is_success());
        assert!(receiver
            .drain()
            .iter()
            .any(|m| m.text().starts_with("Could not add translator info")));
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_stops_remaining_pairs() {
        let bin = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();
        install_fake_gst(bin.path());

        let pairs = vec![
            subtitle_pair(media.path(), "first.srt"),
            subtitle_pair(media.path(), "slow.srt"),
            subtitle_pair(media.path(), "third.srt"),
        ];
        let config = config(false);
        let cancel = config.cancel.clone();
        let (console, mut receiver) = Console::channel();

        let coordinator = BatchCoordinator::new(locator(bin.path()), console);
        let worker = tokio::spawn(async move { coordinator.run(&pairs, &config).await });

        // Act like the control side: watch the log and cancel once pair 2 is running.
        let mut seen = Vec::new();
        while let Some(message) = tokio::time::timeout(Duration::from_secs(10), receiver.recv())
            .await
            .expect("log should keep flowing")
        {
            if let ConsoleMessage::Output { pair: 1, line } = &message {
                if line.starts_with("started") {
                    cancel.cancel();
                }
            }
            seen.push(message);
        }

        let summary = worker.await.unwrap().unwrap();
        assert_eq!(summary, BatchSummary { succeeded: 1, attempted: 2, total: 3, cancelled: true });
        assert!(!summary.is_success());
        assert!(!seen.iter().any(|m| matches!(m, ConsoleMessage::Output { pair: 2, .. })));
        assert!(seen.iter().any(|m| m.text() == "Processed before cancellation: 1/1"));
    }
}
