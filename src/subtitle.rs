use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, GstError};

/// Attribution captions end no later than this.
const ATTRIBUTION_MAX_END_MS: u64 = 5_000;
/// Start of the attribution caption when it gets the full window.
const ATTRIBUTION_DEFAULT_START_MS: u64 = 1_000;

/// One numbered caption block of an SRT file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Caption {
    pub fn new<S: Into<String>>(start_ms: u64, end_ms: u64, text: S) -> Self {
        Self {
            index: 0,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }
}

/// Parse SRT text into captions, keeping file order.
///
/// Tolerates a UTF-8 BOM, CRLF line endings, extra blank lines and a missing
/// index line.
pub fn parse_srt(content: &str) -> Result<Vec<Caption>> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut captions = Vec::new();
    let mut lines = content.lines().peekable();

    loop {
        while lines.peek().is_some_and(|line| line.trim().is_empty()) {
            lines.next();
        }
        let Some(first) = lines.next() else {
            break;
        };

        let (index, time_line) = if first.contains("-->") {
            (captions.len() + 1, first)
        } else {
            let index = first
                .trim()
                .parse::<usize>()
                .map_err(|_| GstError::Subtitle(format!("invalid caption index '{}'", first.trim())))?;
            let time_line = lines
                .next()
                .ok_or_else(|| GstError::Subtitle(format!("caption {} has no time range", index)))?;
            (index, time_line)
        };

        let (start_ms, end_ms) = parse_time_range(time_line)?;

        let mut text = Vec::new();
        while let Some(line) = lines.peek() {
            if line.trim().is_empty() {
                break;
            }
            text.push(*line);
            lines.next();
        }

        captions.push(Caption {
            index,
            start_ms,
            end_ms,
            text: text.join("\n"),
        });
    }

    Ok(captions)
}

/// Render captions in SRT form using their current indices.
pub fn compose_srt(captions: &[Caption]) -> String {
    let mut srt_content = String::new();

    for caption in captions {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            caption.index,
            format_srt_time(caption.start_ms),
            format_srt_time(caption.end_ms),
            caption.text
        ));
    }

    srt_content
}

/// Stable sort by start time, then renumber from 1.
pub fn sort_and_reindex(captions: &mut [Caption]) {
    captions.sort_by_key(|caption| caption.start_ms);
    for (position, caption) in captions.iter_mut().enumerate() {
        caption.index = position + 1;
    }
}

fn parse_time_range(line: &str) -> Result<(u64, u64)> {
    let (start, end) = line
        .split_once("-->")
        .ok_or_else(|| GstError::Subtitle(format!("invalid time range '{}'", line.trim())))?;
    // Position tags may follow the end time
    let end = end.split_whitespace().next().unwrap_or_default();
    Ok((parse_srt_time(start.trim())?, parse_srt_time(end)?))
}

/// Parse `HH:MM:SS,mmm` (a `.` before the milliseconds is accepted too).
pub fn parse_srt_time(text: &str) -> Result<u64> {
    let invalid = || GstError::Subtitle(format!("invalid timestamp '{}'", text));

    let (clock, millis) = text.split_once([',', '.']).ok_or_else(invalid)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].trim().parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = parts[2].parse().map_err(|_| invalid())?;
    let millis: u64 = millis.trim().parse().map_err(|_| invalid())?;

    hours
        .checked_mul(60)
        .and_then(|total| total.checked_add(minutes))
        .and_then(|total| total.checked_mul(60))
        .and_then(|total| total.checked_add(seconds))
        .and_then(|total| total.checked_mul(1_000))
        .and_then(|total| total.checked_add(millis))
        .ok_or_else(invalid)
}

/// Format milliseconds as SRT time (HH:MM:SS,mmm)
pub fn format_srt_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Time window for the attribution caption given the first existing start.
///
/// It ends at the first caption or at 5 s, whichever is earlier, and starts
/// at 1 s when it has the full window, otherwise at 0.
pub fn attribution_window(first_start_ms: Option<u64>) -> (u64, u64) {
    let end = first_start_ms
        .unwrap_or(ATTRIBUTION_MAX_END_MS)
        .min(ATTRIBUTION_MAX_END_MS);
    let start = if end == ATTRIBUTION_MAX_END_MS {
        ATTRIBUTION_DEFAULT_START_MS
    } else {
        0
    };
    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionOutcome {
    Inserted,
    /// The file already opens with the same attribution text
    AlreadyPresent,
}

/// Insert `text` as the first caption of the SRT file at `path`.
///
/// The file is rewritten through a temporary file in the same directory and
/// renamed over the original. Running it again on an annotated file is a
/// no-op.
pub fn insert_attribution<P: AsRef<Path>>(path: P, text: &str) -> Result<AttributionOutcome> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(GstError::NotFound(format!("SRT file not found: {}", path.display())));
    }

    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let mut captions = parse_srt(&content)?;

    if captions.first().is_some_and(|caption| caption.text == text) {
        debug!("Attribution already present in {}", path.display());
        return Ok(AttributionOutcome::AlreadyPresent);
    }

    let (start_ms, end_ms) = attribution_window(captions.first().map(|caption| caption.start_ms));
    captions.insert(0, Caption::new(start_ms, end_ms, text));
    sort_and_reindex(&mut captions);

    write_atomically(path, compose_srt(&captions).as_bytes())?;
    info!("Added attribution to {}", path.display());
    Ok(AttributionOutcome::Inserted)
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)?.permissions();
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    // The temp file is created owner-only; keep the mode the translator gave the output.
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| GstError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:10,000 --> 00:00:12,500\nHello\nthere\n\n2\n00:00:13,000 --> 00:00:14,000\nBye\n";

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0), "00:00:00,000");
        assert_eq!(format_srt_time(65_123), "00:01:05,123");
        assert_eq!(format_srt_time(3_661_500), "01:01:01,500");
    }

    #[test]
    fn test_parse_srt_time() {
        assert_eq!(parse_srt_time("01:01:01,500").unwrap(), 3_661_500);
        assert_eq!(parse_srt_time("00:00:02.250").unwrap(), 2_250);
        assert!(parse_srt_time("00:02,250").is_err());
        assert!(parse_srt_time("garbage").is_err());
    }

    #[test]
    fn test_parse_srt_time_rejects_overflowing_fields() {
        assert!(matches!(
            parse_srt_time("99999999999999999:00:00,000"),
            Err(GstError::Subtitle(_))
        ));
        assert!(matches!(
            parse_srt_time("00:00:01,18446744073709551615"),
            Err(GstError::Subtitle(_))
        ));
    }

    #[test]
    fn test_parse_srt_blocks() {
        let captions = parse_srt(SAMPLE).unwrap();
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].start_ms, 10_000);
        assert_eq!(captions[0].end_ms, 12_500);
        assert_eq!(captions[0].text, "Hello\nthere");
        assert_eq!(captions[1].index, 2);
    }

    #[test]
    fn test_parse_srt_tolerates_bom_crlf_and_blank_runs() {
        let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000 X1:10\r\nHi\r\n\r\n\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nYo\r\n";
        let captions = parse_srt(content).unwrap();
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].end_ms, 2_000);
        assert_eq!(captions[1].text, "Yo");
        assert!(parse_srt("").unwrap().is_empty());
        assert!(parse_srt("x\n00:00:01,000 --> 00:00:02,000\nHi\n").is_err());
    }

    #[test]
    fn test_attribution_window() {
        assert_eq!(attribution_window(Some(10_000)), (1_000, 5_000));
        assert_eq!(attribution_window(Some(5_000)), (1_000, 5_000));
        assert_eq!(attribution_window(Some(2_000)), (0, 2_000));
        assert_eq!(attribution_window(None), (1_000, 5_000));
    }

    #[test]
    fn test_insert_attribution_before_late_caption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pl.srt");
        std::fs::write(&path, SAMPLE).unwrap();

        let outcome = insert_attribution(&path, "# Translated by gemini #").unwrap();
        assert_eq!(outcome, AttributionOutcome::Inserted);

        let captions = parse_srt(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(captions.len(), 3);
        assert_eq!(captions[0].text, "# Translated by gemini #");
        assert_eq!(format_srt_time(captions[0].start_ms), "00:00:01,000");
        assert_eq!(format_srt_time(captions[0].end_ms), "00:00:05,000");
        assert_eq!(captions.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(captions[1].text, "Hello\nthere");
    }

    #[test]
    fn test_insert_attribution_before_early_caption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        std::fs::write(&path, "1\n00:00:02,000 --> 00:00:03,000\nEarly\n").unwrap();

        insert_attribution(&path, "credit").unwrap();

        let captions = parse_srt(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!((captions[0].start_ms, captions[0].end_ms), (0, 2_000));
        assert_eq!(captions[1].text, "Early");
    }

    #[test]
    fn test_insert_attribution_into_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.srt");
        std::fs::write(&path, "").unwrap();

        insert_attribution(&path, "credit").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "1\n00:00:01,000 --> 00:00:05,000\ncredit\n\n");
    }

    #[test]
    fn test_insert_attribution_twice_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        std::fs::write(&path, SAMPLE).unwrap();

        insert_attribution(&path, "credit").unwrap();
        let after_first = std::fs::read_to_string(&path).unwrap();

        let outcome = insert_attribution(&path, "credit").unwrap();
        assert_eq!(outcome, AttributionOutcome::AlreadyPresent);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
    }

    #[cfg(unix)]
    #[test]
    fn test_insert_attribution_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.srt");
        std::fs::write(&path, SAMPLE).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        insert_attribution(&path, "credit").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_insert_attribution_failures() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            insert_attribution(dir.path().join("missing.srt"), "credit"),
            Err(GstError::NotFound(_))
        ));

        let path = dir.path().join("broken.srt");
        std::fs::write(&path, "one\nnot a time\n").unwrap();
        assert!(matches!(insert_attribution(&path, "credit"), Err(GstError::Subtitle(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\nnot a time\n");
    }
}
