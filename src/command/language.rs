//! Language tables used for output naming.

use once_cell::sync::Lazy;
use regex::Regex;

/// Language tokens recognised in subtitle filenames, grouped per language.
const FILENAME_LANGUAGE_TOKENS: &[&[&str]] = &[
    &["en", "eng", "english"],
    &["it", "ita", "italian", "italiano"],
    &["pl", "pol", "polish", "polski"],
    &["es", "esp", "spanish", "espanol"],
    &["fr", "fra", "french", "francais"],
    &["de", "ger", "german", "deutsch"],
    &["pt", "por", "portuguese", "portugues"],
    &["ru", "rus", "russian"],
    &["ja", "jpn", "japanese"],
    &["ko", "kor", "korean"],
    &["zh", "chi", "chinese"],
    &["ar", "ara", "arabic"],
    &["hi", "hin", "hindi"],
    &["nl", "dut", "dutch"],
    &["sv", "swe", "swedish"],
    &["no", "nor", "norwegian"],
    &["da", "dan", "danish"],
    &["fi", "fin", "finnish"],
    &["tr", "tur", "turkish"],
    &["he", "heb", "hebrew"],
    &["el", "gre", "greek"],
    &["cs", "cze", "czech"],
    &["hu", "hun", "hungarian"],
    &["ro", "rum", "romanian"],
    &["bg", "bul", "bulgarian"],
    &["hr", "cro", "croatian"],
    &["sk", "slo", "slovak"],
    &["sl", "slv", "slovenian"],
    &["et", "est", "estonian"],
    &["lv", "lat", "latvian"],
    &["lt", "lit", "lithuanian"],
];

/// Language name to ISO 639-1 code.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("polish", "pl"),
    ("english", "en"),
    ("spanish", "es"),
    ("french", "fr"),
    ("german", "de"),
    ("italian", "it"),
    ("portuguese", "pt"),
    ("russian", "ru"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("chinese", "zh"),
    ("arabic", "ar"),
    ("hindi", "hi"),
    ("dutch", "nl"),
    ("swedish", "sv"),
    ("norwegian", "no"),
    ("danish", "da"),
    ("finnish", "fi"),
    ("turkish", "tr"),
    ("hebrew", "he"),
    ("greek", "el"),
    ("czech", "cs"),
    ("hungarian", "hu"),
    ("romanian", "ro"),
    ("bulgarian", "bg"),
    ("croatian", "hr"),
    ("slovak", "sk"),
    ("slovenian", "sl"),
    ("estonian", "et"),
    ("latvian", "lv"),
    ("lithuanian", "lt"),
];

/// The three token positions, each capturing the character that must follow
/// the token so it can be put back. Longer tokens come first in the
/// alternation so "english" is never read as "en" + "glish".
struct TokenPatterns {
    dotted: Regex,
    separated: Regex,
    leading: Regex,
}

static TOKEN_PATTERNS: Lazy<TokenPatterns> = Lazy::new(|| {
    let mut tokens: Vec<&str> = FILENAME_LANGUAGE_TOKENS
        .iter()
        .flat_map(|group| group.iter().copied())
        .collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternation = tokens
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");

    TokenPatterns {
        dotted: Regex::new(&format!(r"(?i)\.(?:{})(\.|$)", alternation))
            .expect("dotted language pattern is valid"),
        separated: Regex::new(&format!(r"(?i)[-_](?:{})([-_.]|$)", alternation))
            .expect("separated language pattern is valid"),
        leading: Regex::new(&format!(r"(?i)^(?:{})[-_.]", alternation))
            .expect("leading language pattern is valid"),
    }
});

static REPEATED_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").expect("valid pattern"));
static REPEATED_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid pattern"));
static REPEATED_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid pattern"));

/// Replace until the text stops changing, so adjacent tokens sharing a
/// separator ("x.en.eng") are all removed.
fn replace_until_stable(pattern: &Regex, text: String, replacement: &str) -> String {
    let mut current = text;
    loop {
        let next = pattern.replace_all(&current, replacement).into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Strip language tokens from a filename stem.
///
/// A token is only removed when it sits at the start followed by a
/// separator, after a `.` and before another `.` or the end, or after `-`/`_`
/// and before a separator or the end. Once something was removed, repeated
/// separators are collapsed and stray ones trimmed; spaces are preserved.
/// A stem without tokens, or one that would end up empty, comes back as is.
pub fn clean_filename_stem(stem: &str) -> String {
    let patterns = &*TOKEN_PATTERNS;

    let mut result = replace_until_stable(&patterns.dotted, stem.to_string(), "$1");
    result = replace_until_stable(&patterns.separated, result, "$1");
    result = replace_until_stable(&patterns.leading, result, "");
    if result == stem {
        return result;
    }

    result = REPEATED_DOTS.replace_all(&result, ".").into_owned();
    result = REPEATED_HYPHENS.replace_all(&result, "-").into_owned();
    result = REPEATED_UNDERSCORES.replace_all(&result, "_").into_owned();
    let trimmed = result.trim_matches(|c| matches!(c, '.' | '-' | '_' | ' '));

    if trimmed.is_empty() {
        stem.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Best-effort ISO 639-1 code for a language name.
pub fn language_code_for(language: &str) -> String {
    let language = language.trim().to_lowercase();

    if let Some((_, code)) = LANGUAGE_CODES.iter().find(|(name, _)| *name == language) {
        return code.to_string();
    }

    if language.chars().count() == 2 && language.chars().all(char::is_alphabetic) {
        return language;
    }

    if !language.is_empty() {
        if let Some((_, code)) = LANGUAGE_CODES
            .iter()
            .find(|(name, _)| name.starts_with(&language) || language.starts_with(name))
        {
            return code.to_string();
        }
    }

    let prefix: String = language.chars().take(2).collect();
    if prefix.is_empty() {
        "en".to_string()
    } else {
        prefix
    }
}
