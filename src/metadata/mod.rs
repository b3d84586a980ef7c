// Movie/TV metadata lookup
//
// - MetadataProvider: abstract lookups used by the front-end
// - tmdb: The Movie Database implementation

pub mod tmdb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::console::Console;
use crate::error::{Result, GstError};

pub use tmdb::{TmdbAuth, TmdbClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Movie,
    TvSeries,
}

impl MediaKind {
    pub fn from_series_flag(is_tv_series: bool) -> Self {
        if is_tv_series { Self::TvSeries } else { Self::Movie }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "Movie"),
            Self::TvSeries => write!(f, "TV Series"),
        }
    }
}

/// A movie or series as returned by a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDetails {
    pub id: u64,
    pub title: String,
    pub release_date: String,
    pub year: Option<String>,
    pub overview: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub popularity: f64,
    pub kind: MediaKind,
}

impl MediaDetails {
    pub fn display_name(&self) -> String {
        match &self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }
}

/// Title search parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub title: String,
    pub kind: MediaKind,
    pub year: Option<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new<S: Into<String>>(title: S, kind: MediaKind) -> Self {
        Self {
            title: title.into(),
            kind,
            year: None,
            limit: 5,
        }
    }

    pub fn year<S: Into<String>>(mut self, year: Option<S>) -> Self {
        self.year = year.map(Into::into);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Source of movie and series details.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Check that the configured credentials are accepted
    async fn verify_key(&self) -> Result<()>;

    /// Details for a known id
    async fn details(&self, id: u64, kind: MediaKind) -> Result<MediaDetails>;

    /// Title search, at most `query.limit` results
    async fn search(&self, query: &SearchQuery) -> Result<Vec<MediaDetails>>;
}

/// Best search hit: an exact year match if there is one, otherwise the first result.
pub async fn find_best_match(
    provider: &dyn MetadataProvider,
    title: &str,
    kind: MediaKind,
    year: Option<&str>,
) -> Result<Option<MediaDetails>> {
    let query = SearchQuery::new(title, kind).year(year).limit(10);
    let results = provider.search(&query).await?;

    let target_year = year.and_then(|year| year.trim().parse::<u32>().ok());
    if let Some(target_year) = target_year {
        let exact = results.iter().find(|item| {
            item.year
                .as_deref()
                .and_then(|year| year.parse::<u32>().ok())
                == Some(target_year)
        });
        if let Some(exact) = exact {
            debug!("Exact year match: {}", exact.display_name());
            return Ok(Some(exact.clone()));
        }
    }

    Ok(results.into_iter().next())
}

/// Parse a user-entered id, rejecting anything that is not a number.
pub fn parse_media_id(raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| GstError::Metadata(format!("TMDB ID must be a number, got '{}'", raw.trim())))
}

/// Unattended lookup before a run: every failure is logged, nothing is returned as an error.
pub async fn fetch_quietly(
    provider: &dyn MetadataProvider,
    raw_id: &str,
    kind: MediaKind,
    console: &Console,
) -> Option<MediaDetails> {
    let id = match parse_media_id(raw_id) {
        Ok(id) => id,
        Err(e) => {
            console.status(format!("Skipping TMDB auto-fetch: {}", e));
            return None;
        }
    };

    if let Err(e) = provider.verify_key().await {
        console.status(format!("TMDB auto-fetch failed: {}", e));
        return None;
    }

    match provider.details(id, kind).await {
        Ok(info) => {
            info!("Fetched {} details for TMDB id {}", kind, id);
            console.status(format!("Fetched {} info: {}", kind.to_string().to_lowercase(), info.display_name()));
            Some(info)
        }
        Err(GstError::NotFound(_)) => {
            console.status(format!(
                "No {} found with TMDB ID: {}",
                kind.to_string().to_lowercase(),
                id
            ));
            None
        }
        Err(e) => {
            console.status(format!("TMDB auto-fetch failed: {}", e));
            None
        }
    }
}
