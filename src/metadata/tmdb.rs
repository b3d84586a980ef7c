use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{MediaDetails, MediaKind, MetadataProvider, SearchQuery};
use crate::error::{Result, GstError};

pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w154";

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Years outside this range are treated as typos and not sent as filters.
const SEARCH_YEAR_RANGE: std::ops::RangeInclusive<u32> = 1900..=2030;

/// How the credential is presented to TMDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmdbAuth {
    /// v3 key sent as the `api_key` query parameter
    ApiKey,
    /// v4 read access token (a JWT) sent as a bearer header
    Bearer,
}

impl TmdbAuth {
    pub fn detect(key: &str) -> Self {
        if key.matches('.').count() == 2 && key.len() > 100 {
            Self::Bearer
        } else {
            Self::ApiKey
        }
    }
}

/// Search and detail records share one shape; movies and series just name
/// their fields differently.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TmdbRecord {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f64>,
    popularity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TmdbSearchPage {
    results: Vec<TmdbRecord>,
}

impl TmdbRecord {
    fn into_media(self, kind: MediaKind) -> MediaDetails {
        let (title, date) = match kind {
            MediaKind::Movie => (self.title, self.release_date),
            MediaKind::TvSeries => (self.name, self.first_air_date),
        };
        let release_date = date.unwrap_or_default();

        MediaDetails {
            id: self.id,
            title: title.filter(|t| !t.is_empty()).unwrap_or_else(|| "Unknown Title".to_string()),
            year: year_from_date(&release_date),
            release_date,
            overview: self.overview.unwrap_or_default(),
            poster_path: self.poster_path.filter(|p| !p.is_empty()),
            vote_average: self.vote_average.unwrap_or_default(),
            popularity: self.popularity.unwrap_or_default(),
            kind,
        }
    }
}

fn year_from_date(date: &str) -> Option<String> {
    date.split('-')
        .next()
        .filter(|year| !year.is_empty())
        .map(str::to_string)
}

/// Full URL of a poster thumbnail.
pub fn poster_url(poster_path: &str) -> String {
    format!("{}{}", POSTER_BASE_URL, poster_path)
}

/// TMDB REST client.
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    auth: TmdbAuth,
}

impl TmdbClient {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        Self::with_base_url(api_key, TMDB_BASE_URL)
    }

    pub fn with_base_url<S1: Into<String>, S2: Into<String>>(api_key: S1, base_url: S2) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(GstError::Config("TMDB API key not provided".to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("gstrun/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: TmdbAuth::detect(&api_key),
            api_key,
        })
    }

    pub fn auth(&self) -> TmdbAuth {
        self.auth
    }

    fn get(&self, path: &str, timeout: Duration) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("TMDB request: {}", url);

        let request = self.client.get(url).timeout(timeout);
        match self.auth {
            TmdbAuth::Bearer => request.bearer_auth(&self.api_key),
            TmdbAuth::ApiKey => request.query(&[("api_key", self.api_key.as_str())]),
        }
    }
}

fn kind_segment(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movie",
        MediaKind::TvSeries => "tv",
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn verify_key(&self) -> Result<()> {
        let response = self.get("/configuration", VERIFY_TIMEOUT).send().await?;

        match response.status() {
            StatusCode::OK => {
                info!("TMDB credentials accepted ({:?})", self.auth);
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(GstError::InvalidApiKey),
            status => Err(GstError::Metadata(format!("TMDB API returned status code: {}", status))),
        }
    }

    async fn details(&self, id: u64, kind: MediaKind) -> Result<MediaDetails> {
        let path = format!("/{}/{}", kind_segment(kind), id);
        let response = self
            .get(&path, REQUEST_TIMEOUT)
            .query(&[("language", "en-US")])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let record: TmdbRecord = response
                    .json()
                    .await
                    .map_err(|e| GstError::Metadata(format!("Error parsing TMDB response: {}", e)))?;
                Ok(record.into_media(kind))
            }
            StatusCode::NOT_FOUND => Err(GstError::NotFound(format!("{} with TMDB ID {}", kind, id))),
            StatusCode::UNAUTHORIZED => Err(GstError::InvalidApiKey),
            status => Err(GstError::Metadata(format!("TMDB API error: {}", status))),
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MediaDetails>> {
        let title = query.title.trim();
        if title.is_empty() {
            warn!("{} title is empty, skipping search", query.kind);
            return Ok(Vec::new());
        }

        let mut params: Vec<(&str, String)> = vec![
            ("query", title.to_string()),
            ("language", "en-US".to_string()),
            ("include_adult", "false".to_string()),
        ];

        if let Some(year) = &query.year {
            match year.trim().parse::<u32>() {
                Ok(year) if SEARCH_YEAR_RANGE.contains(&year) => {
                    let key = match query.kind {
                        MediaKind::Movie => "year",
                        MediaKind::TvSeries => "first_air_date_year",
                    };
                    params.push((key, year.to_string()));
                }
                _ => warn!("Invalid year {}, searching without year filter", year),
            }
        }

        let path = format!("/search/{}", kind_segment(query.kind));
        let response = self.get(&path, REQUEST_TIMEOUT).query(&params).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(GstError::InvalidApiKey),
            status => return Err(GstError::Metadata(format!("TMDB API error: {}", status))),
        }

        let page: TmdbSearchPage = response
            .json()
            .await
            .map_err(|e| GstError::Metadata(format!("Error parsing TMDB response: {}", e)))?;

        info!("TMDB search for '{}' returned {} results", title, page.results.len());
        Ok(page
            .results
            .into_iter()
            .take(query.limit)
            .map(|record| record.into_media(query.kind))
            .collect())
    }
}
