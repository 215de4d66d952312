use crate::clicks::ClickRecorder;
use crate::model::{ShortenResponse, StatsResponse, UrlInfo, UrlRecord};
use crate::store::{Storage, StorageError};
use crate::utils::{generate_code, is_valid_slug, is_valid_url};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

const MAX_GENERATION_ATTEMPTS: usize = 5;
const TOP_URLS_LIMIT: usize = 5;

#[derive(Error, Debug)]
pub enum ShortenError {
    #[error("Invalid URL format")]
    InvalidUrl,

    #[error("Custom slug must be alphanumeric")]
    InvalidSlug,

    #[error("Short URL already exists")]
    SlugTaken,

    #[error("URL not found")]
    NotFound,

    #[error("Could not generate a unique short code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ShortenError>;

pub struct Shortener {
    storage: Arc<Storage>,
    clicks: ClickRecorder,
    base_url: String,
    code_length: usize,
}

impl Shortener {
    pub fn new(
        storage: Arc<Storage>,
        clicks: ClickRecorder,
        base_url: impl Into<String>,
        code_length: usize,
    ) -> Self {
        Self {
            storage,
            clicks,
            base_url: base_url.into(),
            code_length,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    /// Create a short link, either under `custom_slug` or a generated code.
    ///
    /// An empty slug counts as no slug.
    pub fn shorten(&self, long_url: &str, custom_slug: Option<&str>) -> Result<ShortenResponse> {
        if !is_valid_url(long_url) {
            return Err(ShortenError::InvalidUrl);
        }
        let record = UrlRecord {
            url: long_url.to_string(),
            created_at: Utc::now(),
        };

        let code = match custom_slug.filter(|slug| !slug.is_empty()) {
            Some(slug) => {
                if !is_valid_slug(slug) {
                    return Err(ShortenError::InvalidSlug);
                }
                if !self.storage.insert_url(slug, &record)? {
                    return Err(ShortenError::SlugTaken);
                }
                slug.to_string()
            }
            None => self.insert_generated(&record)?,
        };

        tracing::info!("Created short link {} -> {}", code, long_url);
        Ok(ShortenResponse {
            short_url: self.short_url(&code),
            long_url: record.url,
        })
    }

    fn insert_generated(&self, record: &UrlRecord) -> Result<String> {
        self.insert_generated_with(record, || generate_code(self.code_length))
    }

    /// Draws count against the attempt limit whether they collide with a
    /// stored code or with a reserved route word.
    fn insert_generated_with<G>(&self, record: &UrlRecord, mut next_code: G) -> Result<String>
    where
        G: FnMut() -> String,
    {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let code = next_code();
            if !is_valid_slug(&code) {
                tracing::debug!("Generated code {} is reserved, retrying", code);
                continue;
            }
            if self.storage.insert_url(&code, record)? {
                return Ok(code);
            }
            tracing::debug!("Generated code {} already taken, retrying", code);
        }
        Err(ShortenError::CodeSpaceExhausted(MAX_GENERATION_ATTEMPTS))
    }

    /// Look up the destination for `code` and count the click in the background.
    pub fn resolve(&self, code: &str) -> Result<String> {
        let record = self.storage.get_url(code)?.ok_or(ShortenError::NotFound)?;
        self.clicks.record(code);
        Ok(record.url)
    }

    pub fn info(&self, code: &str) -> Result<UrlInfo> {
        let (record, clicks) = self
            .storage
            .get_url_with_clicks(code)?
            .ok_or(ShortenError::NotFound)?;
        Ok(self.to_info(code, record, clicks))
    }

    /// Totals across all links plus the most visited ones.
    ///
    /// Ties keep scan order, which is the lexicographic order of the codes.
    pub fn stats(&self) -> Result<StatsResponse> {
        let scan = self.storage.scan()?;
        let total_clicks: u64 = scan.entries.iter().map(|entry| entry.clicks).sum();

        let mut entries = scan.entries;
        entries.sort_by(|a, b| b.clicks.cmp(&a.clicks));
        entries.truncate(TOP_URLS_LIMIT);

        Ok(StatsResponse {
            total_urls: scan.total,
            total_clicks,
            top_urls: entries
                .into_iter()
                .map(|entry| self.to_info(&entry.code, entry.record, entry.clicks))
                .collect(),
        })
    }

    fn to_info(&self, code: &str, record: UrlRecord, clicks: u64) -> UrlInfo {
        UrlInfo {
            short_url: self.short_url(code),
            long_url: record.url,
            created_at: record.created_at,
            access_count: clicks,
        }
    }
}
