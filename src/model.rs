use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value stored in the `urls` tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub long_url: String,
    #[serde(default)]
    pub custom_slug: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_url: String,
    pub long_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlInfo {
    pub short_url: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_urls: usize,
    pub total_clicks: u64,
    pub top_urls: Vec<UrlInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub base_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
