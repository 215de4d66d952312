use crate::model::ErrorResponse;
use axum::http::StatusCode;
use axum::Json;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt::Display;
use url::Url;

const MIN_URL_LENGTH: usize = 11;
const ACCEPTED_SCHEMES: [&str; 2] = ["http://", "https://"];
const RESERVED_SLUGS: [&str; 4] = ["api", "admin", "health", "static"];
pub const MAX_SLUG_LENGTH: usize = 64;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn internal_error<E>(err: E) -> ApiError
where
    E: Display,
{
    tracing::error!("{}", err);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Accepts absolute `http`/`https` urls of a plausible length.
///
/// The raw text becomes the `Location` header, so it must be free of control
/// characters even though `Url::parse` would strip them.
pub fn is_valid_url(text: &str) -> bool {
    text.len() >= MIN_URL_LENGTH
        && !text.chars().any(|c| c.is_ascii_control())
        && ACCEPTED_SCHEMES.iter().any(|scheme| text.starts_with(scheme))
        && Url::parse(text).is_ok()
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LENGTH
        && slug.chars().all(|c| c.is_ascii_alphanumeric())
        && !RESERVED_SLUGS
            .iter()
            .any(|reserved| slug.eq_ignore_ascii_case(reserved))
}

pub fn generate_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("http://example.com/some/path?q=1"));
    }

    #[test]
    fn test_invalid_urls() {
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("example.com/long/path"));
        assert!(!is_valid_url("http://a"));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("https://exa mple.com"));
    }

    #[test]
    fn test_urls_with_control_characters() {
        assert!(!is_valid_url("https://example.com/a\nb\u{1}"));
        assert!(!is_valid_url("https://example.com/\tpath"));
        assert!(!is_valid_url(" https://example.com\r"));
        assert!(!is_valid_url("https://example.com/\u{7f}"));
    }

    #[test]
    fn test_slugs() {
        assert!(is_valid_slug("foo123"));
        assert!(is_valid_slug("ABCxyz"));
        assert!(!is_valid_slug("foo-bar"));
        assert!(!is_valid_slug("foo bar"));
        assert!(!is_valid_slug("föö"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug(&"a".repeat(MAX_SLUG_LENGTH + 1)));
    }

    #[test]
    fn test_reserved_slugs() {
        assert!(!is_valid_slug("api"));
        assert!(!is_valid_slug("Admin"));
        assert!(!is_valid_slug("HEALTH"));
        assert!(!is_valid_slug("static"));
        assert!(is_valid_slug("apis"));
    }

    #[test]
    fn test_generate_code() {
        for length in [1, 6, 12] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
