use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};

use crate::utils::jwt::parse_bearer_token;

pub const TOKEN_COOKIE_NAME: &str = "_token";
pub const TOKEN_COOKIE_PATH: &str = "/";

/// Session cookie carrying the access token. Cross-site so the static
/// frontends on sibling domains can use it.
pub fn build_token_cookie(value: &str, domain: &str, expires: DateTime<Utc>) -> String {
    format!(
        "{}={}; Path={}; Domain={}; Expires={}; HttpOnly; SameSite=None; Secure",
        TOKEN_COOKIE_NAME,
        value,
        TOKEN_COOKIE_PATH,
        domain,
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

pub fn build_clear_cookie(domain: &str) -> String {
    format!(
        "{}=; Path={}; Domain={}; Max-Age=0; HttpOnly; SameSite=None; Secure",
        TOKEN_COOKIE_NAME, TOKEN_COOKIE_PATH, domain
    )
}

pub fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

/// The `_token` cookie wins over the `Authorization` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| extract_cookie_value(raw, TOKEN_COOKIE_NAME))
        .filter(|token| !token.is_empty());
    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer_token)
            .map(str::to_string)
    })
}
