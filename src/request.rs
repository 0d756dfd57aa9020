use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use crate::{transport::PreparedBody, Body, HttpError, Result};

/// Joins a relative `url` onto `base_url`.
///
/// Absolute `http://` and `https://` URLs are returned unchanged. Otherwise one
/// trailing slash is trimmed from the base, one leading slash from the path, and
/// the two are joined with a single slash.
///
/// Example: `("https://api.test/", "/users/5")` → `"https://api.test/users/5"`
pub fn resolve_url(base_url: Option<&str>, url: &str) -> String {
    if is_absolute(url) {
        return url.to_owned();
    }
    match base_url {
        Some(base) => {
            let base = base.strip_suffix('/').unwrap_or(base);
            let path = url.strip_prefix('/').unwrap_or(url);
            format!("{base}/{path}")
        }
        None => url.to_owned(),
    }
}

fn is_absolute(url: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Merges the default content type, client headers and request headers, in that
/// order of increasing precedence.
///
/// Form bodies get no default content type, so the transport can label them as
/// `application/x-www-form-urlencoded` unless a header sets one explicitly.
pub(crate) fn merge_headers(
    client_headers: &BTreeMap<String, String>,
    request_headers: &BTreeMap<String, String>,
    body: Option<&PreparedBody>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if !matches!(body, Some(PreparedBody::Form(_))) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    for (name, value) in client_headers.iter().chain(request_headers) {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| HttpError::InvalidRequest(format!("invalid header name '{name}': {err}")))?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            HttpError::InvalidRequest(format!("invalid value for header '{name}': {err}"))
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

pub(crate) fn prepare_body(body: Option<Body>) -> Option<PreparedBody> {
    match body? {
        Body::Form(pairs) => Some(PreparedBody::Form(pairs)),
        Body::Blob(bytes) => Some(PreparedBody::Blob(bytes)),
        Body::Value(serde_json::Value::Null) => None,
        Body::Value(serde_json::Value::String(text)) => Some(PreparedBody::Text(text)),
        Body::Value(value) => Some(PreparedBody::Text(value.to_string())),
    }
}
