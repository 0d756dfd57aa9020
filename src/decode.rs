use std::collections::BTreeMap;

use crate::{transport::TransportResponse, HttpError, Response, ResponseBody, Result};

/// Turns a raw exchange into a [`Response`], or an error for non-2xx statuses.
pub(crate) fn decode_response(raw: TransportResponse) -> Result<Response> {
    if !(200..300).contains(&raw.status) {
        return Err(HttpError::HttpStatus {
            status: raw.status,
            status_text: raw.status_text,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
        });
    }

    let headers = collapse_headers(raw.headers);
    let content_type = headers
        .get("content-type")
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let body = decode_body(&content_type, raw.body)?;

    Ok(Response {
        body,
        status: raw.status,
        status_text: raw.status_text,
        headers,
    })
}

fn collapse_headers(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect()
}

fn decode_body(content_type: &str, bytes: Vec<u8>) -> Result<ResponseBody> {
    if content_type.starts_with("application/json") {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ResponseBody::Json(serde_json::Value::Null));
        }
        return serde_json::from_slice(&bytes)
            .map(ResponseBody::Json)
            .map_err(|err| {
                HttpError::Decode(format!(
                    "invalid JSON response: {err}; body: {}",
                    String::from_utf8_lossy(&bytes)
                ))
            });
    }
    if content_type.starts_with("text/") {
        return Ok(ResponseBody::Text(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }));
    }
    Ok(ResponseBody::Binary(bytes))
}
