use std::collections::BTreeMap;
use std::fmt;

use serde::{de::DeserializeOwned, Serialize};

use crate::{HttpError, Result};

/// HTTP methods supported by the client.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Request body as supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Pre-built form payload, sent unmodified.
    Form(Vec<(String, String)>),
    /// Pre-built binary payload, sent unmodified.
    Blob(Vec<u8>),
    /// Arbitrary value. Objects and arrays are sent as JSON text, scalars as
    /// their string form, `null` as no body at all.
    Value(serde_json::Value),
}

impl Body {
    /// Serializes any `Serialize` value into a [`Body::Value`].
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Value)
            .map_err(|err| HttpError::InvalidRequest(format!("body is not serializable: {err}")))
    }

    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Value(serde_json::Value::String(value))
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Value(serde_json::Value::String(value.to_owned()))
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<i64> for Body {
    fn from(value: i64) -> Self {
        Self::Value(value.into())
    }
}

impl From<bool> for Body {
    fn from(value: bool) -> Self {
        Self::Value(value.into())
    }
}

/// Decoded response body, selected by the response `Content-Type`.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(value) => Some(value),
            _ => None,
        }
    }
}

/// Successful response returned by [`HttpClient`](crate::HttpClient).
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub body: ResponseBody,
    pub status: u16,
    pub status_text: String,
    /// Lower-cased header names; repeated headers keep the last value.
    pub headers: BTreeMap<String, String>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Deserializes a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.body {
            ResponseBody::Json(value) => T::deserialize(value)
                .map_err(|err| HttpError::Decode(format!("unexpected JSON shape: {err}"))),
            _ => Err(HttpError::Decode("response body is not JSON".to_owned())),
        }
    }
}
