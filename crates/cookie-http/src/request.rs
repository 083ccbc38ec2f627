//! Request and exchange values.

use crate::{HttpError, HttpResult};
use bytes::Bytes;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use url::Url;

/// One `multipart/form-data` field.
#[derive(Clone)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        contents: Bytes,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        MultipartField::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, contents: Bytes) -> Self {
        MultipartField::File {
            name: name.into(),
            file_name: file_name.into(),
            contents,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MultipartField::Text { name, .. } | MultipartField::File { name, .. } => name,
        }
    }
}

/// Request body.
#[derive(Clone)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
    Multipart(Vec<MultipartField>),
}

impl fmt::Debug for RequestBody {
    // Form values carry credentials; only field names are printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Form(fields) => f
                .debug_tuple("Form")
                .field(&fields.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>())
                .finish(),
            RequestBody::Json(_) => f.write_str("Json(..)"),
            RequestBody::Multipart(fields) => f
                .debug_tuple("Multipart")
                .field(&fields.iter().map(MultipartField::name).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// One HTTP call to make.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_form<K, V>(url: Url, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self {
            body: Some(RequestBody::Form(fields)),
            ..Self::new(Method::POST, url)
        }
    }

    pub fn post_json(url: Url, body: serde_json::Value) -> Self {
        Self {
            body: Some(RequestBody::Json(body)),
            ..Self::new(Method::POST, url)
        }
    }

    pub fn post_multipart(url: Url, fields: Vec<MultipartField>) -> Self {
        Self {
            body: Some(RequestBody::Multipart(fields)),
            ..Self::new(Method::POST, url)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The request to send after a redirect with `status` to `location`.
    ///
    /// 302 and 303 continue as a bodiless GET; every other status repeats the
    /// original method and body.
    pub(crate) fn redirected(self, location: Url, status: u16) -> Self {
        let (method, body) = match status {
            302 | 303 => (Method::GET, None),
            _ => (self.method, self.body),
        };
        Self {
            method,
            url: location,
            body,
            ..self
        }
    }
}

/// The outcome of one physical HTTP call.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub method: Method,
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpExchange {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..=399).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Location header resolved against the request URL.
    pub fn location(&self) -> Option<Url> {
        let location = self.headers.get(LOCATION)?.to_str().ok()?;
        self.url.join(location.trim()).ok()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        serde_json::from_slice(&self.body).map_err(HttpError::from)
    }

    /// True when the body parses as a JSON object.
    pub fn has_json_object_body(&self) -> bool {
        matches!(
            serde_json::from_slice::<serde_json::Value>(&self.body),
            Ok(serde_json::Value::Object(_))
        )
    }
}
