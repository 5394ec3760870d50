use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::serve::ResolveError;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// What an artifact-fetch endpoint should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResponse {
  status: StatusCode,
  headers: HeaderMap,
  body: Option<String>,
}

impl ArtifactResponse {
  /// A 307 redirect whose `location` is the artifact key.
  pub fn redirect(location: &str) -> Result<Self, ResolveError> {
    let value = HeaderValue::from_str(location).map_err(|_| ResolveError::InvalidLocation(location.to_string()))?;
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, value);
    Ok(Self {
      status: StatusCode::TEMPORARY_REDIRECT,
      headers,
      body: None,
    })
  }

  /// A 200 response carrying a plain-text body.
  pub fn inline_text(body: impl Into<String>) -> Self {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    Self {
      status: StatusCode::OK,
      headers,
      body: Some(body.into()),
    }
  }

  pub fn status(&self) -> StatusCode {
    self.status
  }

  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  pub fn location(&self) -> Option<&str> {
    self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
  }

  pub fn content_type(&self) -> Option<&str> {
    self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
  }

  pub fn body(&self) -> Option<&str> {
    self.body.as_deref()
  }

  pub fn is_redirect(&self) -> bool {
    self.status.is_redirection()
  }
}
