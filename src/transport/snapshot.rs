use reqwest::{Response, StatusCode};
use url::Url;

use crate::error::AuthError;

/// Buffered capture of one HTTP exchange: the resolved URL after any
/// redirects, the status, an optional `Location`, and the full body.
///
/// The body can be inspected any number of times, which lets the classifier
/// and the handler both read the same page.
#[derive(Debug, Clone)]
pub struct Snapshot {
    url: Url,
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl Snapshot {
    pub async fn capture(response: Response) -> Result<Self, AuthError> {
        let url = response.url().clone();
        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(Self {
            url,
            status,
            location,
            body,
        })
    }

    /// Build a snapshot from parts (fixtures and offline inspection).
    pub fn from_parts(url: Url, status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            url,
            status,
            location: None,
            body: body.into(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.body.contains(marker)
    }

    /// Redirect target when this response is a 3xx with a `Location`.
    pub fn redirect_target(&self) -> Result<Option<Url>, AuthError> {
        match (&self.location, self.status.is_redirection()) {
            (Some(location), true) => self.resolve(location).map(Some),
            _ => Ok(None),
        }
    }

    /// Resolve a possibly relative link against this page's URL.
    pub fn resolve(&self, href: &str) -> Result<Url, AuthError> {
        self.url.join(href).map_err(|source| AuthError::InvalidUrl {
            url: href.to_string(),
            source,
        })
    }
}
