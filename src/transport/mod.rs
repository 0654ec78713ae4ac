//! Cookie-carrying HTTP session for the sign-in conversation.
//!
//! All requests in one authentication go through a single [`Transport`]. It
//! owns the cookie jar, stamps every request with the client identity, and
//! exposes a session-wide switch for redirect following. Two `reqwest`
//! clients share the jar: one follows redirects, the other returns 3xx
//! responses as-is.

mod snapshot;

pub use snapshot::Snapshot;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::AuthError;

/// Identity string sent as `User-Agent` on every request.
pub fn client_identity() -> String {
    format!(
        "{}/{} ({} {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Settings applied to both underlying clients.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept invalid TLS certificates (self-signed federation servers).
    pub skip_verify: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            skip_verify: false,
        }
    }
}

pub struct Transport {
    options: TransportOptions,
    jar: Arc<Jar>,
    following: Client,
    manual: Client,
    follow_redirects: bool,
}

impl Transport {
    pub fn new(options: TransportOptions) -> Result<Self, AuthError> {
        let jar = Arc::new(Jar::default());
        let (following, manual) = build_clients(&options, &jar)?;
        Ok(Self {
            options,
            jar,
            following,
            manual,
            follow_redirects: true,
        })
    }

    fn client(&self) -> &Client {
        if self.follow_redirects {
            &self.following
        } else {
            &self.manual
        }
    }

    /// Start a request on the currently active client.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client().request(method, url)
    }

    /// Send a request built by [`Transport::request`].
    ///
    /// Transport errors are returned unchanged; nothing here retries.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, AuthError> {
        let response = request.send().await?;
        debug!(
            status = %response.status(),
            url = %response.url(),
            follow_redirects = self.follow_redirects,
            "received response"
        );
        Ok(response)
    }

    pub async fn get(&self, url: Url) -> Result<Response, AuthError> {
        debug!(%url, "GET");
        self.send(self.request(Method::GET, url)).await
    }

    /// POST a raw body with an explicit content type.
    pub async fn post(
        &self,
        url: Url,
        body: impl Into<reqwest::Body>,
        content_type: &str,
    ) -> Result<Response, AuthError> {
        debug!(%url, content_type, "POST");
        let request = self
            .request(Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        self.send(request).await
    }

    /// POST `application/x-www-form-urlencoded` fields in the given order.
    pub async fn post_form(
        &self,
        url: Url,
        fields: &[(String, String)],
    ) -> Result<Response, AuthError> {
        debug!(%url, fields = fields.len(), "POST form");
        self.send(self.request(Method::POST, url).form(fields)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<Response, AuthError> {
        debug!(%url, "POST json");
        self.send(self.request(Method::POST, url).json(body)).await
    }

    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn disable_redirects(&mut self) {
        self.follow_redirects = false;
    }

    pub fn enable_redirects(&mut self) {
        self.follow_redirects = true;
    }

    /// Disable redirect following until the returned guard is dropped.
    ///
    /// The previous setting is restored on drop, so early returns through
    /// `?` leave the session as they found it.
    pub fn without_redirects(&mut self) -> RedirectsDisabled<'_> {
        let previous = self.follow_redirects;
        self.follow_redirects = false;
        RedirectsDisabled {
            transport: self,
            previous,
        }
    }

    /// Drop every cookie and start a clean session.
    pub fn reset_cookies(&mut self) -> Result<(), AuthError> {
        let jar = Arc::new(Jar::default());
        let (following, manual) = build_clients(&self.options, &jar)?;
        self.jar = jar;
        self.following = following;
        self.manual = manual;
        debug!("cookie jar reset");
        Ok(())
    }

    /// Cookie header the jar would send to `url`, if any.
    #[cfg(test)]
    fn cookies_for(&self, url: &Url) -> Option<String> {
        use reqwest::cookie::CookieStore;

        self.jar
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

fn build_clients(options: &TransportOptions, jar: &Arc<Jar>) -> Result<(Client, Client), AuthError> {
    let builder = || {
        Client::builder()
            .user_agent(client_identity())
            .cookie_provider(Arc::clone(jar))
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.skip_verify)
    };

    let following = builder().build()?;
    let manual = builder().redirect(Policy::none()).build()?;
    Ok((following, manual))
}

/// Scoped redirect suppression returned by [`Transport::without_redirects`].
pub struct RedirectsDisabled<'a> {
    transport: &'a mut Transport,
    previous: bool,
}

impl Deref for RedirectsDisabled<'_> {
    type Target = Transport;

    fn deref(&self) -> &Transport {
        self.transport
    }
}

impl DerefMut for RedirectsDisabled<'_> {
    fn deref_mut(&mut self) -> &mut Transport {
        self.transport
    }
}

impl Drop for RedirectsDisabled<'_> {
    fn drop(&mut self) {
        self.transport.follow_redirects = self.previous;
    }
}
