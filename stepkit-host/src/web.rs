//! Outbound web requests made on behalf of handlers.
//!
//! Handler code never opens sockets itself. Every fetch goes through a
//! [`WebClient`]; inside an isolation domain that client forwards the URL to
//! the caller, which authorizes it against the domain's grant and performs
//! the request with [`GrantedWebClient`].

use crate::grant::CapabilityGrant;
use reqwest::redirect;
use std::time::Duration;
use stepkit_model::WebError;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;
/// Largest response body handed back to a handler.
pub const MAX_RESPONSE_BYTES: u64 = 8 * 1024 * 1024;
const USER_AGENT: &str = concat!("stepkit/", env!("CARGO_PKG_VERSION"));

/// Performs a GET on behalf of a handler.
pub trait WebClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, WebError>;
}

/// Fetches over HTTP(S) after checking the URL, and every redirect target,
/// against a grant.
pub struct GrantedWebClient<'a> {
    grant: &'a CapabilityGrant,
}

impl<'a> GrantedWebClient<'a> {
    pub fn new(grant: &'a CapabilityGrant) -> Self {
        Self { grant }
    }
}

impl WebClient for GrantedWebClient<'_> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, WebError> {
        self.grant.authorize_web_request(url)?;

        let failed = |reason: String| WebError::Failed {
            url: url.to_string(),
            reason,
        };

        let redirect_grant = self.grant.clone();
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    return attempt.error("too many redirects");
                }
                match redirect_grant.authorize_web_request(attempt.url().as_str()) {
                    Ok(()) => attempt.follow(),
                    Err(err) => attempt.error(err),
                }
            }))
            .build()
            .map_err(|e| failed(format!("HTTP client init failed: {e}")))?;

        let resp = client
            .get(url)
            .send()
            .map_err(|e| failed(format!("fetch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(failed(format!("HTTP {}", resp.status())));
        }
        if resp
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BYTES)
        {
            return Err(failed(format!(
                "response larger than {MAX_RESPONSE_BYTES} bytes"
            )));
        }

        let body = resp
            .bytes()
            .map_err(|e| failed(format!("failed to read response body: {e}")))?;
        if body.len() as u64 > MAX_RESPONSE_BYTES {
            return Err(failed(format!(
                "response larger than {MAX_RESPONSE_BYTES} bytes"
            )));
        }

        debug!(url, bytes = body.len(), "Fetched URL for handler");
        Ok(body.to_vec())
    }
}
