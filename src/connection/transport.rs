// This file is part of the terraform-provider-edge project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const HEADER_ACCESS_KEY: &str = "X-Auth-Access-Key";
pub const HEADER_TIMESTAMP: &str = "X-Auth-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-Auth-Signature";

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_MAX: Duration = Duration::from_secs(8);

/// Everything needed to reach one of the REST endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub base_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub timeout: Duration,
    pub retry_count: u32,
}

/// Signed HTTP transport with retries, shared by the REST clients
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    settings: TransportSettings,
}

/// Raw answer of the remote endpoint
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Transport {
    pub fn new(settings: TransportSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    /// Send a request, retrying transport errors, throttling and server errors
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<RawResponse> {
        let body = match body {
            Some(body) => Some(serde_json::to_vec(body)?),
            None => None,
        };
        let url = format!("{}{}", self.settings.base_url.trim_end_matches('/'), path);

        let mut attempt = 0;
        loop {
            let timestamp = OffsetDateTime::now_utc().unix_timestamp().to_string();
            let signature = sign(
                &self.settings.secret_key,
                method.as_str(),
                path,
                &timestamp,
                body.as_deref().unwrap_or_default(),
            )?;

            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(HEADER_ACCESS_KEY, &self.settings.access_key)
                .header(HEADER_TIMESTAMP, &timestamp)
                .header(HEADER_SIGNATURE, signature);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = &body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }

            debug!(%method, %url, attempt, "sending request");
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable(status) || attempt >= self.settings.retry_count {
                        let body = response.bytes().await?.to_vec();
                        debug!(%method, %url, %status, "received response");
                        return Ok(RawResponse { status, body });
                    }
                    warn!(%method, %url, %status, attempt, "request failed, retrying");
                }
                Err(err) if attempt < self.settings.retry_count => {
                    warn!(%method, %url, attempt, error = %err, "request failed, retrying");
                }
                Err(err) => return Err(err.into()),
            }

            tokio::time::sleep(backoff(attempt)).await;
            attempt += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before the retry following `attempt`
pub(crate) fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE
        .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
        .map_or(BACKOFF_MAX, |delay| delay.min(BACKOFF_MAX))
}

/// Compute the request signature
///
/// The signed string is `METHOD\nPATH\nTIMESTAMP\nhex(sha256(body))`,
/// and the signature is the hex encoded HMAC-SHA256 of it.
pub fn sign(
    secret_key: &str,
    method: &str,
    path: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<String> {
    let body_hash = format!("{:x}", Sha256::digest(body));
    let string_to_sign = format!("{method}\n{path}\n{timestamp}\n{body_hash}");

    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .map_err(|err| Error::InvalidConfig(format!("invalid secret key: {err}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(4));
        assert_eq!(backoff(4), Duration::from_secs(8));
        assert_eq!(backoff(10), Duration::from_secs(8));
        assert_eq!(backoff(40), Duration::from_secs(8));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn signature_is_stable() {
        let a = sign("secret", "GET", "/v1/cdn/domain", "1700000000", b"").unwrap();
        let b = sign("secret", "GET", "/v1/cdn/domain", "1700000000", b"").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_covers_every_part() {
        let base = sign("secret", "POST", "/p", "1", b"{}").unwrap();
        assert_ne!(base, sign("other", "POST", "/p", "1", b"{}").unwrap());
        assert_ne!(base, sign("secret", "PUT", "/p", "1", b"{}").unwrap());
        assert_ne!(base, sign("secret", "POST", "/q", "1", b"{}").unwrap());
        assert_ne!(base, sign("secret", "POST", "/p", "2", b"{}").unwrap());
        assert_ne!(base, sign("secret", "POST", "/p", "1", b"[]").unwrap());
    }
}
