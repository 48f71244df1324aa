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

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::connection::transport::{RawResponse, Transport, TransportSettings};
use crate::error::{Error, Result};

/// Client of the main REST API (CDN, SSL, DNS, domain groups)
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Transport,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ApiClient {
    pub fn new(settings: TransportSettings) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(settings)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.transport.base_url()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .transport
            .send::<()>(Method::GET, path, query, None)
            .await?;
        decode(path, response)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .transport
            .send(Method::POST, path, &[], Some(body))
            .await?;
        decode(path, response)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .transport
            .send(Method::PUT, path, &[], Some(body))
            .await?;
        decode(path, response)
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .transport
            .send::<()>(Method::DELETE, path, query, None)
            .await?;
        decode(path, response)
    }
}

fn decode<T: DeserializeOwned>(path: &str, response: RawResponse) -> Result<T> {
    if response.status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(path.to_owned()));
    }

    let envelope: Envelope = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(_) if !response.status.is_success() => {
            return Err(Error::Api {
                code: response.status.as_u16() as i64,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            })
        }
        Err(err) => return Err(err.into()),
    };

    match envelope.code {
        0 => Ok(serde_json::from_value(envelope.data)?),
        404 => Err(Error::NotFound(if envelope.msg.is_empty() {
            path.to_owned()
        } else {
            envelope.msg
        })),
        code => Err(Error::Api {
            code,
            message: envelope.msg,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: StatusCode, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        id: String,
    }

    #[test]
    fn success_returns_data() {
        let answer: Answer = decode(
            "/x",
            raw(StatusCode::OK, r#"{"code":0,"msg":"ok","data":{"id":"42"}}"#),
        )
        .unwrap();
        assert_eq!(answer, Answer { id: "42".into() });
    }

    #[test]
    fn missing_data_decodes_to_unit() {
        let () = decode("/x", raw(StatusCode::OK, r#"{"code":0}"#)).unwrap();
    }

    #[test]
    fn not_found_from_status_or_code() {
        let err = decode::<()>("/x", raw(StatusCode::NOT_FOUND, "")).unwrap_err();
        assert!(err.is_not_found());
        let err = decode::<()>(
            "/x",
            raw(StatusCode::OK, r#"{"code":404,"msg":"domain does not exist"}"#),
        )
        .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Resource not found: domain does not exist");
    }

    #[test]
    fn api_error_keeps_code_and_message() {
        let err = decode::<()>(
            "/x",
            raw(StatusCode::OK, r#"{"code":40001,"msg":"invalid domain"}"#),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Api { code: 40001, ref message } if message == "invalid domain"));
    }

    #[test]
    fn non_json_failure_uses_http_status() {
        let err = decode::<()>("/x", raw(StatusCode::FORBIDDEN, "denied")).unwrap_err();
        assert!(matches!(err, Error::Api { code: 403, ref message } if message == "denied"));
    }
}
