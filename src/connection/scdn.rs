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

/// Client of the SCDN API, which answers with a `status` object instead of a flat code
#[derive(Debug, Clone)]
pub struct ScdnClient {
    transport: Transport,
}

#[derive(Debug, Deserialize)]
struct Status {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Status,
    #[serde(default)]
    data: serde_json::Value,
}

impl ScdnClient {
    pub fn new(settings: TransportSettings) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(settings)?,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.call::<(), T>(Method::GET, path, query, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(Method::PUT, path, &[], Some(body)).await
    }

    /// DELETE with a JSON body, as the SCDN API expects for batch deletions
    pub async fn delete<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(Method::DELETE, path, &[], Some(body)).await
    }

    async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.transport.send(method, path, query, body).await?;
        decode(path, response)
    }
}

fn is_not_found_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("not exist") || message.contains("not found")
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

    match envelope.status {
        Status { code: 1, .. } => Ok(serde_json::from_value(envelope.data)?),
        Status { message, .. } if is_not_found_message(&message) => Err(Error::NotFound(message)),
        Status { code, message } => Err(Error::Api { code, message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::OK,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn code_one_is_success() {
        let ids: Vec<i64> = decode(
            "/r",
            raw(r#"{"status":{"code":1,"message":"success"},"data":[1,2]}"#),
        )
        .unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn zero_is_an_error_here() {
        let err = decode::<()>("/r", raw(r#"{"status":{"code":0,"message":"bad conf"}}"#))
            .unwrap_err();
        assert!(matches!(err, Error::Api { code: 0, ref message } if message == "bad conf"));
    }

    #[test]
    fn missing_objects_are_not_found() {
        let err = decode::<()>(
            "/r",
            raw(r#"{"status":{"code":2,"message":"Rule does Not Exist"}}"#),
        )
        .unwrap_err();
        assert!(err.is_not_found());
        let err = decode::<()>("/r", raw(r#"{"status":{"code":2,"message":"task not found"}}"#))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
