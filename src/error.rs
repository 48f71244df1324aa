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

use thiserror::Error;

/// Errors raised by the connectivity clients and the services built on top of them
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Could not decode API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Object storage error: {0}")]
    Oss(String),
    #[error("`{0}` is not configured in the provider block")]
    NotConfigured(&'static str),
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Check if the error means the remote object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected() {
        assert!(Error::NotFound("domain".into()).is_not_found());
        assert!(!Error::Api {
            code: 500,
            message: "boom".into()
        }
        .is_not_found());
    }

    #[test]
    fn api_error_message() {
        let err = Error::Api {
            code: 40001,
            message: "invalid domain".into(),
        };
        assert_eq!(err.to_string(), "API error 40001: invalid domain");
    }
}
