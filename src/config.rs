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

use serde::{Deserialize, Serialize};
use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::connection::oss::OssSettings;
use crate::connection::transport::TransportSettings;
use crate::utils::{check_range, no_errors, WithSchema};

pub const DEFAULT_ENDPOINT: &str = "https://api.edgecloud.example";
pub const DEFAULT_OSS_REGION: &str = "us-east-1";
pub const DEFAULT_REQUEST_TIMEOUT: i64 = 30;
pub const DEFAULT_RETRY_COUNT: i64 = 3;

/// Content of the `provider "edge"` block
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub endpoint: ValueString<'a>,
    pub scdn_endpoint: ValueString<'a>,
    pub oss_endpoint: ValueString<'a>,
    pub oss_region: ValueString<'a>,
    pub oss_access_key: ValueString<'a>,
    pub oss_secret_key: ValueString<'a>,
    pub request_timeout: ValueNumber,
    pub retry_count: ValueNumber,
}

fn string_attribute(description: &str, sensitive: bool) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        sensitive,
        ..Default::default()
    }
}

impl WithSchema for ProviderConfig<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "access_key" => string_attribute("Access key of the API (env: EDGE_ACCESS_KEY)", false),
                    "secret_key" => string_attribute("Secret key of the API (env: EDGE_SECRET_KEY)", true),
                    "endpoint" => string_attribute("Base URL of the API (env: EDGE_ENDPOINT)", false),
                    "scdn_endpoint" => string_attribute("Base URL of the SCDN API, defaults to `endpoint` (env: EDGE_SCDN_ENDPOINT)", false),
                    "oss_endpoint" => string_attribute("Endpoint of the object storage, object storage is disabled when not set (env: EDGE_OSS_ENDPOINT)", false),
                    "oss_region" => string_attribute("Region of the object storage (env: EDGE_OSS_REGION)", false),
                    "oss_access_key" => string_attribute("Access key of the object storage, defaults to `access_key` (env: EDGE_OSS_ACCESS_KEY)", false),
                    "oss_secret_key" => string_attribute("Secret key of the object storage, defaults to `secret_key` (env: EDGE_OSS_SECRET_KEY)", true),
                    "request_timeout" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("Timeout of a single request in seconds"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "retry_count" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("Number of retries of a failed request (env: EDGE_RETRY_COUNT)"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("Edge cloud CDN, DNS, SSL and object storage"),
                ..Default::default()
            },
        }
    }
}

fn check_endpoint(diags: &mut Diagnostics, url: &str, name: &'static str) {
    let valid = ["http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme) && url.len() > scheme.len());
    if !valid {
        diags.error(
            format!("Invalid `{name}`"),
            format!("`{url}` is not an http:// or https:// URL"),
            AttributePath::new(name),
        );
    }
}

fn check_url(diags: &mut Diagnostics, value: &ValueString, name: &'static str) {
    if let Value::Value(url) = value {
        check_endpoint(diags, url, name);
    }
}

impl<'a> ProviderConfig<'a> {
    /// Check the known values of the configuration
    pub fn validate(&self, diags: &mut Diagnostics) -> Option<()> {
        check_url(diags, &self.endpoint, "endpoint");
        check_url(diags, &self.scdn_endpoint, "scdn_endpoint");
        check_url(diags, &self.oss_endpoint, "oss_endpoint");
        check_range(
            diags,
            &self.request_timeout,
            1..=i64::MAX,
            AttributePath::new("request_timeout"),
        );
        check_range(
            diags,
            &self.retry_count,
            0..=10,
            AttributePath::new("retry_count"),
        );
        no_errors(diags)
    }
}

/// Provider configuration once environment variables and defaults have been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api: TransportSettings,
    pub scdn: TransportSettings,
    pub oss: Option<OssSettings>,
}

impl ResolvedConfig {
    /// Resolve the configuration, looking up missing values with `env`
    pub fn resolve<F>(diags: &mut Diagnostics, config: &ProviderConfig, env: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |value: &ValueString, var: &str| -> Option<String> {
            match value.as_deref_option() {
                Some(s) if !s.is_empty() => Some(s.to_owned()),
                _ => env(var).filter(|s| !s.is_empty()),
            }
        };

        let access_key = lookup(&config.access_key, "EDGE_ACCESS_KEY");
        let secret_key = lookup(&config.secret_key, "EDGE_SECRET_KEY");
        if access_key.is_none() {
            diags.error(
                "Missing access key",
                "Set `access_key` in the provider block or the EDGE_ACCESS_KEY environment variable",
                AttributePath::new("access_key"),
            );
        }
        if secret_key.is_none() {
            diags.error(
                "Missing secret key",
                "Set `secret_key` in the provider block or the EDGE_SECRET_KEY environment variable",
                AttributePath::new("secret_key"),
            );
        }

        let endpoint = lookup(&config.endpoint, "EDGE_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
        let scdn_endpoint = lookup(&config.scdn_endpoint, "EDGE_SCDN_ENDPOINT");
        let oss_endpoint = lookup(&config.oss_endpoint, "EDGE_OSS_ENDPOINT");
        // Environment values bypass `validate`
        check_endpoint(diags, &endpoint, "endpoint");
        if let Some(scdn_endpoint) = &scdn_endpoint {
            check_endpoint(diags, scdn_endpoint, "scdn_endpoint");
        }
        if let Some(oss_endpoint) = &oss_endpoint {
            check_endpoint(diags, oss_endpoint, "oss_endpoint");
        }
        let scdn_endpoint = scdn_endpoint.unwrap_or_else(|| endpoint.clone());
        let timeout = config
            .request_timeout
            .as_ref_option()
            .copied()
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let retry_count = match config.retry_count.as_ref_option() {
            Some(n) => Some(*n),
            None => env("EDGE_RETRY_COUNT").and_then(|s| match s.trim().parse::<i64>() {
                Ok(n) => Some(n),
                Err(err) => {
                    diags.error(
                        "Invalid EDGE_RETRY_COUNT",
                        format!("`{s}` is not a number: {err}"),
                        AttributePath::new("retry_count"),
                    );
                    None
                }
            }),
        }
        .unwrap_or(DEFAULT_RETRY_COUNT);

        if timeout < 1 {
            diags.error(
                "Invalid `request_timeout`",
                format!("{timeout} is out of range, it should be at least 1"),
                AttributePath::new("request_timeout"),
            );
        }
        if !(0..=10).contains(&retry_count) {
            diags.error(
                "Invalid `retry_count`",
                format!("{retry_count} is out of range, it should be between 0 and 10"),
                AttributePath::new("retry_count"),
            );
        }

        let (Some(access_key), Some(secret_key)) = (access_key, secret_key) else {
            return None;
        };
        no_errors(diags)?;

        let timeout = Duration::from_secs(timeout as u64);
        let retry_count = retry_count as u32;

        let oss = oss_endpoint.map(|oss_endpoint| {
            OssSettings {
                endpoint: oss_endpoint,
                region: lookup(&config.oss_region, "EDGE_OSS_REGION")
                    .unwrap_or_else(|| DEFAULT_OSS_REGION.to_owned()),
                access_key: lookup(&config.oss_access_key, "EDGE_OSS_ACCESS_KEY")
                    .unwrap_or_else(|| access_key.clone()),
                secret_key: lookup(&config.oss_secret_key, "EDGE_OSS_SECRET_KEY")
                    .unwrap_or_else(|| secret_key.clone()),
                timeout,
            }
        });

        Some(Self {
            api: TransportSettings {
                base_url: endpoint,
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                timeout,
                retry_count,
            },
            scdn: TransportSettings {
                base_url: scdn_endpoint,
                access_key,
                secret_key,
                timeout,
                retry_count,
            },
            oss,
        })
    }
}
