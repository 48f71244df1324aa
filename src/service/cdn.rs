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

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::connection::ApiClient;
use crate::error::Result;
use crate::service::{collect_pages, page_query, Page, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DomainInfo {
    #[serde(default)]
    pub id: String,
    pub domain: String,
    #[serde(default)]
    pub cname: String,
    #[serde(rename = "type", default)]
    pub domain_type: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub https_enabled: bool,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Origin {
    pub origin_type: String,
    pub addresses: Vec<String>,
    pub priority: i64,
    pub port: i64,
    pub protocol: String,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OriginHost {
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheRule {
    pub rule_type: String,
    pub pattern: String,
    pub ttl: i64,
    pub ignore_query: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Referer {
    pub referer_type: String,
    pub list: Vec<String>,
    pub allow_empty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IpAccess {
    pub access_type: String,
    pub list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Https {
    pub cert_id: String,
    pub http2: bool,
    pub force_https: String,
    pub ocsp_stapling: bool,
    pub min_tls_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Compress {
    pub enabled: bool,
    pub file_types: Vec<String>,
    pub min_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HeadControl {
    pub direction: String,
    pub action: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Timeouts {
    pub connect_timeout: i64,
    pub read_timeout: i64,
}

/// Configuration items of a domain, absent items are left untouched by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DomainConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Vec<Origin>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_host: Option<OriginHost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_rule: Option<Vec<CacheRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<Referer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_access: Option<IpAccess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<Https>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<Compress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_control: Option<Vec<HeadControl>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Timeouts>,
}

#[derive(Debug, Serialize)]
pub struct AddDomainRequest<'r> {
    pub domain: &'r str,
    #[serde(rename = "type")]
    pub domain_type: &'r str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<&'r str>,
    pub config: &'r DomainConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AddDomainResponse {
    #[serde(default)]
    pub id: String,
    pub domain: String,
    #[serde(default)]
    pub cname: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
struct UpdateConfigRequest<'r> {
    domain: &'r str,
    config: &'r DomainConfig,
    #[serde(skip_serializing_if = "no_items")]
    remove_items: &'r [&'r str],
}

fn no_items(items: &&[&str]) -> bool {
    items.is_empty()
}

#[derive(Debug, Serialize)]
struct StatusRequest<'r> {
    domain: &'r str,
    action: &'r str,
}

#[derive(Debug, Serialize)]
struct PurgeRequest<'r> {
    #[serde(rename = "type")]
    purge_type: &'r str,
    urls: &'r [String],
}

#[derive(Debug, Serialize)]
struct PrefetchRequest<'r> {
    urls: &'r [String],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskInfo {
    pub task_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// CDN domains, configuration, purge and prefetch
#[derive(Debug, Clone, Copy)]
pub struct CdnService<'c> {
    client: &'c ApiClient,
}

impl<'c> CdnService<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    pub async fn add_domain(&self, request: &AddDomainRequest<'_>) -> Result<AddDomainResponse> {
        info!(domain = request.domain, "adding CDN domain");
        self.client.post("/v1/cdn/domain", request).await
    }

    pub async fn get_domain(&self, domain: &str) -> Result<DomainInfo> {
        self.client
            .get("/v1/cdn/domain", &[("domain", domain.to_owned())])
            .await
    }

    pub async fn list_domains(&self, status: Option<&str>) -> Result<Vec<DomainInfo>> {
        collect_pages(|page| async move {
            let mut query = page_query(page);
            if let Some(status) = status {
                query.push(("status", status.to_owned()));
            }
            self.client
                .get::<Page<DomainInfo>>("/v1/cdn/domains", &query)
                .await
        })
        .await
    }

    pub async fn get_domain_config(&self, domain: &str, items: &[&str]) -> Result<DomainConfig> {
        let mut query = vec![("domain", domain.to_owned())];
        if !items.is_empty() {
            query.push(("config_item", items.join(",")));
        }
        self.client.get("/v1/cdn/domain/config", &query).await
    }

    pub async fn update_domain_config(
        &self,
        domain: &str,
        config: &DomainConfig,
        remove_items: &[&str],
    ) -> Result<()> {
        info!(domain, ?remove_items, "updating CDN domain configuration");
        self.client
            .put(
                "/v1/cdn/domain/config",
                &UpdateConfigRequest {
                    domain,
                    config,
                    remove_items,
                },
            )
            .await
    }

    /// Enable or disable a domain
    pub async fn set_domain_status(&self, domain: &str, enabled: bool) -> Result<()> {
        let action = if enabled { "enable" } else { "disable" };
        info!(domain, action, "changing CDN domain status");
        self.client
            .put("/v1/cdn/domain/status", &StatusRequest { domain, action })
            .await
    }

    pub async fn delete_domain(&self, domain: &str) -> Result<()> {
        info!(domain, "deleting CDN domain");
        self.client
            .delete("/v1/cdn/domain", &[("domain", domain.to_owned())])
            .await
    }

    pub async fn purge(&self, purge_type: &str, urls: &[String]) -> Result<TaskId> {
        info!(purge_type, count = urls.len(), "submitting purge");
        self.client
            .post("/v1/cdn/purge", &PurgeRequest { purge_type, urls })
            .await
    }

    pub async fn get_purge_task(&self, task_id: &str) -> Result<TaskInfo> {
        self.client
            .get("/v1/cdn/purge", &[("task_id", task_id.to_owned())])
            .await
    }

    pub async fn prefetch(&self, urls: &[String]) -> Result<TaskId> {
        info!(count = urls.len(), "submitting prefetch");
        self.client
            .post("/v1/cdn/prefetch", &PrefetchRequest { urls })
            .await
    }

    pub async fn get_prefetch_task(&self, task_id: &str) -> Result<TaskInfo> {
        self.client
            .get("/v1/cdn/prefetch", &[("task_id", task_id.to_owned())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_items_are_not_serialized() {
        let config = DomainConfig {
            origin_host: Some(OriginHost {
                host: "origin.example".into(),
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&config).unwrap(),
            r#"{"origin_host":{"host":"origin.example"}}"#
        );
    }

    #[test]
    fn update_request_skips_empty_removals() {
        let config = DomainConfig::default();
        let request = UpdateConfigRequest {
            domain: "a.example",
            config: &config,
            remove_items: &[],
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"domain":"a.example","config":{}}"#
        );
        let request = UpdateConfigRequest {
            remove_items: &["referer"],
            ..request
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"domain":"a.example","config":{},"remove_items":["referer"]}"#
        );
    }

    #[test]
    fn domain_info_type_is_renamed() {
        let info: DomainInfo = serde_json::from_str(
            r#"{"domain":"a.example","type":"web","status":"online","https_enabled":true}"#,
        )
        .unwrap();
        assert_eq!(info.domain_type, "web");
        assert!(info.https_enabled);
        assert_eq!(info.cname, "");
    }
}
