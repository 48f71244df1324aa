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

use crate::connection::ScdnClient;
use crate::error::{Error, Result};
use crate::service::{collect_pages, page_query, Page};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfCacheRule {
    pub cachetime: i64,
    #[serde(default)]
    pub ignore_cache_time: bool,
    #[serde(default)]
    pub ignore_nocache_header: bool,
    #[serde(default)]
    pub no_cache_control_op: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BrowserCacheRule {
    pub cache_type: String,
    #[serde(default)]
    pub ignore_cache_time: bool,
    #[serde(default)]
    pub cachetime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheErrStatus {
    pub cachetime: i64,
    pub err_status: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheUrlRewrite {
    #[serde(default)]
    pub sort_querystring: bool,
    #[serde(default)]
    pub ignore_all_query_string: bool,
    #[serde(default)]
    pub query_args: Vec<String>,
    #[serde(default)]
    pub cookies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheShare {
    pub scheme: String,
}

/// Behaviour of a cache rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheConf {
    #[serde(default)]
    pub nocache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_rule: Option<ConfCacheRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub browser_cache_rule: Vec<BrowserCacheRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cache_errstatus: Vec<CacheErrStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_url_rewrite: Option<CacheUrlRewrite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_share: Option<CacheShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheRuleInfo {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub conf: CacheConf,
}

/// Owner of a set of rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Business<'b> {
    pub business_id: i64,
    pub business_type: &'b str,
}

#[derive(Debug, Serialize)]
pub struct CacheRuleRequest<'r> {
    #[serde(flatten)]
    pub business: Business<'r>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: &'r str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub remark: &'r str,
    pub expr: &'r str,
    pub conf: &'r CacheConf,
}

#[derive(Debug, Serialize)]
struct RuleIdsRequest<'r> {
    #[serde(flatten)]
    business: Business<'r>,
    ids: &'r [i64],
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'r str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct CreatedRule {
    id: i64,
}

/// Cache rules of the SCDN
#[derive(Debug, Clone, Copy)]
pub struct ScdnCacheService<'c> {
    client: &'c ScdnClient,
}

impl<'c> ScdnCacheService<'c> {
    pub fn new(client: &'c ScdnClient) -> Self {
        Self { client }
    }

    pub async fn list_rules(&self, business: Business<'_>) -> Result<Vec<CacheRuleInfo>> {
        collect_pages(|page| async move {
            let mut query = page_query(page);
            query.push(("business_id", business.business_id.to_string()));
            query.push(("business_type", business.business_type.to_owned()));
            self.client
                .get::<Page<CacheRuleInfo>>("/api/v5/scdn/cache/rules", &query)
                .await
        })
        .await
    }

    /// Find a single rule, the API only lists them
    pub async fn get_rule(&self, business: Business<'_>, id: i64) -> Result<CacheRuleInfo> {
        self.list_rules(business)
            .await?
            .into_iter()
            .find(|rule| rule.id == id)
            .ok_or_else(|| Error::NotFound(format!("cache rule {id}")))
    }

    pub async fn add_rule(&self, request: &CacheRuleRequest<'_>) -> Result<i64> {
        info!(
            business_id = request.business.business_id,
            name = request.name,
            "adding cache rule"
        );
        let created: CreatedRule = self
            .client
            .post("/api/v5/scdn/cache/rule", request)
            .await?;
        Ok(created.id)
    }

    pub async fn update_rule(&self, request: &CacheRuleRequest<'_>) -> Result<()> {
        info!(id = ?request.id, "updating cache rule");
        self.client.put("/api/v5/scdn/cache/rule", request).await
    }

    pub async fn delete_rule(&self, business: Business<'_>, id: i64) -> Result<()> {
        info!(business_id = business.business_id, id, "deleting cache rule");
        self.client
            .delete(
                "/api/v5/scdn/cache/rule",
                &RuleIdsRequest {
                    business,
                    ids: &[id],
                    status: None,
                },
            )
            .await
    }

    pub async fn set_rule_status(&self, business: Business<'_>, id: i64, status: &str) -> Result<()> {
        info!(id, status, "changing cache rule status");
        self.client
            .put(
                "/api/v5/scdn/cache/rule/status",
                &RuleIdsRequest {
                    business,
                    ids: &[id],
                    status: Some(status),
                },
            )
            .await
    }

    /// Reorder the rules, the first id gets the highest priority
    pub async fn sort_rules(&self, business: Business<'_>, ids: &[i64]) -> Result<()> {
        info!(business_id = business.business_id, ?ids, "sorting cache rules");
        self.client
            .put(
                "/api/v5/scdn/cache/rules/sort",
                &RuleIdsRequest {
                    business,
                    ids,
                    status: None,
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_flattens_business() {
        let conf = CacheConf {
            nocache: true,
            ..Default::default()
        };
        let request = CacheRuleRequest {
            business: Business {
                business_id: 7,
                business_type: "domain",
            },
            id: None,
            name: "static",
            remark: "",
            expr: "$uri ~ \"\\.js$\"",
            conf: &conf,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "business_id": 7,
                "business_type": "domain",
                "name": "static",
                "expr": "$uri ~ \"\\.js$\"",
                "conf": {"nocache": true},
            })
        );
    }

    #[test]
    fn rule_without_conf_decodes() {
        let rule: CacheRuleInfo =
            serde_json::from_str(r#"{"id":3,"name":"r","status":"on","weight":2}"#).unwrap();
        assert_eq!(rule.id, 3);
        assert_eq!(rule.conf, CacheConf::default());
    }
}
