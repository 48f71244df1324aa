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
use crate::service::{collect_pages, page_query, Page};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DomainGroup {
    pub group_id: String,
    pub group_name: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct GroupRequest<'r> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<&'r str>,
    pub group_name: &'r str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<&'r str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<&'r [String]>,
}

#[derive(Debug, Serialize)]
struct BindRequest<'r> {
    group_id: &'r str,
    domains: &'r [String],
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct CreatedGroup {
    group_id: String,
}

/// Groups of CDN domains
#[derive(Debug, Clone, Copy)]
pub struct DomainGroupService<'c> {
    client: &'c ApiClient,
}

impl<'c> DomainGroupService<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &GroupRequest<'_>) -> Result<String> {
        info!(group_name = request.group_name, "creating domain group");
        let created: CreatedGroup = self.client.post("/v1/domain/group", request).await?;
        Ok(created.group_id)
    }

    pub async fn get(&self, group_id: &str) -> Result<DomainGroup> {
        self.client
            .get("/v1/domain/group", &[("group_id", group_id.to_owned())])
            .await
    }

    pub async fn update(&self, request: &GroupRequest<'_>) -> Result<()> {
        info!(group_id = ?request.group_id, "updating domain group");
        self.client.put("/v1/domain/group", request).await
    }

    pub async fn delete(&self, group_id: &str) -> Result<()> {
        info!(group_id, "deleting domain group");
        self.client
            .delete("/v1/domain/group", &[("group_id", group_id.to_owned())])
            .await
    }

    pub async fn bind_domains(&self, group_id: &str, domains: &[String]) -> Result<()> {
        if domains.is_empty() {
            return Ok(());
        }
        info!(group_id, ?domains, "binding domains");
        self.client
            .post("/v1/domain/group/bind", &BindRequest { group_id, domains })
            .await
    }

    pub async fn unbind_domains(&self, group_id: &str, domains: &[String]) -> Result<()> {
        if domains.is_empty() {
            return Ok(());
        }
        info!(group_id, ?domains, "unbinding domains");
        self.client
            .post("/v1/domain/group/unbind", &BindRequest { group_id, domains })
            .await
    }

    pub async fn list(&self) -> Result<Vec<DomainGroup>> {
        collect_pages(|page| async move {
            self.client
                .get::<Page<DomainGroup>>("/v1/domain/groups", &page_query(page))
                .await
        })
        .await
    }
}

/// Domains to bind and to unbind to go from `prior` to `planned`
pub fn membership_diff(prior: &[String], planned: &[String]) -> (Vec<String>, Vec<String>) {
    let bind = planned
        .iter()
        .filter(|d| !prior.contains(d))
        .cloned()
        .collect();
    let unbind = prior
        .iter()
        .filter(|d| !planned.contains(d))
        .cloned()
        .collect();
    (bind, unbind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_membership() {
        let (bind, unbind) = membership_diff(
            &strings(&["a.example", "b.example"]),
            &strings(&["b.example", "c.example"]),
        );
        assert_eq!(bind, strings(&["c.example"]));
        assert_eq!(unbind, strings(&["a.example"]));
    }

    #[test]
    fn unchanged_membership() {
        let same = strings(&["a.example"]);
        let (bind, unbind) = membership_diff(&same, &same);
        assert!(bind.is_empty());
        assert!(unbind.is_empty());
    }
}
