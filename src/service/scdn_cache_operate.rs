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
use crate::error::Result;
use crate::service::TaskId;

#[derive(Debug, Serialize)]
pub struct CleanRequest<'r> {
    pub protocol: &'r str,
    pub wildcard: bool,
    #[serde(skip_serializing_if = "no_items")]
    pub urls: &'r [String],
    #[serde(skip_serializing_if = "no_items")]
    pub dirs: &'r [String],
}

fn no_items(items: &&[String]) -> bool {
    items.is_empty()
}

#[derive(Debug, Serialize)]
pub struct PreheatRequest<'r> {
    pub protocol: &'r str,
    pub urls: &'r [String],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheTask {
    pub task_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: i64,
}

/// Cache cleaning and preheating of the SCDN
#[derive(Debug, Clone, Copy)]
pub struct ScdnCacheOperateService<'c> {
    client: &'c ScdnClient,
}

impl<'c> ScdnCacheOperateService<'c> {
    pub fn new(client: &'c ScdnClient) -> Self {
        Self { client }
    }

    pub async fn clean(&self, request: &CleanRequest<'_>) -> Result<String> {
        info!(
            protocol = request.protocol,
            urls = request.urls.len(),
            dirs = request.dirs.len(),
            "submitting cache clean"
        );
        let task: TaskId = self
            .client
            .post("/api/v5/scdn/cache/clean", request)
            .await?;
        Ok(task.task_id)
    }

    pub async fn preheat(&self, request: &PreheatRequest<'_>) -> Result<String> {
        info!(
            protocol = request.protocol,
            urls = request.urls.len(),
            "submitting cache preheat"
        );
        let task: TaskId = self
            .client
            .post("/api/v5/scdn/cache/preheat", request)
            .await?;
        Ok(task.task_id)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<CacheTask> {
        self.client
            .get("/api/v5/scdn/cache/task", &[("task_id", task_id.to_owned())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_request_skips_empty_lists() {
        let urls = vec!["https://a.example/x".to_owned()];
        let request = CleanRequest {
            protocol: "all",
            wildcard: false,
            urls: &urls,
            dirs: &[],
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"protocol":"all","wildcard":false,"urls":["https://a.example/x"]}"#
        );
    }
}
