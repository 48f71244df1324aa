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
use crate::service::{collect_pages, page_query, ObjectId, Page};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SdnsDomain {
    pub id: String,
    pub domain: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ns_servers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddDomainRequest<'r> {
    pub domain: &'r str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<&'r str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<&'r str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SdnsRecord {
    pub id: String,
    pub domain_id: String,
    pub host: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RecordRequest<'r> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'r str>,
    pub domain_id: &'r str,
    pub host: &'r str,
    #[serde(rename = "type")]
    pub record_type: &'r str,
    pub value: &'r str,
    pub ttl: i64,
    pub line: &'r str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<&'r str>,
}

/// Filters of the record listing
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter<'f> {
    pub host: Option<&'f str>,
    pub record_type: Option<&'f str>,
}

/// Smart DNS zones and records
#[derive(Debug, Clone, Copy)]
pub struct SdnsService<'c> {
    client: &'c ApiClient,
}

impl<'c> SdnsService<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    pub async fn add_domain(&self, request: &AddDomainRequest<'_>) -> Result<String> {
        info!(domain = request.domain, "adding DNS domain");
        let created: ObjectId = self.client.post("/v1/sdns/domain", request).await?;
        Ok(created.id)
    }

    pub async fn get_domain(&self, id: &str) -> Result<SdnsDomain> {
        self.client
            .get("/v1/sdns/domain", &[("id", id.to_owned())])
            .await
    }

    pub async fn delete_domain(&self, id: &str) -> Result<()> {
        info!(id, "deleting DNS domain");
        self.client
            .delete("/v1/sdns/domain", &[("id", id.to_owned())])
            .await
    }

    pub async fn list_domains(&self, domain: Option<&str>) -> Result<Vec<SdnsDomain>> {
        collect_pages(|page| async move {
            let mut query = page_query(page);
            if let Some(domain) = domain {
                query.push(("domain", domain.to_owned()));
            }
            self.client
                .get::<Page<SdnsDomain>>("/v1/sdns/domains", &query)
                .await
        })
        .await
    }

    pub async fn add_record(&self, request: &RecordRequest<'_>) -> Result<String> {
        info!(
            domain_id = request.domain_id,
            host = request.host,
            record_type = request.record_type,
            "adding DNS record"
        );
        let created: ObjectId = self.client.post("/v1/sdns/record", request).await?;
        Ok(created.id)
    }

    pub async fn get_record(&self, id: &str) -> Result<SdnsRecord> {
        self.client
            .get("/v1/sdns/record", &[("id", id.to_owned())])
            .await
    }

    pub async fn update_record(&self, request: &RecordRequest<'_>) -> Result<()> {
        info!(id = ?request.id, "updating DNS record");
        self.client.put("/v1/sdns/record", request).await
    }

    pub async fn delete_record(&self, id: &str) -> Result<()> {
        info!(id, "deleting DNS record");
        self.client
            .delete("/v1/sdns/record", &[("id", id.to_owned())])
            .await
    }

    pub async fn list_records(
        &self,
        domain_id: &str,
        filter: RecordFilter<'_>,
    ) -> Result<Vec<SdnsRecord>> {
        collect_pages(|page| async move {
            let mut query = page_query(page);
            query.push(("domain_id", domain_id.to_owned()));
            if let Some(host) = filter.host {
                query.push(("host", host.to_owned()));
            }
            if let Some(record_type) = filter.record_type {
                query.push(("type", record_type.to_owned()));
            }
            self.client
                .get::<Page<SdnsRecord>>("/v1/sdns/records", &query)
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_request_omits_unset_options() {
        let request = RecordRequest {
            id: None,
            domain_id: "d1",
            host: "www",
            record_type: "A",
            value: "192.0.2.1",
            ttl: 600,
            line: "default",
            priority: None,
            weight: None,
            remark: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "domain_id": "d1",
                "host": "www",
                "type": "A",
                "value": "192.0.2.1",
                "ttl": 600,
                "line": "default",
            })
        );
    }

    #[test]
    fn record_priority_is_optional() {
        let record: SdnsRecord = serde_json::from_str(
            r#"{"id":"r1","domain_id":"d1","host":"@","type":"MX","value":"mx.example","priority":10}"#,
        )
        .unwrap();
        assert_eq!(record.priority, Some(10));
        assert_eq!(record.weight, None);
        assert_eq!(record.ttl, 0);
    }
}
