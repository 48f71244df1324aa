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

/// Certificate as returned by the API, the private key is never returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CertificateInfo {
    pub cert_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub not_before: String,
    #[serde(default)]
    pub not_after: String,
}

#[derive(Debug, Serialize)]
pub struct CertificateRequest<'r> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_id: Option<&'r str>,
    pub name: &'r str,
    pub certificate: &'r str,
    pub private_key: &'r str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct CreatedCertificate {
    cert_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SslCertificateService<'c> {
    client: &'c ApiClient,
}

impl<'c> SslCertificateService<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    /// Upload a certificate and return its id
    pub async fn create(&self, request: &CertificateRequest<'_>) -> Result<String> {
        info!(name = request.name, "uploading certificate");
        let created: CreatedCertificate = self.client.post("/v1/ssl/certificate", request).await?;
        Ok(created.cert_id)
    }

    pub async fn get(&self, cert_id: &str) -> Result<CertificateInfo> {
        self.client
            .get("/v1/ssl/certificate", &[("cert_id", cert_id.to_owned())])
            .await
    }

    pub async fn update(&self, request: &CertificateRequest<'_>) -> Result<()> {
        info!(cert_id = ?request.cert_id, "updating certificate");
        self.client.put("/v1/ssl/certificate", request).await
    }

    pub async fn delete(&self, cert_id: &str) -> Result<()> {
        info!(cert_id, "deleting certificate");
        self.client
            .delete("/v1/ssl/certificate", &[("cert_id", cert_id.to_owned())])
            .await
    }

    pub async fn list(&self) -> Result<Vec<CertificateInfo>> {
        collect_pages(|page| async move {
            self.client
                .get::<Page<CertificateInfo>>("/v1/ssl/certificates", &page_query(page))
                .await
        })
        .await
    }
}
