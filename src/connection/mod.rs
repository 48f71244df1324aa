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

use std::sync::Arc;

use tf_provider::Diagnostics;
use tokio::sync::RwLock;

use crate::config::ResolvedConfig;
use crate::error::Result;

pub mod api;
pub mod oss;
pub mod scdn;
pub mod transport;

pub use api::ApiClient;
pub use oss::OssClient;
pub use scdn::ScdnClient;

/// Clients built from the provider configuration
#[derive(Debug)]
pub struct Clients {
    pub api: ApiClient,
    pub scdn: ScdnClient,
    pub oss: OssClient,
}

impl Clients {
    pub fn new(config: &ResolvedConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(config.api.clone())?,
            scdn: ScdnClient::new(config.scdn.clone())?,
            oss: OssClient::new(config.oss.clone()),
        })
    }
}

/// Handle shared by the provider and every resource and data source
///
/// The handle is cloned at registration time and filled when the provider is configured.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    clients: Arc<RwLock<Option<Arc<Clients>>>>,
}

impl Connection {
    pub async fn configure(&self, clients: Clients) {
        *self.clients.write().await = Some(Arc::new(clients));
    }

    pub async fn is_configured(&self) -> bool {
        self.clients.read().await.is_some()
    }

    /// Get the clients, or report that the provider has not been configured
    pub async fn get(&self, diags: &mut Diagnostics) -> Option<Arc<Clients>> {
        let clients = self.clients.read().await.clone();
        if clients.is_none() {
            diags.root_error(
                "Provider is not configured",
                "The provider must be configured before resources and data sources can be used",
            );
        }
        clients
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::transport::TransportSettings;
    use super::*;

    fn settings() -> TransportSettings {
        TransportSettings {
            base_url: "http://127.0.0.1:1".into(),
            access_key: "ak".into(),
            secret_key: "sk".into(),
            timeout: Duration::from_secs(1),
            retry_count: 0,
        }
    }

    #[tokio::test]
    async fn unconfigured_connection_reports_error() {
        let connection = Connection::default();
        let mut diags = Diagnostics::default();
        assert!(connection.get(&mut diags).await.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "Provider is not configured");
    }

    #[tokio::test]
    async fn clones_share_configuration() {
        let connection = Connection::default();
        let registered = connection.clone();
        let config = ResolvedConfig {
            api: settings(),
            scdn: settings(),
            oss: None,
        };
        connection.configure(Clients::new(&config).unwrap()).await;

        let mut diags = Diagnostics::default();
        let clients = registered.get(&mut diags).await.unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(clients.api.endpoint(), "http://127.0.0.1:1");
        assert!(!clients.oss.is_configured());
        assert!(registered.is_configured().await);
    }
}
