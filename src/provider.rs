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

use std::collections::HashMap;

use async_trait::async_trait;
use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{map, Diagnostics, DynamicDataSource, DynamicResource, Provider};
use tracing::info;

use crate::cdn::{CdnDomainDataSource, CdnDomainResource, CdnDomainsDataSource};
use crate::cdn::{CdnPrefetchResource, CdnPurgeResource};
use crate::config::{ProviderConfig, ResolvedConfig};
use crate::connection::{Clients, Connection};
use crate::domain_group::{DomainGroupResource, DomainGroupsDataSource};
use crate::oss::{OssBucketResource, OssBucketsDataSource, OssObjectDataSource, OssObjectResource};
use crate::scdn::{
    ScdnCacheCleanResource, ScdnCachePreheatResource, ScdnCacheRuleResource,
    ScdnCacheRulesDataSource,
};
use crate::sdns::{
    SdnsDomainResource, SdnsDomainsDataSource, SdnsRecordResource, SdnsRecordsDataSource,
};
use crate::ssl::{SslCertificateDataSource, SslCertificateResource};
use crate::utils::{report, WithSchema};

/// Provider for the CDN, DNS, SSL and object storage APIs
#[derive(Debug, Default, Clone)]
pub struct EdgeProvider {
    connection: Connection,
}

#[async_trait]
impl Provider for EdgeProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderConfig::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags)
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let resolved = ResolvedConfig::resolve(diags, &config, |var| std::env::var(var).ok())?;
        let clients = match Clients::new(&resolved) {
            Ok(clients) => clients,
            Err(err) => {
                report(diags, "Could not create the API clients", err);
                return None;
            }
        };
        info!(
            terraform_version = %terraform_version,
            endpoint = %resolved.api.base_url,
            oss = resolved.oss.is_some(),
            "provider configured"
        );
        self.connection.configure(clients).await;
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let connection = &self.connection;
        Some(map! {
            "cdn_domain" => CdnDomainResource::new(connection.clone()),
            "cdn_purge" => CdnPurgeResource::new(connection.clone()),
            "cdn_prefetch" => CdnPrefetchResource::new(connection.clone()),
            "ssl_certificate" => SslCertificateResource::new(connection.clone()),
            "sdns_domain" => SdnsDomainResource::new(connection.clone()),
            "sdns_record" => SdnsRecordResource::new(connection.clone()),
            "domain_group" => DomainGroupResource::new(connection.clone()),
            "scdn_cache_rule" => ScdnCacheRuleResource::new(connection.clone()),
            "scdn_cache_clean" => ScdnCacheCleanResource::new(connection.clone()),
            "scdn_cache_preheat" => ScdnCachePreheatResource::new(connection.clone()),
            "oss_bucket" => OssBucketResource::new(connection.clone()),
            "oss_object" => OssObjectResource::new(connection.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let connection = &self.connection;
        Some(map! {
            "cdn_domain" => CdnDomainDataSource::new(connection.clone()),
            "cdn_domains" => CdnDomainsDataSource::new(connection.clone()),
            "ssl_certificate" => SslCertificateDataSource::new(connection.clone()),
            "sdns_domains" => SdnsDomainsDataSource::new(connection.clone()),
            "sdns_records" => SdnsRecordsDataSource::new(connection.clone()),
            "domain_groups" => DomainGroupsDataSource::new(connection.clone()),
            "scdn_cache_rules" => ScdnCacheRulesDataSource::new(connection.clone()),
            "oss_buckets" => OssBucketsDataSource::new(connection.clone()),
            "oss_object" => OssObjectDataSource::new(connection.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use tf_provider::DataSource;

    use super::*;

    #[test]
    fn every_resource_has_a_schema() {
        let provider = EdgeProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        assert_eq!(resources.len(), 12);
        for (name, resource) in &resources {
            assert!(!name.starts_with("edge_"), "{name} is prefixed when served");
            assert!(resource.schema(&mut diags).is_some(), "{name}");
        }
        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert_eq!(data_sources.len(), 9);
        for (name, data_source) in &data_sources {
            assert!(data_source.schema(&mut diags).is_some(), "{name}");
        }
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected() {
        let provider = EdgeProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            endpoint: "ftp://api.example".into(),
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_provider_reports_errors() {
        let data_source = CdnDomainDataSource::new(EdgeProvider::default().connection);
        let mut diags = Diagnostics::default();
        let config = Default::default();
        assert!(DataSource::read(&data_source, &mut diags, config, Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors[0].summary, "Provider is not configured");
    }
}
