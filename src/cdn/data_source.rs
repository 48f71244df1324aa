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
use serde::{Deserialize, Serialize};
use tf_provider::schema::{Attribute, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::connection::Connection;
use crate::schema::{computed, computed_objects, optional, required};
use crate::service::cdn::DomainInfo;
use crate::service::CdnService;
use crate::utils::{check_not_empty, check_one_of, no_errors, or_report, string_or};

/// Lookup of a single CDN domain
#[derive(Debug, Clone, Default)]
pub struct CdnDomainDataSource {
    connection: Connection,
}

impl CdnDomainDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DomainItem<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub domain: ValueString<'a>,
    pub cname: ValueString<'a>,
    #[serde(rename = "type")]
    pub domain_type: ValueString<'a>,
    pub area: ValueString<'a>,
    pub status: ValueString<'a>,
    pub https_enabled: ValueBool,
    pub created_at: ValueString<'a>,
}

impl<'a> From<DomainInfo> for DomainItem<'a> {
    fn from(info: DomainInfo) -> Self {
        Self {
            id: info.id.into(),
            domain: info.domain.into(),
            cname: info.cname.into(),
            domain_type: info.domain_type.into(),
            area: info.area.into(),
            status: info.status.into(),
            https_enabled: Value::Value(info.https_enabled),
            created_at: info.created_at.into(),
        }
    }
}

fn domain_attributes(domain: Attribute) -> HashMap<String, Attribute> {
    map! {
        "id" => computed(AttributeType::String, "Id of the domain"),
        "domain" => domain,
        "cname" => computed(AttributeType::String, "CNAME of the domain"),
        "type" => computed(AttributeType::String, "Business type"),
        "area" => computed(AttributeType::String, "Acceleration area"),
        "status" => computed(AttributeType::String, "Status of the domain"),
        "https_enabled" => computed(AttributeType::Bool, "Is HTTPS enabled"),
        "created_at" => computed(AttributeType::String, "Creation date"),
    }
}

#[async_trait]
impl DataSource for CdnDomainDataSource {
    type State<'a> = DomainItem<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: domain_attributes(required(
                    AttributeType::String,
                    "Accelerated domain name",
                )),
                description: Description::plain("Reads a CDN domain"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.domain, AttributePath::new("domain"));
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let clients = self.connection.get(diags).await?;
        let info = or_report(
            diags,
            "Could not read CDN domain",
            CdnService::new(&clients.api)
                .get_domain(string_or(&config.domain, ""))
                .await,
        )?;
        Some(info.into())
    }
}

/// Listing of the CDN domains of the account
#[derive(Debug, Clone, Default)]
pub struct CdnDomainsDataSource {
    connection: Connection,
}

impl CdnDomainsDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainsState<'a> {
    #[serde(borrow = "'a")]
    pub status: ValueString<'a>,
    pub domains: ValueList<Value<DomainItem<'a>>>,
}

#[async_trait]
impl DataSource for CdnDomainsDataSource {
    type State<'a> = DomainsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "status" => optional(AttributeType::String, "Only list the domains with this status"),
                    "domains" => computed_objects(
                        "Domains of the account",
                        domain_attributes(computed(AttributeType::String, "Accelerated domain name")),
                    ),
                },
                description: Description::plain("Lists the CDN domains"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_one_of(
            diags,
            &config.status,
            &["online", "offline", "configuring"],
            AttributePath::new("status"),
        );
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let clients = self.connection.get(diags).await?;
        let domains = or_report(
            diags,
            "Could not list CDN domains",
            CdnService::new(&clients.api)
                .list_domains(config.status.as_deref_option())
                .await,
        )?;
        Some(DomainsState {
            domains: Value::Value(
                domains
                    .into_iter()
                    .map(|info| Value::Value(info.into()))
                    .collect(),
            ),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn info_is_converted() {
        let item: DomainItem = DomainInfo {
            id: "12".into(),
            domain: "www.example.com".into(),
            domain_type: "download".into(),
            ..Default::default()
        }
        .into();
        assert_eq!(item.id, Value::Value(Cow::Borrowed("12")));
        assert_eq!(item.domain_type, Value::Value(Cow::Borrowed("download")));
        assert_eq!(item.https_enabled, Value::Value(false));
    }

    #[tokio::test]
    async fn listing_rejects_unknown_status() {
        let data_source = CdnDomainsDataSource::default();
        let mut diags = Diagnostics::default();
        let config = DomainsState {
            status: "deleted".into(),
            ..Default::default()
        };
        assert!(data_source.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors[0].attribute, AttributePath::new("status"));
    }

    #[test]
    fn listing_schema_nests_domains() {
        let schema = CdnDomainsDataSource::default()
            .schema(&mut Diagnostics::default())
            .unwrap();
        assert!(matches!(
            schema.block.attributes["domains"].attr_type,
            AttributeType::AttributeList(_)
        ));
    }
}
