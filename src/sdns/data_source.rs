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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::connection::Connection;
use crate::schema::{computed, computed_objects, optional, required, string_list};
use crate::sdns::record::RECORD_TYPES;
use crate::service::sdns::{RecordFilter, SdnsDomain, SdnsRecord};
use crate::service::SdnsService;
use crate::utils::{check_not_empty, check_one_of, no_errors, or_report, string_or, strings_list};

/// Listing of the DNS zones
#[derive(Debug, Clone, Default)]
pub struct SdnsDomainsDataSource {
    connection: Connection,
}

impl SdnsDomainsDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ZoneItem<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub domain: ValueString<'a>,
    pub group_id: ValueString<'a>,
    pub remark: ValueString<'a>,
    pub status: ValueString<'a>,
    pub ns_servers: ValueList<ValueString<'a>>,
}

impl<'a> From<SdnsDomain> for ZoneItem<'a> {
    fn from(zone: SdnsDomain) -> Self {
        Self {
            id: zone.id.into(),
            domain: zone.domain.into(),
            group_id: zone.group_id.into(),
            remark: zone.remark.into(),
            status: zone.status.into(),
            ns_servers: strings_list(zone.ns_servers),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ZonesState<'a> {
    #[serde(borrow = "'a")]
    pub domain: ValueString<'a>,
    pub domains: ValueList<Value<ZoneItem<'a>>>,
}

#[async_trait]
impl DataSource for SdnsDomainsDataSource {
    type State<'a> = ZonesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "domain" => optional(AttributeType::String, "Only list the zones matching this name"),
                    "domains" => computed_objects("DNS zones", map! {
                        "id" => computed(AttributeType::String, "Id of the zone"),
                        "domain" => computed(AttributeType::String, "Name of the zone"),
                        "group_id" => computed(AttributeType::String, "Domain group of the zone"),
                        "remark" => computed(AttributeType::String, "Free text remark"),
                        "status" => computed(AttributeType::String, "Status of the zone"),
                        "ns_servers" => computed(string_list(), "Name servers of the zone"),
                    }),
                },
                description: Description::plain("Lists the Smart DNS zones"),
                ..Default::default()
            },
        })
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let clients = self.connection.get(diags).await?;
        let zones = or_report(
            diags,
            "Could not list DNS zones",
            SdnsService::new(&clients.api)
                .list_domains(config.domain.as_deref_option())
                .await,
        )?;
        Some(ZonesState {
            domains: Value::Value(
                zones
                    .into_iter()
                    .map(|zone| Value::Value(zone.into()))
                    .collect(),
            ),
            ..config
        })
    }
}

/// Listing of the records of a zone
#[derive(Debug, Clone, Default)]
pub struct SdnsRecordsDataSource {
    connection: Connection,
}

impl SdnsRecordsDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RecordItem<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub host: ValueString<'a>,
    #[serde(rename = "type")]
    pub record_type: ValueString<'a>,
    pub value: ValueString<'a>,
    pub ttl: ValueNumber,
    pub line: ValueString<'a>,
    pub priority: ValueNumber,
    pub weight: ValueNumber,
    pub status: ValueString<'a>,
}

impl<'a> From<SdnsRecord> for RecordItem<'a> {
    fn from(record: SdnsRecord) -> Self {
        Self {
            id: record.id.into(),
            host: record.host.into(),
            record_type: record.record_type.into(),
            value: record.value.into(),
            ttl: Value::Value(record.ttl),
            line: record.line.into(),
            priority: record.priority.into(),
            weight: record.weight.into(),
            status: record.status.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecordsState<'a> {
    #[serde(borrow = "'a")]
    pub domain_id: ValueString<'a>,
    pub host: ValueString<'a>,
    #[serde(rename = "type")]
    pub record_type: ValueString<'a>,
    pub records: ValueList<Value<RecordItem<'a>>>,
}

#[async_trait]
impl DataSource for SdnsRecordsDataSource {
    type State<'a> = RecordsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "domain_id" => required(AttributeType::String, "Id of the zone"),
                    "host" => optional(AttributeType::String, "Only list the records of this host"),
                    "type" => optional(AttributeType::String, "Only list the records of this type"),
                    "records" => computed_objects("DNS records", map! {
                        "id" => computed(AttributeType::String, "Id of the record"),
                        "host" => computed(AttributeType::String, "Host of the record"),
                        "type" => computed(AttributeType::String, "Type of the record"),
                        "value" => computed(AttributeType::String, "Value of the record"),
                        "ttl" => computed(AttributeType::Number, "Time to live in seconds"),
                        "line" => computed(AttributeType::String, "Resolution line"),
                        "priority" => computed(AttributeType::Number, "Priority of an MX record"),
                        "weight" => computed(AttributeType::Number, "Load balancing weight"),
                        "status" => computed(AttributeType::String, "Status of the record"),
                    }),
                },
                description: Description::plain("Lists the records of a Smart DNS zone"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.domain_id, AttributePath::new("domain_id"));
        check_one_of(diags, &config.record_type, &RECORD_TYPES, AttributePath::new("type"));
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let clients = self.connection.get(diags).await?;
        let filter = RecordFilter {
            host: config.host.as_deref_option(),
            record_type: config.record_type.as_deref_option(),
        };
        let records = or_report(
            diags,
            "Could not list DNS records",
            SdnsService::new(&clients.api)
                .list_records(string_or(&config.domain_id, ""), filter)
                .await,
        )?;
        Some(RecordsState {
            records: Value::Value(
                records
                    .into_iter()
                    .map(|record| Value::Value(record.into()))
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
    fn record_item_keeps_missing_priority_null() {
        let item: RecordItem = SdnsRecord {
            id: "r1".into(),
            domain_id: "z1".into(),
            host: "www".into(),
            record_type: "A".into(),
            value: "192.0.2.1".into(),
            ttl: 600,
            ..Default::default()
        }
        .into();
        assert!(item.priority.is_null());
        assert_eq!(item.ttl, Value::Value(600));
        assert_eq!(item.record_type, Value::Value(Cow::Borrowed("A")));
    }

    #[tokio::test]
    async fn records_filter_type_is_checked() {
        let data_source = SdnsRecordsDataSource::default();
        let mut diags = Diagnostics::default();
        let config = RecordsState {
            domain_id: "z1".into(),
            record_type: "SPF".into(),
            ..Default::default()
        };
        assert!(data_source.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors[0].attribute, AttributePath::new("type"));
    }
}
