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

use std::borrow::Cow;
use std::net::{Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::warn;

use crate::connection::Connection;
use crate::schema::{computed, optional, optional_computed, required};
use crate::service::sdns::{RecordRequest, SdnsRecord};
use crate::service::SdnsService;
use crate::utils::{
    check_not_empty, check_one_of, check_range, no_errors, number_or, or_report,
    replace_on_change, report, set_default, string_or, string_value,
};

pub(crate) const RECORD_TYPES: [&str; 8] = ["A", "AAAA", "CNAME", "MX", "TXT", "NS", "SRV", "CAA"];

#[derive(Debug, Clone, Default)]
pub struct SdnsRecordResource {
    connection: Connection,
}

impl SdnsRecordResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecordState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub host: ValueString<'a>,
    #[serde(rename = "type")]
    pub record_type: ValueString<'a>,
    pub value: ValueString<'a>,
    pub ttl: ValueNumber,
    pub line: ValueString<'a>,
    pub priority: ValueNumber,
    pub weight: ValueNumber,
    pub remark: ValueString<'a>,
    pub status: ValueString<'a>,
}

impl<'a> RecordState<'a> {
    fn normalize(&mut self) {
        set_default(&mut self.ttl, 600);
        set_default(&mut self.line, Cow::Borrowed("default"));
    }

    fn apply_record(&mut self, record: SdnsRecord) {
        self.id = record.id.into();
        self.domain_id = record.domain_id.into();
        self.host = record.host.into();
        self.record_type = record.record_type.into();
        self.value = record.value.into();
        self.ttl = Value::Value(record.ttl);
        self.line = record.line.into();
        self.priority = record.priority.into();
        self.weight = record.weight.into();
        self.remark = string_value(record.remark);
        self.status = record.status.into();
    }

    fn request<'r>(&'r self, id: Option<&'r str>) -> RecordRequest<'r> {
        RecordRequest {
            id,
            domain_id: string_or(&self.domain_id, ""),
            host: string_or(&self.host, "@"),
            record_type: string_or(&self.record_type, "A"),
            value: string_or(&self.value, ""),
            ttl: number_or(&self.ttl, 600),
            line: string_or(&self.line, "default"),
            priority: self.priority.as_ref_option().copied(),
            weight: self.weight.as_ref_option().copied(),
            remark: self.remark.as_deref_option(),
        }
    }
}

/// Split an import id of the form `<domain_id>:<record_id>`
fn parse_import_id(id: &str) -> Option<(&str, &str)> {
    match id.split_once(':') {
        Some((domain_id, record_id)) if !domain_id.is_empty() && !record_id.is_empty() => {
            Some((domain_id, record_id))
        }
        _ => None,
    }
}

#[async_trait]
impl Resource for SdnsRecordResource {
    type State<'a> = RecordState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the record"),
                    "domain_id" => required(AttributeType::String, "Id of the zone"),
                    "host" => required(AttributeType::String, "Host of the record, `@` for the apex"),
                    "type" => required(AttributeType::String, "A, AAAA, CNAME, MX, TXT, NS, SRV or CAA"),
                    "value" => required(AttributeType::String, "Value of the record"),
                    "ttl" => optional_computed(AttributeType::Number, "Time to live in seconds (default 600)"),
                    "line" => optional_computed(AttributeType::String, "Resolution line (default `default`)"),
                    "priority" => optional(AttributeType::Number, "Priority of an MX record"),
                    "weight" => optional(AttributeType::Number, "Load balancing weight"),
                    "remark" => optional(AttributeType::String, "Free text remark"),
                    "status" => computed(AttributeType::String, "Status of the record"),
                },
                description: Description::plain("Smart DNS record"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.domain_id, AttributePath::new("domain_id"));
        check_not_empty(diags, &config.host, AttributePath::new("host"));
        check_not_empty(diags, &config.value, AttributePath::new("value"));
        check_one_of(diags, &config.record_type, &RECORD_TYPES, AttributePath::new("type"));
        check_range(diags, &config.ttl, 60..=86400, AttributePath::new("ttl"));
        check_range(diags, &config.weight, 1..=100, AttributePath::new("weight"));

        if let (Value::Value(record_type), Value::Value(value)) = (&config.record_type, &config.value)
        {
            let valid = match record_type.as_ref() {
                "A" => value.parse::<Ipv4Addr>().is_ok(),
                "AAAA" => value.parse::<Ipv6Addr>().is_ok(),
                _ => true,
            };
            if !valid {
                diags.error(
                    "Invalid `value`",
                    format!("`{value}` is not a valid address for a {record_type} record"),
                    AttributePath::new("value"),
                );
            }
        }

        match config.record_type.as_deref_option() {
            Some("MX") => {
                if config.priority.is_null() {
                    diags.error_short(
                        "`priority` is required for MX records",
                        AttributePath::new("priority"),
                    );
                }
                check_range(diags, &config.priority, 1..=50, AttributePath::new("priority"));
            }
            Some(_) if config.priority.is_value() => diags.error_short(
                "`priority` is only allowed for MX records",
                AttributePath::new("priority"),
            ),
            _ => (),
        }
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let id = string_or(&state.id, "").to_owned();
        match SdnsService::new(&clients.api).get_record(&id).await {
            Ok(record) => state.apply_record(record),
            Err(err) if err.is_not_found() => {
                warn!(id = %id, "DNS record not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read DNS record", err);
                return None;
            }
        }
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.normalize();
        state.id = Value::Unknown;
        state.status = Value::Unknown;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.normalize();
        let mut triggers = Vec::new();
        replace_on_change(&mut triggers, &prior_state.domain_id, &state.domain_id, "domain_id");
        if !triggers.is_empty() {
            state.id = Value::Unknown;
            state.status = Value::Unknown;
        }
        Some((state, prior_private_state, triggers))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let service = SdnsService::new(&clients.api);
        let mut state = planned_state;

        let id = or_report(
            diags,
            "Could not create DNS record",
            service.add_record(&state.request(None)).await,
        )?;
        match service.get_record(&id).await {
            Ok(record) => state.status = record.status.into(),
            Err(err) => {
                warn!(id = %id, error = %err, "could not read the created DNS record");
                state.status = Value::Null;
            }
        }
        state.id = id.into();
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let id = string_or(&planned_state.id, "").to_owned();
        or_report(
            diags,
            "Could not update DNS record",
            SdnsService::new(&clients.api)
                .update_record(&planned_state.request(Some(&id)))
                .await,
        )?;
        Some((planned_state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let clients = self.connection.get(diags).await?;
        match SdnsService::new(&clients.api)
            .delete_record(string_or(&state.id, ""))
            .await
        {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete DNS record", err);
                None
            }
            _ => Some(()),
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some((domain_id, record_id)) = parse_import_id(&id) else {
            diags.root_error(
                "Invalid import id",
                format!("`{id}` should be of the form `<domain_id>:<record_id>`"),
            );
            return None;
        };
        let clients = self.connection.get(diags).await?;
        let record = or_report(
            diags,
            "Could not import DNS record",
            SdnsService::new(&clients.api).get_record(record_id).await,
        )?;
        if record.domain_id != domain_id {
            diags.root_error(
                "Invalid import id",
                format!("record `{record_id}` does not belong to zone `{domain_id}`"),
            );
            return None;
        }
        let mut state = RecordState::default();
        state.apply_record(record);
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record<'a>(record_type: &'a str, value: &'a str) -> RecordState<'a> {
        RecordState {
            domain_id: "z1".into(),
            host: "www".into(),
            record_type: record_type.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    async fn errors(config: RecordState<'_>) -> Vec<AttributePath> {
        let mut diags = Diagnostics::default();
        _ = SdnsRecordResource::default().validate(&mut diags, config).await;
        diags.errors.into_iter().map(|e| e.attribute).collect()
    }

    #[tokio::test]
    async fn address_records_are_checked() {
        assert!(errors(record("A", "192.0.2.1")).await.is_empty());
        assert_eq!(
            errors(record("A", "2001:db8::1")).await,
            vec![AttributePath::new("value")]
        );
        assert!(errors(record("AAAA", "2001:db8::1")).await.is_empty());
        assert!(errors(record("CNAME", "target.example.com")).await.is_empty());
    }

    #[tokio::test]
    async fn mx_needs_priority() {
        assert_eq!(
            errors(record("MX", "mx.example.com")).await,
            vec![AttributePath::new("priority")]
        );
        let mut mx = record("MX", "mx.example.com");
        mx.priority = Value::Value(10);
        assert!(errors(mx).await.is_empty());

        let mut a = record("A", "192.0.2.1");
        a.priority = Value::Value(10);
        assert_eq!(errors(a).await, vec![AttributePath::new("priority")]);
    }

    #[tokio::test]
    async fn ttl_is_bounded() {
        let mut config = record("TXT", "v=spf1 -all");
        config.ttl = Value::Value(10);
        assert_eq!(errors(config).await, vec![AttributePath::new("ttl")]);
    }

    #[test]
    fn import_id_is_split() {
        assert_eq!(parse_import_id("z1:r2"), Some(("z1", "r2")));
        assert_eq!(parse_import_id("r2"), None);
        assert_eq!(parse_import_id(":r2"), None);
    }

    #[test]
    fn request_applies_defaults() {
        let mut state = record("A", "192.0.2.1");
        state.normalize();
        let request = state.request(Some("r1"));
        assert_eq!(request.id, Some("r1"));
        assert_eq!(request.ttl, 600);
        assert_eq!(request.line, "default");
        assert_eq!(request.priority, None);
    }
}
