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
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::warn;

use crate::connection::Connection;
use crate::schema::{computed, optional, required, string_list};
use crate::service::sdns::{AddDomainRequest, SdnsDomain};
use crate::service::SdnsService;
use crate::utils::{
    check_not_empty, no_errors, or_report, replace_on_change, report, string_or, string_value,
    strings_list,
};

#[derive(Debug, Clone, Default)]
pub struct SdnsDomainResource {
    connection: Connection,
}

impl SdnsDomainResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SdnsDomainState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub domain: ValueString<'a>,
    pub group_id: ValueString<'a>,
    pub remark: ValueString<'a>,
    pub status: ValueString<'a>,
    pub ns_servers: ValueList<ValueString<'a>>,
}

impl<'a> SdnsDomainState<'a> {
    fn apply_info(&mut self, info: SdnsDomain) {
        self.id = info.id.into();
        self.domain = info.domain.into();
        self.group_id = string_value(info.group_id);
        self.remark = string_value(info.remark);
        self.status = info.status.into();
        self.ns_servers = strings_list(info.ns_servers);
    }
}

#[async_trait]
impl Resource for SdnsDomainResource {
    type State<'a> = SdnsDomainState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the zone"),
                    "domain" => required(AttributeType::String, "Name of the zone"),
                    "group_id" => optional(AttributeType::String, "Domain group of the zone"),
                    "remark" => optional(AttributeType::String, "Free text remark"),
                    "status" => computed(AttributeType::String, "Status of the zone"),
                    "ns_servers" => computed(string_list(), "Name servers to delegate the zone to"),
                },
                description: Description::plain("Smart DNS zone"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.domain, AttributePath::new("domain"));
        if matches!(&config.domain, Value::Value(domain) if domain.ends_with('.')) {
            diags.error_short(
                "`domain` should not end with a dot",
                AttributePath::new("domain"),
            );
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
        match SdnsService::new(&clients.api).get_domain(&id).await {
            Ok(info) => state.apply_info(info),
            Err(err) if err.is_not_found() => {
                warn!(id = %id, "DNS zone not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read DNS zone", err);
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
        state.id = Value::Unknown;
        state.status = Value::Unknown;
        state.ns_servers = Value::Unknown;
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
        // Zones cannot be modified in place
        let mut triggers = Vec::new();
        replace_on_change(&mut triggers, &prior_state.domain, &state.domain, "domain");
        replace_on_change(&mut triggers, &prior_state.group_id, &state.group_id, "group_id");
        replace_on_change(&mut triggers, &prior_state.remark, &state.remark, "remark");
        if !triggers.is_empty() {
            state.id = Value::Unknown;
            state.status = Value::Unknown;
            state.ns_servers = Value::Unknown;
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
            "Could not create DNS zone",
            service
                .add_domain(&AddDomainRequest {
                    domain: string_or(&state.domain, ""),
                    group_id: state.group_id.as_deref_option(),
                    remark: state.remark.as_deref_option(),
                })
                .await,
        )?;
        let info = or_report(
            diags,
            "Could not read created DNS zone",
            service.get_domain(&id).await,
        )?;
        state.id = info.id.into();
        state.status = info.status.into();
        state.ns_servers = strings_list(info.ns_servers);
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
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
            .delete_domain(string_or(&state.id, ""))
            .await
        {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete DNS zone", err);
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
        let clients = self.connection.get(diags).await?;
        let info = or_report(
            diags,
            "Could not import DNS zone",
            SdnsService::new(&clients.api).get_domain(&id).await,
        )?;
        let mut state = SdnsDomainState::default();
        state.apply_info(info);
        Some((state, Default::default()))
    }
}
