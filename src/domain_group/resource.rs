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

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::warn;

use crate::connection::Connection;
use crate::schema::{computed, optional, required, string_set};
use crate::service::domain_group::{membership_diff, DomainGroup, GroupRequest};
use crate::service::DomainGroupService;
use crate::utils::{check_not_empty, no_errors, or_report, report, string_or, string_value};

#[derive(Debug, Clone, Default)]
pub struct DomainGroupResource {
    connection: Connection,
}

impl DomainGroupResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub group_name: ValueString<'a>,
    pub remark: ValueString<'a>,
    pub domains: ValueSet<ValueString<'a>>,
    pub created_at: ValueString<'a>,
}

/// Known domains of a set, sorted
pub(crate) fn set_strings(set: &ValueSet<ValueString>) -> Vec<String> {
    set.iter()
        .flatten()
        .filter_map(|domain| domain.as_deref_option().map(str::to_owned))
        .collect()
}

pub(crate) fn strings_set<'a>(items: Vec<String>) -> ValueSet<ValueString<'a>> {
    Value::Value(items.into_iter().map(ValueString::from).collect::<BTreeSet<_>>())
}

impl<'a> GroupState<'a> {
    fn apply_group(&mut self, group: DomainGroup) {
        self.id = group.group_id.into();
        self.group_name = group.group_name.into();
        self.remark = string_value(group.remark);
        // An unset membership stays null as long as the group has no domain
        if !(self.domains.is_null() && group.domains.is_empty()) {
            self.domains = strings_set(group.domains);
        }
        self.created_at = group.created_at.into();
    }
}

#[async_trait]
impl Resource for DomainGroupResource {
    type State<'a> = GroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the group"),
                    "group_name" => required(AttributeType::String, "Name of the group"),
                    "remark" => optional(AttributeType::String, "Free text remark"),
                    "domains" => optional(string_set(), "CDN domains in the group"),
                    "created_at" => computed(AttributeType::String, "Creation date"),
                },
                description: Description::plain("Group of CDN domains"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.group_name, AttributePath::new("group_name"));
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
        match DomainGroupService::new(&clients.api).get(&id).await {
            Ok(group) => state.apply_group(group),
            Err(err) if err.is_not_found() => {
                warn!(id = %id, "domain group not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read domain group", err);
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
        state.created_at = Value::Unknown;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        Some((proposed_state, prior_private_state, vec![]))
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
        let service = DomainGroupService::new(&clients.api);
        let mut state = planned_state;
        let domains = set_strings(&state.domains);

        let id = or_report(
            diags,
            "Could not create domain group",
            service
                .create(&GroupRequest {
                    group_id: None,
                    group_name: string_or(&state.group_name, ""),
                    remark: state.remark.as_deref_option(),
                    domains: Some(&domains),
                })
                .await,
        )?;
        match service.get(&id).await {
            Ok(group) => state.created_at = group.created_at.into(),
            Err(err) => {
                warn!(id = %id, error = %err, "could not read the created domain group");
                state.created_at = Value::Null;
            }
        }
        state.id = id.into();
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let service = DomainGroupService::new(&clients.api);
        let id = string_or(&planned_state.id, "");

        if prior_state.group_name != planned_state.group_name
            || prior_state.remark != planned_state.remark
        {
            or_report(
                diags,
                "Could not update domain group",
                service
                    .update(&GroupRequest {
                        group_id: Some(id),
                        group_name: string_or(&planned_state.group_name, ""),
                        remark: planned_state.remark.as_deref_option(),
                        domains: None,
                    })
                    .await,
            )?;
        }

        let (bind, unbind) = membership_diff(
            &set_strings(&prior_state.domains),
            &set_strings(&planned_state.domains),
        );
        or_report(
            diags,
            "Could not update domain group membership",
            futures::try_join!(
                service.bind_domains(id, &bind),
                service.unbind_domains(id, &unbind)
            ),
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
        match DomainGroupService::new(&clients.api)
            .delete(string_or(&state.id, ""))
            .await
        {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete domain group", err);
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
        let group = or_report(
            diags,
            "Could not import domain group",
            DomainGroupService::new(&clients.api).get(&id).await,
        )?;
        let mut state = GroupState::default();
        state.apply_group(group);
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(domains: &[&str]) -> DomainGroup {
        DomainGroup {
            group_id: "g1".into(),
            group_name: "static".into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn unset_membership_stays_null() {
        let mut state = GroupState::default();
        state.apply_group(group(&[]));
        assert!(state.domains.is_null());
        assert!(state.remark.is_null());

        state.apply_group(group(&["b.example", "a.example"]));
        assert_eq!(
            set_strings(&state.domains),
            vec!["a.example".to_owned(), "b.example".to_owned()]
        );

        state.apply_group(group(&[]));
        assert_eq!(state.domains, Value::Value(BTreeSet::new()));
    }
}
