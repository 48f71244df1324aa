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
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueSet, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::connection::Connection;
use crate::domain_group::resource::strings_set;
use crate::schema::{computed, computed_objects, optional, string_set};
use crate::service::domain_group::DomainGroup;
use crate::service::DomainGroupService;
use crate::utils::{or_report, string_value};

#[derive(Debug, Clone, Default)]
pub struct DomainGroupsDataSource {
    connection: Connection,
}

impl DomainGroupsDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GroupItem<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub group_name: ValueString<'a>,
    pub remark: ValueString<'a>,
    pub domains: ValueSet<ValueString<'a>>,
    pub created_at: ValueString<'a>,
}

impl<'a> From<DomainGroup> for GroupItem<'a> {
    fn from(group: DomainGroup) -> Self {
        Self {
            id: group.group_id.into(),
            group_name: group.group_name.into(),
            remark: string_value(group.remark),
            domains: strings_set(group.domains),
            created_at: group.created_at.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupsState<'a> {
    #[serde(borrow = "'a")]
    pub group_name: ValueString<'a>,
    pub groups: ValueList<Value<GroupItem<'a>>>,
}

/// Groups whose name contains `filter`
fn matching(groups: Vec<DomainGroup>, filter: Option<&str>) -> Vec<DomainGroup> {
    groups
        .into_iter()
        .filter(|group| filter.map_or(true, |name| group.group_name.contains(name)))
        .collect()
}

#[async_trait]
impl DataSource for DomainGroupsDataSource {
    type State<'a> = GroupsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "group_name" => optional(AttributeType::String, "Only list the groups whose name contains this string"),
                    "groups" => computed_objects("Domain groups", map! {
                        "id" => computed(AttributeType::String, "Id of the group"),
                        "group_name" => computed(AttributeType::String, "Name of the group"),
                        "remark" => computed(AttributeType::String, "Free text remark"),
                        "domains" => computed(string_set(), "CDN domains in the group"),
                        "created_at" => computed(AttributeType::String, "Creation date"),
                    }),
                },
                description: Description::plain("Lists the domain groups"),
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
        let groups = or_report(
            diags,
            "Could not list domain groups",
            DomainGroupService::new(&clients.api).list().await,
        )?;
        let groups = matching(groups, config.group_name.as_deref_option());
        Some(GroupsState {
            groups: Value::Value(
                groups
                    .into_iter()
                    .map(|group| Value::Value(group.into()))
                    .collect(),
            ),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> DomainGroup {
        DomainGroup {
            group_id: name.to_uppercase(),
            group_name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn filter_by_name() {
        let groups = vec![group("static-eu"), group("static-us"), group("video")];
        assert_eq!(matching(groups.clone(), None).len(), 3);
        let filtered = matching(groups, Some("static"));
        assert_eq!(filtered, vec![group("static-eu"), group("static-us")]);
    }

    #[test]
    fn empty_group_lists_no_domain() {
        let item: GroupItem = group("video").into();
        assert_eq!(item.domains, Value::Value(Default::default()));
        assert!(item.remark.is_null());
    }
}
