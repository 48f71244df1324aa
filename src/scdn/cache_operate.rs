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

//! Cache cleaning and preheating of the SCDN, submitted once like the CDN purges

use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};

use crate::cdn::task::{check_urls, task_status};
use crate::connection::Connection;
use crate::schema::{computed, optional, optional_computed, required, string_list};
use crate::service::scdn_cache_operate::{CleanRequest, PreheatRequest};
use crate::service::ScdnCacheOperateService;
use crate::utils::{
    bool_or, check_one_of, list_strings, no_errors, or_report, replace_on_change, set_default,
    string_or,
};

const PROTOCOLS: [&str; 3] = ["http", "https", "all"];

#[derive(Debug, Clone, Default)]
pub struct ScdnCacheCleanResource {
    connection: Connection,
}

impl ScdnCacheCleanResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CleanState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub protocol: ValueString<'a>,
    pub wildcard: ValueBool,
    pub urls: ValueList<ValueString<'a>>,
    pub dirs: ValueList<ValueString<'a>>,
    pub task_status: ValueString<'a>,
}

impl<'a> CleanState<'a> {
    fn normalize(&mut self) {
        set_default(&mut self.protocol, Cow::Borrowed("all"));
        set_default(&mut self.wildcard, false);
    }
}

#[async_trait]
impl Resource for ScdnCacheCleanResource {
    type State<'a> = CleanState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the clean task"),
                    "protocol" => optional_computed(AttributeType::String, "http, https or all (default all)"),
                    "wildcard" => optional_computed(AttributeType::Bool, "URLs and directories hold wildcards (default false)"),
                    "urls" => optional(string_list(), "URLs to clean"),
                    "dirs" => optional(string_list(), "Directories to clean"),
                    "task_status" => computed(AttributeType::String, "Status of the clean task"),
                },
                description: Description::plain("Cleans the SCDN cache"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_one_of(diags, &config.protocol, &PROTOCOLS, AttributePath::new("protocol"));
        if config.urls.is_null() && config.dirs.is_null() {
            diags.root_error_short("At least one of `urls` or `dirs` is required");
        }
        if !config.urls.is_null() {
            check_urls(diags, &config.urls, AttributePath::new("urls"));
        }
        if !config.dirs.is_null() {
            check_urls(diags, &config.dirs, AttributePath::new("dirs"));
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
        let task_id = string_or(&state.id, "").to_owned();
        let result = ScdnCacheOperateService::new(&clients.scdn)
            .get_task(&task_id)
            .await
            .map(|task| task.status);
        state.task_status = task_status(&task_id, result, state.task_status);
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
        state.task_status = Value::Unknown;
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
        replace_on_change(&mut triggers, &prior_state.protocol, &state.protocol, "protocol");
        replace_on_change(&mut triggers, &prior_state.wildcard, &state.wildcard, "wildcard");
        replace_on_change(&mut triggers, &prior_state.urls, &state.urls, "urls");
        replace_on_change(&mut triggers, &prior_state.dirs, &state.dirs, "dirs");
        if !triggers.is_empty() {
            state.id = Value::Unknown;
            state.task_status = Value::Unknown;
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
        let service = ScdnCacheOperateService::new(&clients.scdn);
        let mut state = planned_state;
        let urls = list_strings(&state.urls);
        let dirs = list_strings(&state.dirs);

        let task_id = or_report(
            diags,
            "Could not submit cache clean",
            service
                .clean(&CleanRequest {
                    protocol: string_or(&state.protocol, "all"),
                    wildcard: bool_or(&state.wildcard, false),
                    urls: &urls,
                    dirs: &dirs,
                })
                .await,
        )?;
        let result = service.get_task(&task_id).await.map(|task| task.status);
        state.task_status = task_status(&task_id, result, "submitted".into());
        state.id = task_id.into();
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
        _diags: &mut Diagnostics,
        _state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        Some(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScdnCachePreheatResource {
    connection: Connection,
}

impl ScdnCachePreheatResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreheatState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub protocol: ValueString<'a>,
    pub urls: ValueList<ValueString<'a>>,
    pub task_status: ValueString<'a>,
}

#[async_trait]
impl Resource for ScdnCachePreheatResource {
    type State<'a> = PreheatState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the preheat task"),
                    "protocol" => optional_computed(AttributeType::String, "http, https or all (default all)"),
                    "urls" => required(string_list(), "URLs to preheat"),
                    "task_status" => computed(AttributeType::String, "Status of the preheat task"),
                },
                description: Description::plain("Preheats the SCDN cache"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_one_of(diags, &config.protocol, &PROTOCOLS, AttributePath::new("protocol"));
        check_urls(diags, &config.urls, AttributePath::new("urls"));
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
        let task_id = string_or(&state.id, "").to_owned();
        let result = ScdnCacheOperateService::new(&clients.scdn)
            .get_task(&task_id)
            .await
            .map(|task| task.status);
        state.task_status = task_status(&task_id, result, state.task_status);
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
        set_default(&mut state.protocol, Cow::Borrowed("all"));
        state.id = Value::Unknown;
        state.task_status = Value::Unknown;
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
        set_default(&mut state.protocol, Cow::Borrowed("all"));
        let mut triggers = Vec::new();
        replace_on_change(&mut triggers, &prior_state.protocol, &state.protocol, "protocol");
        replace_on_change(&mut triggers, &prior_state.urls, &state.urls, "urls");
        if !triggers.is_empty() {
            state.id = Value::Unknown;
            state.task_status = Value::Unknown;
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
        let service = ScdnCacheOperateService::new(&clients.scdn);
        let mut state = planned_state;
        let urls = list_strings(&state.urls);

        let task_id = or_report(
            diags,
            "Could not submit cache preheat",
            service
                .preheat(&PreheatRequest {
                    protocol: string_or(&state.protocol, "all"),
                    urls: &urls,
                })
                .await,
        )?;
        let result = service.get_task(&task_id).await.map(|task| task.status);
        state.task_status = task_status(&task_id, result, "submitted".into());
        state.id = task_id.into();
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
        _diags: &mut Diagnostics,
        _state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::strings_list;

    #[tokio::test]
    async fn clean_needs_urls_or_dirs() {
        let resource = ScdnCacheCleanResource::default();
        let mut diags = Diagnostics::default();
        assert!(resource
            .validate(&mut diags, CleanState::default())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        let config = CleanState {
            dirs: strings_list(["https://a.example/static/"]),
            ..Default::default()
        };
        assert!(resource.validate(&mut diags, config).await.is_some());
    }

    #[tokio::test]
    async fn clean_defaults_are_planned() {
        let resource = ScdnCacheCleanResource::default();
        let proposed = CleanState {
            urls: strings_list(["https://a.example/x"]),
            ..Default::default()
        };
        let (planned, _) = resource
            .plan_create(
                &mut Diagnostics::default(),
                proposed.clone(),
                proposed,
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(planned.protocol, Value::Value(Cow::Borrowed("all")));
        assert_eq!(planned.wildcard, Value::Value(false));
        assert!(planned.id.is_unknown());
    }

    #[tokio::test]
    async fn preheat_changes_replace() {
        let resource = ScdnCachePreheatResource::default();
        let prior = PreheatState {
            id: "t1".into(),
            protocol: "all".into(),
            urls: strings_list(["https://a.example/x"]),
            task_status: "done".into(),
        };
        let proposed = PreheatState {
            protocol: Value::Null,
            urls: strings_list(["https://a.example/y"]),
            ..prior.clone()
        };
        let (planned, _, triggers) = resource
            .plan_update(
                &mut Diagnostics::default(),
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(triggers, vec![AttributePath::new("urls")]);
        assert_eq!(planned.protocol, Value::Value(Cow::Borrowed("all")));
        assert!(planned.task_status.is_unknown());
    }

    #[tokio::test]
    async fn preheat_rejects_unknown_protocol() {
        let resource = ScdnCachePreheatResource::default();
        let mut diags = Diagnostics::default();
        let config = PreheatState {
            protocol: "ftp".into(),
            urls: strings_list(["https://a.example/x"]),
            ..Default::default()
        };
        assert!(resource.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors[0].attribute, AttributePath::new("protocol"));
    }
}
