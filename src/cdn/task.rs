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

//! Purge and prefetch submissions
//!
//! A task is submitted once on create. Reading only refreshes its status: a task that cannot
//! be found anymore has expired on the API side and is kept in the state as is.

use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::warn;

use crate::connection::Connection;
use crate::error::Result;
use crate::schema::{computed, optional_computed, required, string_list};
use crate::service::CdnService;
use crate::utils::{
    check_one_of, list_strings, no_errors, or_report, replace_on_change, set_default, string_or,
};

/// Record an error for every URL that is not absolute
pub(crate) fn check_urls(
    diags: &mut Diagnostics,
    urls: &ValueList<ValueString>,
    attr_path: AttributePath,
) {
    if let Value::Value(items) = urls {
        if items.is_empty() {
            diags.error_short("At least one URL is required", attr_path.clone());
        }
        for (i, url) in items.iter().enumerate() {
            if let Value::Value(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    diags.error(
                        "Invalid URL",
                        format!("`{url}` should start with http:// or https://"),
                        attr_path.clone().index(i as i64),
                    );
                }
            }
        }
    }
}

/// Status of a task, a vanished task keeps its last known status
pub(crate) fn task_status<'a>(
    task_id: &str,
    result: Result<String>,
    prior: ValueString<'a>,
) -> ValueString<'a> {
    match result {
        Ok(status) => status.into(),
        Err(err) => {
            warn!(task_id, error = %err, "could not refresh task status");
            prior
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CdnPurgeResource {
    connection: Connection,
}

impl CdnPurgeResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PurgeState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub urls: ValueList<ValueString<'a>>,
    #[serde(rename = "type")]
    pub purge_type: ValueString<'a>,
    pub task_status: ValueString<'a>,
}

#[async_trait]
impl Resource for CdnPurgeResource {
    type State<'a> = PurgeState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the purge task"),
                    "urls" => required(string_list(), "URLs or directories to purge"),
                    "type" => optional_computed(AttributeType::String, "url or dir (default url)"),
                    "task_status" => computed(AttributeType::String, "Status of the purge task"),
                },
                description: Description::plain("Purges cached content from the CDN"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_urls(diags, &config.urls, AttributePath::new("urls"));
        check_one_of(diags, &config.purge_type, &["url", "dir"], AttributePath::new("type"));
        if config.purge_type.as_deref_option() == Some("dir") {
            for (i, url) in config.urls.iter().flatten().enumerate() {
                if matches!(url, Value::Value(url) if !url.ends_with('/')) {
                    diags.error_short(
                        "Directories must end with `/`",
                        AttributePath::new("urls").index(i as i64),
                    );
                }
            }
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
        let result = CdnService::new(&clients.api)
            .get_purge_task(&task_id)
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
        set_default(&mut state.purge_type, Cow::Borrowed("url"));
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
        set_default(&mut state.purge_type, Cow::Borrowed("url"));
        let mut triggers = Vec::new();
        replace_on_change(&mut triggers, &prior_state.urls, &state.urls, "urls");
        replace_on_change(&mut triggers, &prior_state.purge_type, &state.purge_type, "type");
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
        let service = CdnService::new(&clients.api);
        let mut state = planned_state;

        let task = or_report(
            diags,
            "Could not submit purge",
            service
                .purge(string_or(&state.purge_type, "url"), &list_strings(&state.urls))
                .await,
        )?;
        let result = service
            .get_purge_task(&task.task_id)
            .await
            .map(|task| task.status);
        state.task_status = task_status(&task.task_id, result, "submitted".into());
        state.id = task.task_id.into();
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
pub struct CdnPrefetchResource {
    connection: Connection,
}

impl CdnPrefetchResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrefetchState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub urls: ValueList<ValueString<'a>>,
    pub task_status: ValueString<'a>,
}

#[async_trait]
impl Resource for CdnPrefetchResource {
    type State<'a> = PrefetchState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the prefetch task"),
                    "urls" => required(string_list(), "URLs to warm up"),
                    "task_status" => computed(AttributeType::String, "Status of the prefetch task"),
                },
                description: Description::plain("Warms up the CDN cache"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
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
        let result = CdnService::new(&clients.api)
            .get_prefetch_task(&task_id)
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
        let mut triggers = Vec::new();
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
        let service = CdnService::new(&clients.api);
        let mut state = planned_state;

        let task = or_report(
            diags,
            "Could not submit prefetch",
            service.prefetch(&list_strings(&state.urls)).await,
        )?;
        let result = service
            .get_prefetch_task(&task.task_id)
            .await
            .map(|task| task.status);
        state.task_status = task_status(&task.task_id, result, "submitted".into());
        state.id = task.task_id.into();
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
