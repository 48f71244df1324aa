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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, NestedBlock, Schema};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueString};
use tf_provider::{map, value, AttributePath, Diagnostics, Resource};
use tracing::warn;

use crate::cdn::config::ConfigState;
use crate::connection::Connection;
use crate::service::cdn::{AddDomainRequest, DomainInfo};
use crate::service::CdnService;
use crate::schema::{computed, optional_computed, required};
use crate::utils::{
    check_not_empty, check_one_of, no_errors, or_report, replace_on_change, report, set_default,
    string_or, string_value, WithValidate,
};

pub(crate) const DOMAIN_TYPES: [&str; 3] = ["web", "download", "video"];
pub(crate) const AREAS: [&str; 3] = ["mainland", "overseas", "global"];
const STATUSES: [&str; 2] = ["online", "offline"];

#[derive(Debug, Clone, Default)]
pub struct CdnDomainResource {
    connection: Connection,
}

impl CdnDomainResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub domain: ValueString<'a>,
    #[serde(rename = "type")]
    pub domain_type: ValueString<'a>,
    pub area: ValueString<'a>,
    pub status: ValueString<'a>,
    pub cname: ValueString<'a>,
    pub https_enabled: ValueBool,
    pub created_at: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub config: Value<ConfigState<'a>>,
}

impl<'a> DomainState<'a> {
    fn normalize(&mut self) {
        set_default(&mut self.area, Cow::Borrowed("mainland"));
        set_default(&mut self.status, Cow::Borrowed("online"));
        if let Value::Value(config) = &mut self.config {
            config.normalize();
        }
    }

    fn apply_info(&mut self, info: DomainInfo) {
        self.id = if info.id.is_empty() {
            info.domain.clone().into()
        } else {
            info.id.into()
        };
        self.domain = info.domain.into();
        self.domain_type = string_value(info.domain_type);
        self.area = string_value(info.area);
        self.status = string_value(info.status);
        self.cname = info.cname.into();
        self.https_enabled = Value::Value(info.https_enabled);
        self.created_at = info.created_at.into();
    }

    fn enabled(&self) -> bool {
        string_or(&self.status, "online") == "online"
    }
}

fn https_of(config: &Value<ConfigState>) -> bool {
    config
        .as_ref_option()
        .map_or(false, |config| !config.https.is_null())
}

#[async_trait]
impl Resource for CdnDomainResource {
    type State<'a> = DomainState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the domain"),
                    "domain" => required(AttributeType::String, "Accelerated domain name"),
                    "type" => required(AttributeType::String, "Business type: web, download or video"),
                    "area" => optional_computed(AttributeType::String, "Acceleration area: mainland, overseas or global (default mainland)"),
                    "status" => optional_computed(AttributeType::String, "online or offline (default online)"),
                    "cname" => computed(AttributeType::String, "CNAME to point the domain to"),
                    "https_enabled" => computed(AttributeType::Bool, "Is HTTPS enabled on the domain"),
                    "created_at" => computed(AttributeType::String, "Creation date"),
                },
                blocks: map! {
                    "config" => NestedBlock::Optional(ConfigState::block()),
                },
                description: Description::plain("CDN accelerated domain"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.domain, AttributePath::new("domain"));
        check_one_of(diags, &config.domain_type, &DOMAIN_TYPES, AttributePath::new("type"));
        check_one_of(diags, &config.area, &AREAS, AttributePath::new("area"));
        check_one_of(diags, &config.status, &STATUSES, AttributePath::new("status"));
        if let Value::Value(domain_config) = &config.config {
            domain_config.validate(diags, AttributePath::new("config").index(0));
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
        let service = CdnService::new(&clients.api);
        let domain = string_or(&state.domain, "").to_owned();

        let info = match service.get_domain(&domain).await {
            Ok(info) => info,
            Err(err) if err.is_not_found() => {
                warn!(domain = %domain, "CDN domain not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read CDN domain", err);
                return None;
            }
        };
        state.apply_info(info);

        if let Value::Value(prior) = &state.config {
            let api_config = or_report(
                diags,
                "Could not read CDN domain configuration",
                service
                    .get_domain_config(&domain, &prior.config_items())
                    .await,
            )?;
            let refreshed = ConfigState::from_api(&api_config, Some(prior));
            state.config = Value::Value(refreshed);
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
        state.cname = Value::Unknown;
        state.https_enabled = Value::Unknown;
        state.created_at = Value::Unknown;
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
        replace_on_change(&mut triggers, &prior_state.domain, &state.domain, "domain");
        replace_on_change(&mut triggers, &prior_state.domain_type, &state.domain_type, "type");
        replace_on_change(&mut triggers, &prior_state.area, &state.area, "area");

        if !triggers.is_empty() {
            state.id = Value::Unknown;
            state.cname = Value::Unknown;
            state.created_at = Value::Unknown;
        }

        if !triggers.is_empty() || https_of(&prior_state.config) != https_of(&state.config) {
            state.https_enabled = Value::Unknown;
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

        let api_config = state
            .config
            .as_ref_option()
            .map(ConfigState::to_api)
            .unwrap_or_default();
        let domain = string_or(&state.domain, "").to_owned();
        let created = or_report(
            diags,
            "Could not create CDN domain",
            service
                .add_domain(&AddDomainRequest {
                    domain: &domain,
                    domain_type: string_or(&state.domain_type, "web"),
                    area: state.area.as_deref_option(),
                    config: &api_config,
                })
                .await,
        )?;

        let mut status = state.status.clone();
        if !state.enabled() {
            if let Err(err) = service.set_domain_status(&domain, false).await {
                // The domain exists and is online, the next plan retries
                report(diags, "Could not disable CDN domain", err);
                status = Value::Value(Cow::Borrowed("online"));
            }
        }

        match service.get_domain(&domain).await {
            Ok(info) => state.apply_info(info),
            Err(err) => {
                warn!(domain = %domain, error = %err, "could not refresh the created CDN domain");
                state.id = created.id.into();
                state.cname = created.cname.into();
                state.https_enabled = Value::Value(api_config.https.is_some());
                state.created_at = Value::Null;
            }
        }
        // The API may report a transient status while the domain is being deployed
        state.status = status;

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
        let service = CdnService::new(&clients.api);
        let mut state = planned_state;
        let domain = string_or(&state.domain, "").to_owned();

        if prior_state.config != state.config {
            let empty = ConfigState::default();
            let prior_config = prior_state.config.as_ref_option().unwrap_or(&empty);
            let planned_config = state.config.as_ref_option().unwrap_or(&empty);
            let removed = ConfigState::removed_items(prior_config, planned_config);
            or_report(
                diags,
                "Could not update CDN domain configuration",
                service
                    .update_domain_config(&domain, &planned_config.to_api(), &removed)
                    .await,
            )?;
        }

        if prior_state.enabled() != state.enabled() {
            or_report(
                diags,
                "Could not change CDN domain status",
                service.set_domain_status(&domain, state.enabled()).await,
            )?;
        }

        if state.https_enabled.is_unknown() {
            let info = or_report(
                diags,
                "Could not read CDN domain",
                service.get_domain(&domain).await,
            )?;
            state.https_enabled = Value::Value(info.https_enabled);
        }

        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let clients = self.connection.get(diags).await?;
        let service = CdnService::new(&clients.api);
        let domain = string_or(&state.domain, "");

        // A domain must be offline before it can be deleted
        if let Err(err) = service.set_domain_status(domain, false).await {
            if err.is_not_found() {
                return Some(());
            }
            report(diags, "Could not disable CDN domain", err);
            return None;
        }
        match service.delete_domain(domain).await {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete CDN domain", err);
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
        let service = CdnService::new(&clients.api);

        let info = or_report(
            diags,
            "Could not import CDN domain",
            service.get_domain(&id).await,
        )?;
        let api_config = or_report(
            diags,
            "Could not import CDN domain configuration",
            service.get_domain_config(&id, &[]).await,
        )?;

        let mut state = DomainState::default();
        state.apply_info(info);
        state.config = Value::Value(ConfigState::from_api(&api_config, None));
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::config::{HttpsState, OriginState};
    use crate::utils::strings_list;

    fn planned<'a>() -> DomainState<'a> {
        DomainState {
            domain: "www.example.com".into(),
            domain_type: "web".into(),
            config: Value::Value(ConfigState {
                origin: Value::Value(vec![Value::Value(OriginState {
                    origin_type: "ip".into(),
                    addresses: strings_list(["192.0.2.1"]),
                    ..Default::default()
                })]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn plan_create_fills_defaults() {
        let resource = CdnDomainResource::default();
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .plan_create(&mut diags, planned(), planned(), Default::default())
            .await
            .unwrap();
        assert_eq!(state.area, Value::Value(Cow::Borrowed("mainland")));
        assert_eq!(state.status, Value::Value(Cow::Borrowed("online")));
        assert!(state.id.is_unknown());
        assert!(state.cname.is_unknown());
        let config = state.config.as_ref_option().unwrap();
        assert_eq!(config.head_control, Value::Value(vec![]));
    }

    #[tokio::test]
    async fn plan_update_replaces_on_domain_change() {
        let resource = CdnDomainResource::default();
        let mut diags = Diagnostics::default();
        let mut prior = planned();
        prior.normalize();
        prior.id = "1".into();
        let mut proposed = prior.clone();
        proposed.domain = "cdn.example.com".into();

        let (state, _, triggers) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(triggers, vec![AttributePath::new("domain")]);
        assert!(state.id.is_unknown());
    }

    #[tokio::test]
    async fn plan_update_tracks_https_changes() {
        let resource = CdnDomainResource::default();
        let mut diags = Diagnostics::default();
        let mut prior = planned();
        prior.normalize();
        prior.https_enabled = Value::Value(false);
        let mut proposed = prior.clone();
        if let Value::Value(config) = &mut proposed.config {
            config.https = Value::Value(HttpsState {
                cert_id: "cert".into(),
                ..Default::default()
            });
        }

        let (state, _, triggers) = resource
            .plan_update(
                &mut diags,
                prior.clone(),
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(triggers.is_empty());
        assert!(state.https_enabled.is_unknown());

        let (state, _, _) = resource
            .plan_update(
                &mut diags,
                prior.clone(),
                prior.clone(),
                prior,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(state.https_enabled, Value::Value(false));
    }

    #[tokio::test]
    async fn validate_rejects_unknown_type() {
        let resource = CdnDomainResource::default();
        let mut diags = Diagnostics::default();
        let mut config = planned();
        config.domain_type = "streaming".into();
        assert!(resource.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors[0].attribute, AttributePath::new("type"));
    }

    #[tokio::test]
    async fn read_requires_configuration() {
        let resource = CdnDomainResource::default();
        let mut diags = Diagnostics::default();
        let read = resource
            .read(&mut diags, planned(), Default::default(), Default::default())
            .await;
        assert!(read.is_none());
        assert_eq!(diags.errors[0].summary, "Provider is not configured");
    }

    #[test]
    fn api_info_is_applied() {
        let mut state = planned();
        state.apply_info(DomainInfo {
            id: String::new(),
            domain: "www.example.com".into(),
            cname: "www.example.com.cdn.example".into(),
            domain_type: "web".into(),
            area: "global".into(),
            status: "offline".into(),
            https_enabled: true,
            created_at: "2024-01-01T00:00:00Z".into(),
        });
        assert_eq!(state.id, Value::Value(Cow::Borrowed("www.example.com")));
        assert_eq!(state.area, Value::Value(Cow::Borrowed("global")));
        assert!(!state.enabled());
        assert_eq!(state.https_enabled, Value::Value(true));
    }
}
