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
use tf_provider::value::{Value, ValueEmpty, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::warn;

use crate::connection::Connection;
use crate::schema::{computed, optional, optional_computed, required};
use crate::scdn::conf::ConfState;
use crate::service::scdn_cache::{Business, CacheConf, CacheRuleInfo, CacheRuleRequest};
use crate::service::ScdnCacheService;
use crate::utils::{
    check_not_empty, check_one_of, check_range, no_errors, number_or, or_report,
    replace_on_change, report, set_default, string_or, string_value, WithValidate,
};

pub(crate) const BUSINESS_TYPES: [&str; 3] = ["tpl", "global", "domain"];

#[derive(Debug, Clone, Default)]
pub struct ScdnCacheRuleResource {
    connection: Connection,
}

impl ScdnCacheRuleResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheRuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub business_id: ValueNumber,
    pub business_type: ValueString<'a>,
    pub name: ValueString<'a>,
    pub remark: ValueString<'a>,
    pub expr: ValueString<'a>,
    pub status: ValueString<'a>,
    pub weight: ValueNumber,
    pub conf: Value<ConfState<'a>>,
}

impl<'a> CacheRuleState<'a> {
    fn business(&self) -> Business<'_> {
        Business {
            business_id: number_or(&self.business_id, 0),
            business_type: string_or(&self.business_type, ""),
        }
    }

    fn normalize(&mut self) {
        set_default(&mut self.status, Cow::Borrowed("on"));
        if let Value::Value(conf) = &mut self.conf {
            conf.normalize();
        }
    }

    fn conf(&self) -> CacheConf {
        self.conf
            .as_ref_option()
            .map(ConfState::to_api)
            .unwrap_or_default()
    }

    fn apply_rule(&mut self, rule: CacheRuleInfo) {
        self.id = rule.id.to_string().into();
        self.name = rule.name.into();
        self.remark = string_value(rule.remark);
        self.expr = rule.expr.into();
        self.status = rule.status.into();
        self.weight = Value::Value(rule.weight);
        self.conf = Value::Value(ConfState::from_api(&rule.conf, self.conf.as_ref_option()));
    }
}

/// Numeric id of a rule stored in the state
fn rule_id(diags: &mut Diagnostics, id: &ValueString) -> Option<i64> {
    match string_or(id, "").parse() {
        Ok(id) => Some(id),
        Err(_) => {
            diags.error_short("Invalid cache rule id", AttributePath::new("id"));
            None
        }
    }
}

/// Split `<business_type>:<business_id>:<rule_id>`
fn parse_import_id(id: &str) -> Option<(&str, i64, i64)> {
    let mut parts = id.splitn(3, ':');
    let business_type = parts.next().filter(|t| !t.is_empty())?;
    let business_id = parts.next()?.parse().ok()?;
    let rule_id = parts.next()?.parse().ok()?;
    Some((business_type, business_id, rule_id))
}

#[async_trait]
impl Resource for ScdnCacheRuleResource {
    type State<'a> = CacheRuleState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the rule"),
                    "business_id" => required(AttributeType::Number, "Id of the template, account or domain owning the rule"),
                    "business_type" => required(AttributeType::String, "Owner kind: tpl, global or domain"),
                    "name" => required(AttributeType::String, "Name of the rule"),
                    "remark" => optional(AttributeType::String, "Free text remark"),
                    "expr" => required(AttributeType::String, "Matching expression of the rule"),
                    "status" => optional_computed(AttributeType::String, "on or off (default on)"),
                    "weight" => computed(AttributeType::Number, "Priority of the rule among the rules of its owner"),
                },
                blocks: map! {
                    "conf" => NestedBlock::Single(ConfState::block()),
                },
                description: Description::plain("Cache rule of the SCDN"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_range(
            diags,
            &config.business_id,
            1..=i64::MAX,
            AttributePath::new("business_id"),
        );
        check_one_of(
            diags,
            &config.business_type,
            &BUSINESS_TYPES,
            AttributePath::new("business_type"),
        );
        check_not_empty(diags, &config.name, AttributePath::new("name"));
        check_not_empty(diags, &config.expr, AttributePath::new("expr"));
        check_one_of(diags, &config.status, &["on", "off"], AttributePath::new("status"));
        if let Value::Value(conf) = &config.conf {
            conf.validate(diags, AttributePath::new("conf"));
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
        let id = rule_id(diags, &state.id)?;
        match ScdnCacheService::new(&clients.scdn)
            .get_rule(state.business(), id)
            .await
        {
            Ok(rule) => state.apply_rule(rule),
            Err(err) if err.is_not_found() => {
                warn!(id, "cache rule not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read cache rule", err);
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
        state.weight = Value::Unknown;
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
        replace_on_change(
            &mut triggers,
            &prior_state.business_id,
            &state.business_id,
            "business_id",
        );
        replace_on_change(
            &mut triggers,
            &prior_state.business_type,
            &state.business_type,
            "business_type",
        );
        if !triggers.is_empty() {
            state.id = Value::Unknown;
            state.weight = Value::Unknown;
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
        let service = ScdnCacheService::new(&clients.scdn);
        let mut state = planned_state;
        let business_type = string_or(&state.business_type, "").to_owned();
        let business = Business {
            business_id: number_or(&state.business_id, 0),
            business_type: &business_type,
        };
        let conf = state.conf();

        let id = or_report(
            diags,
            "Could not create cache rule",
            service
                .add_rule(&CacheRuleRequest {
                    business,
                    id: None,
                    name: string_or(&state.name, ""),
                    remark: string_or(&state.remark, ""),
                    expr: string_or(&state.expr, ""),
                    conf: &conf,
                })
                .await,
        )?;
        if state.status.as_deref_option() == Some("off") {
            if let Err(err) = service.set_rule_status(business, id, "off").await {
                // The rule exists and is enabled, the next plan retries
                report(diags, "Could not disable cache rule", err);
                state.status = Value::Value(Cow::Borrowed("on"));
            }
        }
        state.weight = match service.get_rule(business, id).await {
            Ok(rule) => Value::Value(rule.weight),
            Err(err) => {
                warn!(id, error = %err, "could not read the created cache rule");
                Value::Value(0)
            }
        };
        state.id = id.to_string().into();
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
        let service = ScdnCacheService::new(&clients.scdn);
        let id = rule_id(diags, &planned_state.id)?;
        let business = planned_state.business();

        if prior_state.name != planned_state.name
            || prior_state.remark != planned_state.remark
            || prior_state.expr != planned_state.expr
            || prior_state.conf != planned_state.conf
        {
            let conf = planned_state.conf();
            or_report(
                diags,
                "Could not update cache rule",
                service
                    .update_rule(&CacheRuleRequest {
                        business,
                        id: Some(id),
                        name: string_or(&planned_state.name, ""),
                        remark: string_or(&planned_state.remark, ""),
                        expr: string_or(&planned_state.expr, ""),
                        conf: &conf,
                    })
                    .await,
            )?;
        }
        if prior_state.status != planned_state.status {
            or_report(
                diags,
                "Could not change cache rule status",
                service
                    .set_rule_status(business, id, string_or(&planned_state.status, "on"))
                    .await,
            )?;
        }
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
        let id = rule_id(diags, &state.id)?;
        match ScdnCacheService::new(&clients.scdn)
            .delete_rule(state.business(), id)
            .await
        {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete cache rule", err);
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
        let Some((business_type, business_id, rule_id)) = parse_import_id(&id) else {
            diags.root_error(
                "Invalid import id",
                format!("`{id}` should be of the form `<business_type>:<business_id>:<rule_id>`"),
            );
            return None;
        };
        let clients = self.connection.get(diags).await?;
        let business = Business {
            business_id,
            business_type,
        };
        let rule = or_report(
            diags,
            "Could not import cache rule",
            ScdnCacheService::new(&clients.scdn)
                .get_rule(business, rule_id)
                .await,
        )?;
        let mut state = CacheRuleState {
            business_id: Value::Value(business_id),
            business_type: business_type.to_owned().into(),
            ..Default::default()
        };
        state.apply_rule(rule);
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::scdn_cache::ConfCacheRule;

    #[test]
    fn import_id_is_split() {
        assert_eq!(parse_import_id("domain:12:345"), Some(("domain", 12, 345)));
        assert_eq!(parse_import_id("domain:12"), None);
        assert_eq!(parse_import_id("domain:x:345"), None);
        assert_eq!(parse_import_id(":12:345"), None);
    }

    #[test]
    fn rule_is_applied() {
        let mut state = CacheRuleState::default();
        state.apply_rule(CacheRuleInfo {
            id: 42,
            name: "static".into(),
            expr: "$uri ~ \"^/static\"".into(),
            status: "off".into(),
            weight: 3,
            conf: CacheConf {
                cache_rule: Some(ConfCacheRule {
                    cachetime: 600,
                    no_cache_control_op: "default".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(state.id, Value::Value(Cow::Borrowed("42")));
        assert!(state.remark.is_null());
        assert_eq!(state.weight, Value::Value(3));
        let conf = state.conf.as_ref_option().unwrap();
        assert_eq!(
            conf.cache_rule.as_ref_option().unwrap().cachetime,
            Value::Value(600)
        );
        assert_eq!(
            state.conf(),
            CacheConf {
                cache_rule: Some(ConfCacheRule {
                    cachetime: 600,
                    no_cache_control_op: "default".into(),
                    ..Default::default()
                }),
                ..Default::default()
            }
        );
    }

    #[test]
    fn invalid_state_id() {
        let mut diags = Diagnostics::default();
        assert_eq!(rule_id(&mut diags, &"17".into()), Some(17));
        assert_eq!(rule_id(&mut diags, &Value::Null), None);
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn owner_change_replaces_the_rule() {
        let resource = ScdnCacheRuleResource::default();
        let prior = CacheRuleState {
            id: "1".into(),
            business_id: Value::Value(10),
            business_type: "domain".into(),
            status: "on".into(),
            weight: Value::Value(1),
            ..Default::default()
        };
        let proposed = CacheRuleState {
            business_id: Value::Value(11),
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
        assert_eq!(triggers, vec![AttributePath::new("business_id")]);
        assert!(planned.id.is_unknown());
        assert!(planned.weight.is_unknown());
    }

    #[tokio::test]
    async fn nocache_with_cache_rule_is_rejected() {
        let resource = ScdnCacheRuleResource::default();
        let mut conf = ConfState {
            nocache: Value::Value(true),
            ..Default::default()
        };
        conf.cache_rule = Value::Value(Default::default());
        let config = CacheRuleState {
            business_id: Value::Value(1),
            business_type: "tpl".into(),
            name: "r".into(),
            expr: "true".into(),
            conf: Value::Value(conf),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(resource.validate(&mut diags, config).await.is_none());
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("conf").attribute("cache_rule")
        );
    }
}
