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
use crate::scdn::cache_rule::BUSINESS_TYPES;
use crate::schema::{computed, computed_objects, required};
use crate::service::scdn_cache::{Business, CacheRuleInfo};
use crate::service::ScdnCacheService;
use crate::utils::{check_one_of, check_range, no_errors, number_or, or_report, string_or};

#[derive(Debug, Clone, Default)]
pub struct ScdnCacheRulesDataSource {
    connection: Connection,
}

impl ScdnCacheRulesDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RuleItem<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub expr: ValueString<'a>,
    pub status: ValueString<'a>,
    pub weight: ValueNumber,
}

impl<'a> From<CacheRuleInfo> for RuleItem<'a> {
    fn from(rule: CacheRuleInfo) -> Self {
        Self {
            id: rule.id.to_string().into(),
            name: rule.name.into(),
            expr: rule.expr.into(),
            status: rule.status.into(),
            weight: Value::Value(rule.weight),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesState<'a> {
    pub business_id: ValueNumber,
    #[serde(borrow = "'a")]
    pub business_type: ValueString<'a>,
    pub rules: ValueList<Value<RuleItem<'a>>>,
}

#[async_trait]
impl DataSource for ScdnCacheRulesDataSource {
    type State<'a> = RulesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "business_id" => required(AttributeType::Number, "Id of the template, account or domain owning the rules"),
                    "business_type" => required(AttributeType::String, "Owner kind: tpl, global or domain"),
                    "rules" => computed_objects("Cache rules, by decreasing priority", map! {
                        "id" => computed(AttributeType::String, "Id of the rule"),
                        "name" => computed(AttributeType::String, "Name of the rule"),
                        "expr" => computed(AttributeType::String, "Matching expression"),
                        "status" => computed(AttributeType::String, "on or off"),
                        "weight" => computed(AttributeType::Number, "Priority of the rule"),
                    }),
                },
                description: Description::plain("Lists the cache rules of an SCDN owner"),
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
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let clients = self.connection.get(diags).await?;
        let business = Business {
            business_id: number_or(&config.business_id, 0),
            business_type: string_or(&config.business_type, ""),
        };
        let mut rules = or_report(
            diags,
            "Could not list cache rules",
            ScdnCacheService::new(&clients.scdn)
                .list_rules(business)
                .await,
        )?;
        rules.sort_by(|a, b| b.weight.cmp(&a.weight));
        Some(RulesState {
            rules: Value::Value(
                rules
                    .into_iter()
                    .map(|rule| Value::Value(rule.into()))
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
    fn rule_is_converted() {
        let item: RuleItem = CacheRuleInfo {
            id: 9,
            name: "images".into(),
            status: "on".into(),
            weight: 4,
            ..Default::default()
        }
        .into();
        assert_eq!(item.id, Value::Value(Cow::Borrowed("9")));
        assert_eq!(item.expr, Value::Value(Cow::Borrowed("")));
        assert_eq!(item.weight, Value::Value(4));
    }

    #[tokio::test]
    async fn owner_is_validated() {
        let data_source = ScdnCacheRulesDataSource::default();
        let mut diags = Diagnostics::default();
        let config = RulesState {
            business_id: Value::Value(0),
            business_type: "site".into(),
            ..Default::default()
        };
        assert!(data_source.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 2);
    }
}
