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

//! The `conf` block of an SCDN cache rule

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, NestedBlock};
use tf_provider::value::{Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::{map, value, AttributePath, Diagnostics};

use crate::schema::{number_list, optional, optional_computed, required, string_list};
use crate::service::scdn_cache::{
    BrowserCacheRule, CacheConf, CacheErrStatus, CacheShare, CacheUrlRewrite, ConfCacheRule,
};
use crate::utils::{
    bool_or, check_one_of, check_range, list_strings, number_or, set_default, string_or,
    strings_or_null, validate_list, WithValidate,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheTimeState<'a> {
    pub cachetime: ValueNumber,
    pub ignore_cache_time: ValueBool,
    pub ignore_nocache_header: ValueBool,
    #[serde(borrow = "'a")]
    pub no_cache_control_op: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BrowserCacheState<'a> {
    #[serde(borrow = "'a")]
    pub cache_type: ValueString<'a>,
    pub ignore_cache_time: ValueBool,
    pub cachetime: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrStatusState {
    pub cachetime: ValueNumber,
    pub err_status: ValueList<ValueNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UrlRewriteState<'a> {
    pub sort_querystring: ValueBool,
    pub ignore_all_query_string: ValueBool,
    #[serde(borrow = "'a")]
    pub query_args: ValueList<ValueString<'a>>,
    pub cookies: ValueList<ValueString<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheShareState<'a> {
    #[serde(borrow = "'a")]
    pub scheme: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfState<'a> {
    pub nocache: ValueBool,
    #[serde(with = "value::serde_as_vec")]
    pub cache_rule: Value<CacheTimeState<'a>>,
    #[serde(borrow = "'a")]
    pub browser_cache_rule: ValueList<Value<BrowserCacheState<'a>>>,
    pub cache_errstatus: ValueList<Value<ErrStatusState>>,
    #[serde(with = "value::serde_as_vec")]
    pub cache_url_rewrite: Value<UrlRewriteState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub cache_share: Value<CacheShareState<'a>>,
}

fn known<T>(list: &ValueList<Value<T>>) -> impl Iterator<Item = &T> {
    list.iter().flatten().filter_map(Value::as_ref_option)
}

fn blocks<T, U>(items: &[T], f: impl Fn(&T) -> U) -> ValueList<Value<U>> {
    Value::Value(items.iter().map(|item| Value::Value(f(item))).collect())
}

fn string<'a>(s: &str) -> ValueString<'a> {
    Value::Value(Cow::Owned(s.to_owned()))
}

impl<'a> ConfState<'a> {
    /// Fill the defaults of the items that are set
    pub fn normalize(&mut self) {
        set_default(&mut self.nocache, false);
        if let Value::Value(rule) = &mut self.cache_rule {
            set_default(&mut rule.ignore_cache_time, false);
            set_default(&mut rule.ignore_nocache_header, false);
            set_default(&mut rule.no_cache_control_op, Cow::Borrowed("default"));
        }
        for rule in self.browser_cache_rule.iter_mut().flatten() {
            if let Value::Value(rule) = rule {
                set_default(&mut rule.ignore_cache_time, false);
                set_default(&mut rule.cachetime, 0);
            }
        }
        if let Value::Value(rewrite) = &mut self.cache_url_rewrite {
            set_default(&mut rewrite.sort_querystring, false);
            set_default(&mut rewrite.ignore_all_query_string, false);
        }
        set_default(&mut self.browser_cache_rule, Vec::new());
        set_default(&mut self.cache_errstatus, Vec::new());
    }

    pub fn to_api(&self) -> CacheConf {
        CacheConf {
            nocache: bool_or(&self.nocache, false),
            cache_rule: self.cache_rule.as_ref_option().map(|rule| ConfCacheRule {
                cachetime: number_or(&rule.cachetime, 0),
                ignore_cache_time: bool_or(&rule.ignore_cache_time, false),
                ignore_nocache_header: bool_or(&rule.ignore_nocache_header, false),
                no_cache_control_op: string_or(&rule.no_cache_control_op, "default").to_owned(),
            }),
            browser_cache_rule: known(&self.browser_cache_rule)
                .map(|rule| BrowserCacheRule {
                    cache_type: string_or(&rule.cache_type, "follow").to_owned(),
                    ignore_cache_time: bool_or(&rule.ignore_cache_time, false),
                    cachetime: number_or(&rule.cachetime, 0),
                })
                .collect(),
            cache_errstatus: known(&self.cache_errstatus)
                .map(|errstatus| CacheErrStatus {
                    cachetime: number_or(&errstatus.cachetime, 0),
                    err_status: errstatus
                        .err_status
                        .iter()
                        .flatten()
                        .filter_map(|status| status.as_ref_option().copied())
                        .collect(),
                })
                .collect(),
            cache_url_rewrite: self
                .cache_url_rewrite
                .as_ref_option()
                .map(|rewrite| CacheUrlRewrite {
                    sort_querystring: bool_or(&rewrite.sort_querystring, false),
                    ignore_all_query_string: bool_or(&rewrite.ignore_all_query_string, false),
                    query_args: list_strings(&rewrite.query_args),
                    cookies: list_strings(&rewrite.cookies),
                }),
            cache_share: self.cache_share.as_ref_option().map(|share| CacheShare {
                scheme: string_or(&share.scheme, "http").to_owned(),
            }),
        }
    }

    /// Rebuild the block from the API, `prior` tells apart empty and unset lists
    pub fn from_api(conf: &CacheConf, prior: Option<&ConfState>) -> Self {
        let prior_rewrite = prior.and_then(|prior| prior.cache_url_rewrite.as_ref_option());
        Self {
            nocache: Value::Value(conf.nocache),
            cache_rule: conf
                .cache_rule
                .as_ref()
                .map(|rule| CacheTimeState {
                    cachetime: Value::Value(rule.cachetime),
                    ignore_cache_time: Value::Value(rule.ignore_cache_time),
                    ignore_nocache_header: Value::Value(rule.ignore_nocache_header),
                    no_cache_control_op: if rule.no_cache_control_op.is_empty() {
                        Value::Value(Cow::Borrowed("default"))
                    } else {
                        string(&rule.no_cache_control_op)
                    },
                })
                .into(),
            browser_cache_rule: blocks(&conf.browser_cache_rule, |rule| BrowserCacheState {
                cache_type: string(&rule.cache_type),
                ignore_cache_time: Value::Value(rule.ignore_cache_time),
                cachetime: Value::Value(rule.cachetime),
            }),
            cache_errstatus: blocks(&conf.cache_errstatus, |errstatus| ErrStatusState {
                cachetime: Value::Value(errstatus.cachetime),
                err_status: Value::Value(
                    errstatus.err_status.iter().copied().map(Value::Value).collect(),
                ),
            }),
            cache_url_rewrite: conf
                .cache_url_rewrite
                .as_ref()
                .map(|rewrite| UrlRewriteState {
                    sort_querystring: Value::Value(rewrite.sort_querystring),
                    ignore_all_query_string: Value::Value(rewrite.ignore_all_query_string),
                    query_args: strings_or_null(
                        &rewrite.query_args,
                        prior_rewrite.map(|prior| &prior.query_args),
                    ),
                    cookies: strings_or_null(
                        &rewrite.cookies,
                        prior_rewrite.map(|prior| &prior.cookies),
                    ),
                })
                .into(),
            cache_share: conf
                .cache_share
                .as_ref()
                .map(|share| CacheShareState {
                    scheme: string(&share.scheme),
                })
                .into(),
        }
    }

    pub fn block() -> Block {
        Block {
            attributes: map! {
                "nocache" => optional_computed(AttributeType::Bool, "Do not cache matching requests (default false)"),
            },
            blocks: map! {
                "cache_rule" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "cachetime" => required(AttributeType::Number, "Cache time in seconds"),
                        "ignore_cache_time" => optional_computed(AttributeType::Bool, "Ignore the cache time sent by the origin (default false)"),
                        "ignore_nocache_header" => optional_computed(AttributeType::Bool, "Cache even if the origin forbids it (default false)"),
                        "no_cache_control_op" => optional_computed(AttributeType::String, "Behaviour without Cache-Control header (default `default`)"),
                    },
                    description: Description::plain("Edge cache time"),
                    ..Default::default()
                }),
                "browser_cache_rule" => NestedBlock::List(Block {
                    attributes: map! {
                        "cache_type" => required(AttributeType::String, "follow, cache or nocache"),
                        "ignore_cache_time" => optional_computed(AttributeType::Bool, "Ignore the cache time sent by the origin (default false)"),
                        "cachetime" => optional_computed(AttributeType::Number, "Browser cache time in seconds (default 0)"),
                    },
                    description: Description::plain("Browser cache"),
                    ..Default::default()
                }),
                "cache_errstatus" => NestedBlock::List(Block {
                    attributes: map! {
                        "cachetime" => required(AttributeType::Number, "Cache time in seconds"),
                        "err_status" => required(number_list(), "HTTP error statuses to cache"),
                    },
                    description: Description::plain("Caching of error responses"),
                    ..Default::default()
                }),
                "cache_url_rewrite" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "sort_querystring" => optional_computed(AttributeType::Bool, "Sort the query string in the cache key (default false)"),
                        "ignore_all_query_string" => optional_computed(AttributeType::Bool, "Drop the query string from the cache key (default false)"),
                        "query_args" => optional(string_list(), "Query arguments kept in the cache key"),
                        "cookies" => optional(string_list(), "Cookies added to the cache key"),
                    },
                    description: Description::plain("Cache key rewriting"),
                    ..Default::default()
                }),
                "cache_share" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "scheme" => required(AttributeType::String, "http or https"),
                    },
                    description: Description::plain("Share the cache between HTTP and HTTPS"),
                    ..Default::default()
                }),
            },
            description: Description::plain("Behaviour of the rule"),
            ..Default::default()
        }
    }
}

impl<'a> WithValidate for BrowserCacheState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.cache_type,
            &["follow", "cache", "nocache"],
            attr_path.clone().attribute("cache_type"),
        );
        check_range(diags, &self.cachetime, 0..=i64::MAX, attr_path.attribute("cachetime"));
    }
}

impl WithValidate for ErrStatusState {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_range(
            diags,
            &self.cachetime,
            0..=i64::MAX,
            attr_path.clone().attribute("cachetime"),
        );
        for (i, status) in self.err_status.iter().flatten().enumerate() {
            check_range(
                diags,
                status,
                400..=599,
                attr_path.clone().attribute("err_status").index(i as i64),
            );
        }
    }
}

impl<'a> WithValidate for ConfState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(rule) = &self.cache_rule {
            let path = attr_path.clone().attribute("cache_rule");
            if self.nocache == Value::Value(true) {
                diags.error_short("`cache_rule` cannot be set with `nocache`", path.clone());
            }
            check_range(diags, &rule.cachetime, 0..=i64::MAX, path.index(0).attribute("cachetime"));
        }
        validate_list(
            diags,
            &self.browser_cache_rule,
            attr_path.clone().attribute("browser_cache_rule"),
        );
        validate_list(
            diags,
            &self.cache_errstatus,
            attr_path.clone().attribute("cache_errstatus"),
        );
        if let Value::Value(share) = &self.cache_share {
            check_one_of(
                diags,
                &share.scheme,
                &["http", "https"],
                attr_path.attribute("cache_share").index(0).attribute("scheme"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::strings_list;

    fn full<'a>() -> ConfState<'a> {
        ConfState {
            nocache: Value::Value(false),
            cache_rule: Value::Value(CacheTimeState {
                cachetime: Value::Value(3600),
                ignore_cache_time: Value::Value(true),
                ignore_nocache_header: Value::Value(false),
                no_cache_control_op: "default".into(),
            }),
            browser_cache_rule: Value::Value(vec![Value::Value(BrowserCacheState {
                cache_type: "cache".into(),
                ignore_cache_time: Value::Value(false),
                cachetime: Value::Value(60),
            })]),
            cache_errstatus: Value::Value(vec![Value::Value(ErrStatusState {
                cachetime: Value::Value(10),
                err_status: Value::Value(vec![Value::Value(404), Value::Value(502)]),
            })]),
            cache_url_rewrite: Value::Value(UrlRewriteState {
                sort_querystring: Value::Value(true),
                ignore_all_query_string: Value::Value(false),
                query_args: strings_list(vec!["v"]),
                cookies: Value::Null,
            }),
            cache_share: Value::Value(CacheShareState {
                scheme: "https".into(),
            }),
        }
    }

    #[test]
    fn round_trip() {
        let conf = full();
        assert_eq!(ConfState::from_api(&conf.to_api(), Some(&conf)), conf);
    }

    #[test]
    fn empty_key_lists_round_trip() {
        let mut conf = full();
        conf.cache_url_rewrite = Value::Value(UrlRewriteState {
            sort_querystring: Value::Value(false),
            ignore_all_query_string: Value::Value(true),
            query_args: Value::Value(Vec::new()),
            cookies: Value::Null,
        });
        let api = conf.to_api();
        assert_eq!(ConfState::from_api(&api, Some(&conf)), conf);

        let imported = ConfState::from_api(&api, None);
        let rewrite = imported.cache_url_rewrite.as_ref_option().unwrap();
        assert!(rewrite.query_args.is_null());
        assert!(rewrite.cookies.is_null());
    }

    #[test]
    fn round_trip_of_minimal_conf() {
        let mut conf = ConfState {
            nocache: Value::Value(true),
            ..Default::default()
        };
        conf.normalize();
        assert_eq!(ConfState::from_api(&conf.to_api(), Some(&conf)), conf);
    }

    #[test]
    fn defaults() {
        let mut conf = ConfState {
            cache_rule: Value::Value(CacheTimeState {
                cachetime: Value::Value(60),
                ..Default::default()
            }),
            ..Default::default()
        };
        conf.normalize();
        assert_eq!(conf.nocache, Value::Value(false));
        let rule = conf.cache_rule.as_ref_option().unwrap();
        assert_eq!(rule.no_cache_control_op, Value::Value(Cow::Borrowed("default")));
        assert_eq!(rule.ignore_nocache_header, Value::Value(false));
        assert_eq!(conf.browser_cache_rule, Value::Value(vec![]));
        assert!(conf.cache_share.is_null());
    }

    #[test]
    fn absent_blocks_are_not_sent() {
        let api = ConfState::default().to_api();
        assert_eq!(
            serde_json::to_value(&api).unwrap(),
            serde_json::json!({"nocache": false})
        );
    }

    #[test]
    fn nocache_forbids_cache_rule() {
        let mut conf = full();
        conf.nocache = Value::Value(true);
        let mut diags = Diagnostics::default();
        conf.validate(&mut diags, AttributePath::new("conf"));
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("conf").attribute("cache_rule")
        );
    }

    #[test]
    fn error_statuses_are_checked() {
        let mut conf = full();
        conf.cache_errstatus = Value::Value(vec![Value::Value(ErrStatusState {
            cachetime: Value::Value(-1),
            err_status: Value::Value(vec![Value::Value(404), Value::Value(200)]),
        })]);
        let mut diags = Diagnostics::default();
        conf.validate(&mut diags, AttributePath::new("conf"));
        let paths: Vec<_> = diags.errors.iter().map(|e| e.attribute.clone()).collect();
        let errstatus = AttributePath::new("conf").attribute("cache_errstatus").index(0);
        assert_eq!(
            paths,
            vec![
                errstatus.clone().attribute("cachetime"),
                errstatus.attribute("err_status").index(1),
            ]
        );
    }

    #[test]
    fn valid_conf() {
        let mut diags = Diagnostics::default();
        full().validate(&mut diags, AttributePath::new("conf"));
        assert!(diags.errors.is_empty());
    }
}
