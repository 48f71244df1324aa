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

//! Conversion between the `config` block of a CDN domain and the API configuration items
//!
//! Blocks allowing a single item are nested as [`NestedBlock::Optional`]: Terraform stores them
//! as a list of at most one element, and [`value::serde_as_vec`] unwraps them into a nullable value.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, NestedBlock};
use tf_provider::value::{Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::{map, value, AttributePath, Diagnostics};

use crate::schema::{optional, optional_computed, required, string_list};
use crate::service::cdn::{
    CacheRule, Compress, DomainConfig, HeadControl, Https, IpAccess, Origin, OriginHost, Referer,
    Timeouts,
};
use crate::utils::{
    bool_or, check_not_empty, check_one_of, check_range, list_strings, number_or, set_default,
    string_or, string_value, strings_list, strings_or_null, validate_list, WithValidate,
};

pub const ORIGIN: &str = "origin";
pub const ORIGIN_HOST: &str = "origin_host";
pub const CACHE_RULE: &str = "cache_rule";
pub const REFERER: &str = "referer";
pub const IP_ACCESS: &str = "ip_access";
pub const HTTPS: &str = "https";
pub const COMPRESS: &str = "compress";
pub const HEAD_CONTROL: &str = "head_control";
pub const TIMEOUT: &str = "timeout";

/// Every configuration item, in the order they are requested
pub const CONFIG_ITEMS: [&str; 9] = [
    ORIGIN,
    ORIGIN_HOST,
    CACHE_RULE,
    REFERER,
    IP_ACCESS,
    HTTPS,
    COMPRESS,
    HEAD_CONTROL,
    TIMEOUT,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OriginState<'a> {
    #[serde(borrow = "'a")]
    pub origin_type: ValueString<'a>,
    pub addresses: ValueList<ValueString<'a>>,
    pub priority: ValueNumber,
    pub port: ValueNumber,
    pub protocol: ValueString<'a>,
    pub weight: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OriginHostState<'a> {
    #[serde(borrow = "'a")]
    pub host: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheRuleState<'a> {
    #[serde(borrow = "'a")]
    pub rule_type: ValueString<'a>,
    pub pattern: ValueString<'a>,
    pub ttl: ValueNumber,
    pub ignore_query: ValueBool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RefererState<'a> {
    #[serde(borrow = "'a")]
    pub referer_type: ValueString<'a>,
    pub list: ValueList<ValueString<'a>>,
    pub allow_empty: ValueBool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IpAccessState<'a> {
    #[serde(borrow = "'a")]
    pub access_type: ValueString<'a>,
    pub list: ValueList<ValueString<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HttpsState<'a> {
    #[serde(borrow = "'a")]
    pub cert_id: ValueString<'a>,
    pub http2: ValueBool,
    pub force_https: ValueString<'a>,
    pub ocsp_stapling: ValueBool,
    pub min_tls_version: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CompressState<'a> {
    pub enabled: ValueBool,
    #[serde(borrow = "'a")]
    pub file_types: ValueList<ValueString<'a>>,
    pub min_size: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HeadControlState<'a> {
    #[serde(borrow = "'a")]
    pub direction: ValueString<'a>,
    pub action: ValueString<'a>,
    pub key: ValueString<'a>,
    pub value: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeoutState {
    pub connect_timeout: ValueNumber,
    pub read_timeout: ValueNumber,
}

/// Content of the `config` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfigState<'a> {
    #[serde(borrow = "'a")]
    pub origin: ValueList<Value<OriginState<'a>>>,
    #[serde(with = "value::serde_as_vec")]
    pub origin_host: Value<OriginHostState<'a>>,
    pub cache_rule: ValueList<Value<CacheRuleState<'a>>>,
    #[serde(with = "value::serde_as_vec")]
    pub referer: Value<RefererState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub ip_access: Value<IpAccessState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub https: Value<HttpsState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub compress: Value<CompressState<'a>>,
    pub head_control: ValueList<Value<HeadControlState<'a>>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeout: Value<TimeoutState>,
}

fn text(value: &ValueString, default: &str) -> String {
    string_or(value, default).to_owned()
}

fn known_items<T>(list: &ValueList<Value<T>>) -> impl Iterator<Item = &T> {
    list.iter().flatten().filter_map(Value::as_ref_option)
}

fn has_items<T>(list: &ValueList<Value<T>>) -> bool {
    match list {
        Value::Value(items) => !items.is_empty(),
        Value::Null => false,
        Value::Unknown => true,
    }
}

fn items_of<T, U, F>(items: &Option<Vec<T>>, f: F) -> ValueList<Value<U>>
where
    F: Fn(&T) -> U,
{
    Value::Value(
        items
            .iter()
            .flatten()
            .map(|item| Value::Value(f(item)))
            .collect(),
    )
}

fn string<'a>(s: &str) -> ValueString<'a> {
    Value::Value(Cow::Owned(s.to_owned()))
}

impl<'a> OriginState<'a> {
    fn to_api(&self) -> Origin {
        Origin {
            origin_type: text(&self.origin_type, "ip"),
            addresses: list_strings(&self.addresses),
            priority: number_or(&self.priority, 1),
            port: number_or(&self.port, 80),
            protocol: text(&self.protocol, "http"),
            weight: number_or(&self.weight, 10),
        }
    }
    fn from_api(origin: &Origin) -> Self {
        Self {
            origin_type: string(&origin.origin_type),
            addresses: strings_list(origin.addresses.iter().cloned()),
            priority: Value::Value(origin.priority),
            port: Value::Value(origin.port),
            protocol: string(&origin.protocol),
            weight: Value::Value(origin.weight),
        }
    }
    fn normalize(&mut self) {
        set_default(&mut self.priority, 1);
        set_default(&mut self.port, 80);
        set_default(&mut self.protocol, Cow::Borrowed("http"));
        set_default(&mut self.weight, 10);
    }
}

impl<'a> WithValidate for OriginState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.origin_type,
            &["ip", "domain"],
            attr_path.clone().attribute("origin_type"),
        );
        if matches!(&self.addresses, Value::Value(addresses) if addresses.is_empty()) {
            diags.error_short(
                "An origin needs at least one address",
                attr_path.clone().attribute("addresses"),
            );
        }
        check_range(diags, &self.priority, 1..=2, attr_path.clone().attribute("priority"));
        check_range(diags, &self.port, 1..=65535, attr_path.clone().attribute("port"));
        check_one_of(
            diags,
            &self.protocol,
            &["http", "https", "follow"],
            attr_path.clone().attribute("protocol"),
        );
        check_range(diags, &self.weight, 1..=100, attr_path.attribute("weight"));
    }
}

impl<'a> CacheRuleState<'a> {
    fn to_api(&self) -> CacheRule {
        CacheRule {
            rule_type: text(&self.rule_type, "all"),
            pattern: text(&self.pattern, ""),
            ttl: number_or(&self.ttl, 0),
            ignore_query: bool_or(&self.ignore_query, false),
        }
    }
    fn from_api(rule: &CacheRule) -> Self {
        Self {
            rule_type: string(&rule.rule_type),
            pattern: string_value(rule.pattern.as_str()),
            ttl: Value::Value(rule.ttl),
            ignore_query: Value::Value(rule.ignore_query),
        }
    }
    fn normalize(&mut self) {
        set_default(&mut self.ignore_query, false);
    }
}

impl<'a> WithValidate for CacheRuleState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.rule_type,
            &["ext", "dir", "path", "all"],
            attr_path.clone().attribute("rule_type"),
        );
        check_range(diags, &self.ttl, 0..=i64::MAX, attr_path.attribute("ttl"));
    }
}

impl<'a> HeadControlState<'a> {
    fn to_api(&self) -> HeadControl {
        HeadControl {
            direction: text(&self.direction, "response"),
            action: text(&self.action, "set"),
            key: text(&self.key, ""),
            value: text(&self.value, ""),
        }
    }
    fn from_api(head: &HeadControl) -> Self {
        Self {
            direction: string(&head.direction),
            action: string(&head.action),
            key: string(&head.key),
            value: string_value(head.value.as_str()),
        }
    }
}

impl<'a> WithValidate for HeadControlState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.direction,
            &["request", "response"],
            attr_path.clone().attribute("direction"),
        );
        check_one_of(
            diags,
            &self.action,
            &["add", "set", "delete"],
            attr_path.clone().attribute("action"),
        );
        check_not_empty(diags, &self.key, attr_path.clone().attribute("key"));
        if self.action.as_deref_option() != Some("delete") && self.value.is_null() {
            diags.error_short(
                "`value` is required unless the header is deleted",
                attr_path.attribute("value"),
            );
        }
    }
}

impl<'a> ConfigState<'a> {
    /// Check if the item `name` is present in the block
    pub fn has_item(&self, name: &str) -> bool {
        match name {
            ORIGIN => has_items(&self.origin),
            ORIGIN_HOST => !self.origin_host.is_null(),
            CACHE_RULE => has_items(&self.cache_rule),
            REFERER => !self.referer.is_null(),
            IP_ACCESS => !self.ip_access.is_null(),
            HTTPS => !self.https.is_null(),
            COMPRESS => !self.compress.is_null(),
            HEAD_CONTROL => has_items(&self.head_control),
            TIMEOUT => !self.timeout.is_null(),
            _ => false,
        }
    }

    /// Names of the items present in the block, to be requested on read
    pub fn config_items(&self) -> Vec<&'static str> {
        CONFIG_ITEMS
            .into_iter()
            .filter(|item| self.has_item(item))
            .collect()
    }

    /// Items present in `prior` and removed in `planned`
    pub fn removed_items(prior: &ConfigState, planned: &ConfigState) -> Vec<&'static str> {
        CONFIG_ITEMS
            .into_iter()
            .filter(|item| prior.has_item(item) && !planned.has_item(item))
            .collect()
    }

    /// Fill the defaults of the items that are set
    pub fn normalize(&mut self) {
        for origin in self.origin.iter_mut().flatten() {
            if let Value::Value(origin) = origin {
                origin.normalize();
            }
        }
        for rule in self.cache_rule.iter_mut().flatten() {
            if let Value::Value(rule) = rule {
                rule.normalize();
            }
        }
        if let Value::Value(referer) = &mut self.referer {
            set_default(&mut referer.allow_empty, true);
        }
        if let Value::Value(https) = &mut self.https {
            set_default(&mut https.http2, false);
            set_default(&mut https.force_https, Cow::Borrowed("0"));
            set_default(&mut https.ocsp_stapling, false);
            set_default(&mut https.min_tls_version, Cow::Borrowed("TLSv1.2"));
        }
        if let Value::Value(compress) = &mut self.compress {
            set_default(&mut compress.enabled, true);
            set_default(&mut compress.min_size, 1024);
        }
        if let Value::Value(timeout) = &mut self.timeout {
            set_default(&mut timeout.connect_timeout, 10);
            set_default(&mut timeout.read_timeout, 30);
        }
        if self.origin.is_null() {
            self.origin = Value::Value(Vec::new());
        }
        if self.cache_rule.is_null() {
            self.cache_rule = Value::Value(Vec::new());
        }
        if self.head_control.is_null() {
            self.head_control = Value::Value(Vec::new());
        }
    }

    /// Build the API configuration from the known values, applying defaults
    pub fn to_api(&self) -> DomainConfig {
        DomainConfig {
            origin: has_items(&self.origin)
                .then(|| known_items(&self.origin).map(OriginState::to_api).collect()),
            origin_host: self.origin_host.as_ref_option().map(|host| OriginHost {
                host: text(&host.host, ""),
            }),
            cache_rule: has_items(&self.cache_rule)
                .then(|| known_items(&self.cache_rule).map(CacheRuleState::to_api).collect()),
            referer: self.referer.as_ref_option().map(|referer| Referer {
                referer_type: text(&referer.referer_type, "blacklist"),
                list: list_strings(&referer.list),
                allow_empty: bool_or(&referer.allow_empty, true),
            }),
            ip_access: self.ip_access.as_ref_option().map(|access| IpAccess {
                access_type: text(&access.access_type, "blacklist"),
                list: list_strings(&access.list),
            }),
            https: self.https.as_ref_option().map(|https| Https {
                cert_id: text(&https.cert_id, ""),
                http2: bool_or(&https.http2, false),
                force_https: text(&https.force_https, "0"),
                ocsp_stapling: bool_or(&https.ocsp_stapling, false),
                min_tls_version: text(&https.min_tls_version, "TLSv1.2"),
            }),
            compress: self.compress.as_ref_option().map(|compress| Compress {
                enabled: bool_or(&compress.enabled, true),
                file_types: list_strings(&compress.file_types),
                min_size: number_or(&compress.min_size, 1024),
            }),
            head_control: has_items(&self.head_control).then(|| {
                known_items(&self.head_control)
                    .map(HeadControlState::to_api)
                    .collect()
            }),
            timeout: self.timeout.as_ref_option().map(|timeout| Timeouts {
                connect_timeout: number_or(&timeout.connect_timeout, 10),
                read_timeout: number_or(&timeout.read_timeout, 30),
            }),
        }
    }

    /// Rebuild the block from the API configuration
    ///
    /// With a `prior` block, only the items it holds are populated, so that items managed
    /// outside of Terraform do not show up as drift.
    pub fn from_api(config: &DomainConfig, prior: Option<&ConfigState>) -> Self {
        let wanted = |item: &str| prior.map_or(true, |prior| prior.has_item(item));
        let mut state = ConfigState {
            origin: Value::Value(Vec::new()),
            cache_rule: Value::Value(Vec::new()),
            head_control: Value::Value(Vec::new()),
            ..Default::default()
        };

        if wanted(ORIGIN) {
            state.origin = items_of(&config.origin, OriginState::from_api);
        }
        if wanted(ORIGIN_HOST) {
            state.origin_host = config
                .origin_host
                .as_ref()
                .map(|host| OriginHostState {
                    host: string(&host.host),
                })
                .into();
        }
        if wanted(CACHE_RULE) {
            state.cache_rule = items_of(&config.cache_rule, CacheRuleState::from_api);
        }
        if wanted(REFERER) {
            state.referer = config
                .referer
                .as_ref()
                .map(|referer| RefererState {
                    referer_type: string(&referer.referer_type),
                    list: strings_list(referer.list.iter().cloned()),
                    allow_empty: Value::Value(referer.allow_empty),
                })
                .into();
        }
        if wanted(IP_ACCESS) {
            state.ip_access = config
                .ip_access
                .as_ref()
                .map(|access| IpAccessState {
                    access_type: string(&access.access_type),
                    list: strings_list(access.list.iter().cloned()),
                })
                .into();
        }
        if wanted(HTTPS) {
            state.https = config
                .https
                .as_ref()
                .map(|https| HttpsState {
                    cert_id: string(&https.cert_id),
                    http2: Value::Value(https.http2),
                    force_https: string(&https.force_https),
                    ocsp_stapling: Value::Value(https.ocsp_stapling),
                    min_tls_version: string(&https.min_tls_version),
                })
                .into();
        }
        if wanted(COMPRESS) {
            state.compress = config
                .compress
                .as_ref()
                .map(|compress| CompressState {
                    enabled: Value::Value(compress.enabled),
                    file_types: strings_or_null(
                        &compress.file_types,
                        prior
                            .and_then(|prior| prior.compress.as_ref_option())
                            .map(|prior| &prior.file_types),
                    ),
                    min_size: Value::Value(compress.min_size),
                })
                .into();
        }
        if wanted(HEAD_CONTROL) {
            state.head_control = items_of(&config.head_control, HeadControlState::from_api);
        }
        if wanted(TIMEOUT) {
            state.timeout = config
                .timeout
                .as_ref()
                .map(|timeout| TimeoutState {
                    connect_timeout: Value::Value(timeout.connect_timeout),
                    read_timeout: Value::Value(timeout.read_timeout),
                })
                .into();
        }
        state
    }

    pub fn block() -> Block {
        Block {
            blocks: map! {
                ORIGIN => NestedBlock::List(Block {
                    attributes: map! {
                        "origin_type" => required(AttributeType::String, "Kind of origin: ip or domain"),
                        "addresses" => required(string_list(), "Addresses of the origin servers"),
                        "priority" => optional_computed(AttributeType::Number, "1 for master, 2 for backup (default 1)"),
                        "port" => optional_computed(AttributeType::Number, "Port of the origin (default 80)"),
                        "protocol" => optional_computed(AttributeType::String, "Protocol used to reach the origin: http, https or follow (default http)"),
                        "weight" => optional_computed(AttributeType::Number, "Load balancing weight (default 10)"),
                    },
                    description: Description::plain("Origin servers"),
                    ..Default::default()
                }),
                ORIGIN_HOST => NestedBlock::Optional(Block {
                    attributes: map! {
                        "host" => required(AttributeType::String, "Host header sent to the origin"),
                    },
                    description: Description::plain("Host used when contacting the origin"),
                    ..Default::default()
                }),
                CACHE_RULE => NestedBlock::List(Block {
                    attributes: map! {
                        "rule_type" => required(AttributeType::String, "Kind of match: ext, dir, path or all"),
                        "pattern" => optional(AttributeType::String, "Pattern matched by the rule"),
                        "ttl" => required(AttributeType::Number, "Time to live in seconds"),
                        "ignore_query" => optional_computed(AttributeType::Bool, "Ignore the query string in the cache key (default false)"),
                    },
                    description: Description::plain("Edge cache rules"),
                    ..Default::default()
                }),
                REFERER => NestedBlock::Optional(Block {
                    attributes: map! {
                        "referer_type" => required(AttributeType::String, "whitelist or blacklist"),
                        "list" => required(string_list(), "Referers of the list"),
                        "allow_empty" => optional_computed(AttributeType::Bool, "Allow requests without referer (default true)"),
                    },
                    description: Description::plain("Referer access control"),
                    ..Default::default()
                }),
                IP_ACCESS => NestedBlock::Optional(Block {
                    attributes: map! {
                        "access_type" => required(AttributeType::String, "whitelist or blacklist"),
                        "list" => required(string_list(), "IP addresses or CIDR of the list"),
                    },
                    description: Description::plain("IP access control"),
                    ..Default::default()
                }),
                HTTPS => NestedBlock::Optional(Block {
                    attributes: map! {
                        "cert_id" => required(AttributeType::String, "Id of the certificate"),
                        "http2" => optional_computed(AttributeType::Bool, "Enable HTTP/2 (default false)"),
                        "force_https" => optional_computed(AttributeType::String, "Redirect HTTP: 0, 301 or 302 (default 0)"),
                        "ocsp_stapling" => optional_computed(AttributeType::Bool, "Enable OCSP stapling (default false)"),
                        "min_tls_version" => optional_computed(AttributeType::String, "Minimum TLS version (default TLSv1.2)"),
                    },
                    description: Description::plain("HTTPS settings"),
                    ..Default::default()
                }),
                COMPRESS => NestedBlock::Optional(Block {
                    attributes: map! {
                        "enabled" => optional_computed(AttributeType::Bool, "Enable compression (default true)"),
                        "file_types" => optional(string_list(), "Content types to compress"),
                        "min_size" => optional_computed(AttributeType::Number, "Minimum size to compress in bytes (default 1024)"),
                    },
                    description: Description::plain("Compression"),
                    ..Default::default()
                }),
                HEAD_CONTROL => NestedBlock::List(Block {
                    attributes: map! {
                        "direction" => required(AttributeType::String, "request or response"),
                        "action" => required(AttributeType::String, "add, set or delete"),
                        "key" => required(AttributeType::String, "Name of the header"),
                        "value" => optional(AttributeType::String, "Value of the header"),
                    },
                    description: Description::plain("Header rewriting"),
                    ..Default::default()
                }),
                TIMEOUT => NestedBlock::Optional(Block {
                    attributes: map! {
                        "connect_timeout" => optional_computed(AttributeType::Number, "Origin connection timeout in seconds (default 10)"),
                        "read_timeout" => optional_computed(AttributeType::Number, "Origin read timeout in seconds (default 30)"),
                    },
                    description: Description::plain("Origin timeouts"),
                    ..Default::default()
                }),
            },
            description: Description::plain("Configuration of the domain"),
            ..Default::default()
        }
    }
}

impl<'a> WithValidate for ConfigState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if matches!(&self.origin, Value::Value(origins) if origins.is_empty()) {
            diags.error_short(
                "At least one `origin` is required",
                attr_path.clone().attribute(ORIGIN),
            );
        }
        validate_list(diags, &self.origin, attr_path.clone().attribute(ORIGIN));
        validate_list(diags, &self.cache_rule, attr_path.clone().attribute(CACHE_RULE));
        validate_list(diags, &self.head_control, attr_path.clone().attribute(HEAD_CONTROL));

        if let Value::Value(referer) = &self.referer {
            check_one_of(
                diags,
                &referer.referer_type,
                &["whitelist", "blacklist"],
                attr_path.clone().attribute(REFERER).index(0).attribute("referer_type"),
            );
        }
        if let Value::Value(access) = &self.ip_access {
            check_one_of(
                diags,
                &access.access_type,
                &["whitelist", "blacklist"],
                attr_path.clone().attribute(IP_ACCESS).index(0).attribute("access_type"),
            );
        }
        if let Value::Value(https) = &self.https {
            let path = attr_path.clone().attribute(HTTPS).index(0);
            check_not_empty(diags, &https.cert_id, path.clone().attribute("cert_id"));
            check_one_of(
                diags,
                &https.force_https,
                &["0", "301", "302"],
                path.clone().attribute("force_https"),
            );
            check_one_of(
                diags,
                &https.min_tls_version,
                &["TLSv1.0", "TLSv1.1", "TLSv1.2", "TLSv1.3"],
                path.attribute("min_tls_version"),
            );
        }
        if let Value::Value(compress) = &self.compress {
            check_range(
                diags,
                &compress.min_size,
                0..=i64::MAX,
                attr_path.clone().attribute(COMPRESS).index(0).attribute("min_size"),
            );
        }
        if let Value::Value(timeout) = &self.timeout {
            let path = attr_path.attribute(TIMEOUT).index(0);
            check_range(
                diags,
                &timeout.connect_timeout,
                1..=300,
                path.clone().attribute("connect_timeout"),
            );
            check_range(
                diags,
                &timeout.read_timeout,
                1..=3600,
                path.attribute("read_timeout"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin<'a>(address: &str) -> Value<OriginState<'a>> {
        Value::Value(OriginState {
            origin_type: "ip".into(),
            addresses: strings_list([address.to_owned()]),
            ..Default::default()
        })
    }

    fn sample<'a>() -> ConfigState<'a> {
        ConfigState {
            origin: Value::Value(vec![origin("192.0.2.10")]),
            https: Value::Value(HttpsState {
                cert_id: "cert-1".into(),
                ..Default::default()
            }),
            timeout: Value::Value(TimeoutState::default()),
            ..Default::default()
        }
    }

    #[test]
    fn normalize_fills_defaults_of_present_items() {
        let mut config = sample();
        config.normalize();

        let Value::Value(origins) = &config.origin else {
            panic!("origins should be set")
        };
        let Value::Value(origin) = &origins[0] else {
            panic!("origin should be set")
        };
        assert_eq!(origin.priority, Value::Value(1));
        assert_eq!(origin.port, Value::Value(80));
        assert_eq!(origin.protocol, Value::Value(Cow::Borrowed("http")));
        assert_eq!(origin.weight, Value::Value(10));

        let Value::Value(https) = &config.https else {
            panic!("https should be set")
        };
        assert_eq!(https.force_https, Value::Value(Cow::Borrowed("0")));
        assert_eq!(https.min_tls_version, Value::Value(Cow::Borrowed("TLSv1.2")));
        assert_eq!(config.timeout.as_ref_option().unwrap().read_timeout, Value::Value(30));

        assert!(config.referer.is_null());
        assert_eq!(config.cache_rule, Value::Value(vec![]));
    }

    #[test]
    fn to_api_drops_absent_items() {
        let api = sample().to_api();
        let origins = api.origin.unwrap();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].addresses, vec!["192.0.2.10".to_owned()]);
        assert_eq!(origins[0].port, 80);
        assert_eq!(api.https.unwrap().cert_id, "cert-1");
        assert_eq!(
            api.timeout,
            Some(Timeouts {
                connect_timeout: 10,
                read_timeout: 30
            })
        );
        assert!(api.referer.is_none());
        assert!(api.cache_rule.is_none());
        assert!(api.head_control.is_none());
    }

    #[test]
    fn round_trip_of_normalized_config() {
        let mut config = sample();
        config.normalize();
        let rebuilt = ConfigState::from_api(&config.to_api(), Some(&config));
        assert_eq!(rebuilt, config);
    }

    #[test]
    fn empty_file_types_round_trip() {
        let mut config = sample();
        config.compress = Value::Value(CompressState {
            file_types: Value::Value(Vec::new()),
            ..Default::default()
        });
        config.normalize();
        let api = config.to_api();
        assert_eq!(ConfigState::from_api(&api, Some(&config)), config);

        let imported = ConfigState::from_api(&api, None);
        assert!(imported.compress.as_ref_option().unwrap().file_types.is_null());
    }

    #[test]
    fn from_api_only_populates_prior_items() {
        let api = DomainConfig {
            origin: Some(vec![Origin {
                origin_type: "domain".into(),
                addresses: vec!["origin.example".into()],
                priority: 1,
                port: 443,
                protocol: "https".into(),
                weight: 10,
            }]),
            referer: Some(Referer {
                referer_type: "whitelist".into(),
                list: vec!["a.example".into()],
                allow_empty: false,
            }),
            ..Default::default()
        };
        let prior = ConfigState {
            origin: Value::Value(vec![origin("192.0.2.10")]),
            ..Default::default()
        };

        let state = ConfigState::from_api(&api, Some(&prior));
        assert!(state.has_item(ORIGIN));
        assert!(!state.has_item(REFERER));

        let imported = ConfigState::from_api(&api, None);
        assert!(imported.has_item(REFERER));
        assert_eq!(imported.config_items(), vec![ORIGIN, REFERER]);
    }

    #[test]
    fn removed_items_are_detected() {
        let prior = sample();
        let planned = ConfigState {
            origin: prior.origin.clone(),
            compress: Value::Value(CompressState::default()),
            ..Default::default()
        };
        assert_eq!(ConfigState::removed_items(&prior, &planned), vec![HTTPS, TIMEOUT]);
        assert_eq!(planned.config_items(), vec![ORIGIN, COMPRESS]);
    }

    #[test]
    fn unknown_lists_are_not_removed() {
        let prior = sample();
        let planned = ConfigState {
            origin: Value::Unknown,
            https: prior.https.clone(),
            timeout: prior.timeout.clone(),
            ..Default::default()
        };
        assert!(ConfigState::removed_items(&prior, &planned).is_empty());
    }

    #[test]
    fn validation_reports_nested_paths() {
        let config = ConfigState {
            origin: Value::Value(vec![Value::Value(OriginState {
                origin_type: "ftp".into(),
                addresses: Value::Value(vec![]),
                port: Value::Value(70000),
                ..Default::default()
            })]),
            https: Value::Value(HttpsState {
                cert_id: "c".into(),
                force_https: "303".into(),
                ..Default::default()
            }),
            head_control: Value::Value(vec![Value::Value(HeadControlState {
                direction: "response".into(),
                action: "set".into(),
                key: "X-Test".into(),
                value: Value::Null,
            })]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        config.validate(&mut diags, AttributePath::new("config").index(0));
        let paths: Vec<_> = diags.errors.iter().map(|e| e.attribute.clone()).collect();
        let origin = AttributePath::new("config").index(0).attribute(ORIGIN).index(0);
        assert!(paths.contains(&origin.clone().attribute("origin_type")));
        assert!(paths.contains(&origin.clone().attribute("addresses")));
        assert!(paths.contains(&origin.attribute("port")));
        assert!(paths.contains(
            &AttributePath::new("config")
                .index(0)
                .attribute(HTTPS)
                .index(0)
                .attribute("force_https")
        ));
        assert!(paths.contains(
            &AttributePath::new("config")
                .index(0)
                .attribute(HEAD_CONTROL)
                .index(0)
                .attribute("value")
        ));
        assert_eq!(diags.errors.len(), 5);
    }

    #[test]
    fn empty_origin_list_is_rejected() {
        let config = ConfigState {
            origin: Value::Value(vec![]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        config.validate(&mut diags, AttributePath::new("config").index(0));
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn block_nests_single_items_as_optional() {
        let block = ConfigState::block();
        assert_eq!(block.blocks.len(), CONFIG_ITEMS.len());
        assert!(matches!(block.blocks[HTTPS], NestedBlock::Optional(_)));
        assert!(matches!(block.blocks[ORIGIN], NestedBlock::List(_)));
    }
}
