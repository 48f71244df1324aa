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
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::{info, warn};

use crate::connection::Connection;
use crate::schema::{computed, optional_computed, required};
use crate::utils::{
    bool_or, check_not_empty, check_one_of, no_errors, or_report, replace_on_change, report,
    set_default, string_or,
};

pub(crate) const ACLS: [&str; 3] = ["private", "public-read", "public-read-write"];

#[derive(Debug, Clone, Default)]
pub struct OssBucketResource {
    connection: Connection,
}

impl OssBucketResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BucketState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub bucket: ValueString<'a>,
    pub acl: ValueString<'a>,
    pub force_destroy: ValueBool,
}

impl<'a> BucketState<'a> {
    fn normalize(&mut self) {
        set_default(&mut self.acl, Cow::Borrowed("private"));
        set_default(&mut self.force_destroy, false);
    }
}

/// Bucket names follow the S3 naming rules
fn check_bucket_name(diags: &mut Diagnostics, bucket: &ValueString, attr_path: AttributePath) {
    check_not_empty(diags, bucket, attr_path.clone());
    if let Value::Value(name) = bucket {
        let valid = (3..=63).contains(&name.len())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
            && !name.starts_with(['-', '.'])
            && !name.ends_with(['-', '.']);
        if !valid {
            diags.error(
                "Invalid bucket name",
                format!(
                    "`{name}` should be 3 to 63 lowercase letters, digits, dots or hyphens, \
                     starting and ending with a letter or a digit"
                ),
                attr_path,
            );
        }
    }
}

#[async_trait]
impl Resource for OssBucketResource {
    type State<'a> = BucketState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Name of the bucket"),
                    "bucket" => required(AttributeType::String, "Name of the bucket"),
                    "acl" => optional_computed(AttributeType::String, "private, public-read or public-read-write (default private)"),
                    "force_destroy" => optional_computed(AttributeType::Bool, "Delete every object of the bucket before deleting it (default false)"),
                },
                description: Description::plain("Object storage bucket"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_bucket_name(diags, &config.bucket, AttributePath::new("bucket"));
        check_one_of(diags, &config.acl, &ACLS, AttributePath::new("acl"));
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let bucket = string_or(&state.bucket, "");
        match clients.oss.head_bucket(bucket).await {
            Ok(()) => (),
            Err(err) if err.is_not_found() => {
                warn!(bucket, "bucket not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read bucket", err);
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
        replace_on_change(&mut triggers, &prior_state.bucket, &state.bucket, "bucket");
        if !triggers.is_empty() {
            state.id = Value::Unknown;
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
        let mut state = planned_state;
        let bucket = string_or(&state.bucket, "").to_owned();
        or_report(
            diags,
            "Could not create bucket",
            clients
                .oss
                .create_bucket(&bucket, string_or(&state.acl, "private"))
                .await,
        )?;
        info!(bucket = %bucket, "bucket created");
        state.id = bucket.into();
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
        if prior_state.acl != planned_state.acl {
            let clients = self.connection.get(diags).await?;
            or_report(
                diags,
                "Could not update bucket acl",
                clients
                    .oss
                    .put_bucket_acl(
                        string_or(&planned_state.bucket, ""),
                        string_or(&planned_state.acl, "private"),
                    )
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
        let bucket = string_or(&state.bucket, "");
        if bool_or(&state.force_destroy, false) {
            match clients.oss.empty_bucket(bucket).await {
                Ok(deleted) => info!(bucket, deleted, "bucket emptied"),
                Err(err) if err.is_not_found() => return Some(()),
                Err(err) => {
                    report(diags, "Could not empty bucket", err);
                    return None;
                }
            }
        }
        match clients.oss.delete_bucket(bucket).await {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete bucket", err);
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
        or_report(
            diags,
            "Could not import bucket",
            clients.oss.head_bucket(&id).await,
        )?;
        let mut state = BucketState {
            id: id.clone().into(),
            bucket: id.into(),
            ..Default::default()
        };
        state.normalize();
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_errors(name: &str) -> usize {
        let mut diags = Diagnostics::default();
        check_bucket_name(&mut diags, &name.to_owned().into(), AttributePath::new("bucket"));
        diags.errors.len()
    }

    #[test]
    fn bucket_names() {
        assert_eq!(name_errors("assets-2024"), 0);
        assert_eq!(name_errors("my.bucket"), 0);
        assert_eq!(name_errors("ab"), 1);
        assert_eq!(name_errors("Assets"), 1);
        assert_eq!(name_errors("-assets"), 1);
        assert_eq!(name_errors("assets_"), 1);
        assert_eq!(name_errors(""), 2);
    }

    #[tokio::test]
    async fn defaults_are_planned() {
        let resource = OssBucketResource::default();
        let proposed = BucketState {
            bucket: "assets".into(),
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
        assert_eq!(planned.acl, Value::Value(Cow::Borrowed("private")));
        assert_eq!(planned.force_destroy, Value::Value(false));
        assert!(planned.id.is_unknown());
    }

    #[tokio::test]
    async fn acl_change_is_in_place() {
        let resource = OssBucketResource::default();
        let prior = BucketState {
            id: "assets".into(),
            bucket: "assets".into(),
            acl: "private".into(),
            force_destroy: Value::Value(false),
        };
        let proposed = BucketState {
            acl: "public-read".into(),
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
        assert!(triggers.is_empty());
        assert_eq!(planned.id, Value::Value(Cow::Borrowed("assets")));
    }
}
