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
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::{info, warn};

use crate::connection::oss::{ObjectMeta, ObjectUpload};
use crate::connection::Connection;
use crate::oss::bucket::ACLS;
use crate::schema::{computed, optional, optional_computed, required};
use crate::utils::{
    check_not_empty, check_one_of, no_errors, optional_string, replace_on_change, report,
    string_or,
};

#[derive(Debug, Clone, Default)]
pub struct OssObjectResource {
    connection: Connection,
}

impl OssObjectResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObjectState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub bucket: ValueString<'a>,
    pub key: ValueString<'a>,
    pub content: ValueString<'a>,
    pub content_base64: ValueString<'a>,
    pub source: ValueString<'a>,
    pub source_hash: ValueString<'a>,
    pub content_type: ValueString<'a>,
    pub cache_control: ValueString<'a>,
    pub acl: ValueString<'a>,
    pub etag: ValueString<'a>,
    pub size: ValueNumber,
}

impl<'a> ObjectState<'a> {
    /// Bytes to upload
    async fn body(&self) -> Result<Vec<u8>, String> {
        if let Value::Value(content) = &self.content {
            Ok(content.as_bytes().to_vec())
        } else if let Value::Value(encoded) = &self.content_base64 {
            STANDARD
                .decode(encoded.as_bytes())
                .map_err(|err| format!("`content_base64` is not valid base64: {err}"))
        } else if let Value::Value(source) = &self.source {
            tokio::fs::read(&**source)
                .await
                .map_err(|err| format!("Could not read `{source}`: {err}"))
        } else {
            Err("No content to upload".to_owned())
        }
    }

    fn content_changed(&self, prior: &ObjectState) -> bool {
        self.content != prior.content
            || self.content_base64 != prior.content_base64
            || self.source != prior.source
            || self.source_hash != prior.source_hash
            || self.content_type != prior.content_type
            || self.cache_control != prior.cache_control
            || self.acl != prior.acl
    }

    fn apply_meta(&mut self, meta: ObjectMeta) {
        let drifted = matches!(
            (&self.etag, &meta.etag),
            (Value::Value(known), Some(etag)) if known.as_ref() != etag.as_str()
        );
        if drifted {
            warn!(
                key = string_or(&self.key, ""),
                etag = ?meta.etag,
                "object changed outside of terraform"
            );
            // A null etag is planned as unknown, which uploads the content again
            self.etag = Value::Null;
        } else {
            self.etag = optional_string(meta.etag);
        }
        self.size = Value::Value(meta.size);
        if let Some(content_type) = meta.content_type {
            self.content_type = content_type.into();
        }
        self.cache_control = optional_string(meta.cache_control);
    }

    fn object_id(&self) -> String {
        format!(
            "{}/{}",
            string_or(&self.bucket, ""),
            string_or(&self.key, "")
        )
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of the file at `source`, unknown if it cannot be read yet
async fn source_hash<'b>(source: &ValueString<'_>) -> ValueString<'b> {
    match source {
        Value::Value(path) => match tokio::fs::read(&**path).await {
            Ok(bytes) => Value::Value(Cow::Owned(sha256_hex(&bytes))),
            Err(err) => {
                warn!(source = %path, error = %err, "could not hash the source file");
                Value::Unknown
            }
        },
        Value::Null => Value::Null,
        Value::Unknown => Value::Unknown,
    }
}

/// Split `<bucket>/<key>`
fn parse_import_id(id: &str) -> Option<(&str, &str)> {
    match id.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Some((bucket, key)),
        _ => None,
    }
}

#[async_trait]
impl Resource for OssObjectResource {
    type State<'a> = ObjectState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "`<bucket>/<key>`"),
                    "bucket" => required(AttributeType::String, "Bucket of the object"),
                    "key" => required(AttributeType::String, "Key of the object"),
                    "content" => optional(AttributeType::String, "Content of the object"),
                    "content_base64" => optional(AttributeType::String, "Content of the object encoded in base64"),
                    "source" => optional(AttributeType::String, "Local file uploaded as the object"),
                    "source_hash" => computed(AttributeType::String, "SHA-256 of the `source` file, a change uploads the object again"),
                    "content_type" => optional_computed(AttributeType::String, "MIME type of the object"),
                    "cache_control" => optional(AttributeType::String, "Cache-Control header of the object"),
                    "acl" => optional(AttributeType::String, "private, public-read or public-read-write"),
                    "etag" => computed(AttributeType::String, "ETag of the object"),
                    "size" => computed(AttributeType::Number, "Size of the object in bytes"),
                },
                description: Description::plain("Object stored in a bucket"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.bucket, AttributePath::new("bucket"));
        check_not_empty(diags, &config.key, AttributePath::new("key"));
        check_one_of(diags, &config.acl, &ACLS, AttributePath::new("acl"));

        let nb_values = config.content.is_value() as i32
            + config.content_base64.is_value() as i32
            + config.source.is_value() as i32;
        let nb_unknowns = config.content.is_unknown() as i32
            + config.content_base64.is_unknown() as i32
            + config.source.is_unknown() as i32;
        if !matches!((nb_values, nb_unknowns), (1, _) | (0, 1..)) {
            diags.root_error(
                "Invalid object content",
                "Exactly one of `content`, `content_base64` and `source` must be given. The others must be null.",
            );
        }
        if let Value::Value(encoded) = &config.content_base64 {
            if let Err(err) = STANDARD.decode(encoded.as_bytes()) {
                diags.error(
                    "Invalid `content_base64`",
                    err.to_string(),
                    AttributePath::new("content_base64"),
                );
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
        let result = clients
            .oss
            .head_object(string_or(&state.bucket, ""), string_or(&state.key, ""))
            .await;
        match result {
            Ok(meta) => state.apply_meta(meta),
            Err(err) if err.is_not_found() => {
                warn!(id = %state.object_id(), "object not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read object", err);
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
        state.source_hash = source_hash(&state.source).await;
        state.etag = Value::Unknown;
        state.size = Value::Unknown;
        if state.content_type.is_null() {
            state.content_type = Value::Unknown;
        }
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
        state.source_hash = source_hash(&state.source).await;
        let mut triggers = Vec::new();
        replace_on_change(&mut triggers, &prior_state.bucket, &state.bucket, "bucket");
        replace_on_change(&mut triggers, &prior_state.key, &state.key, "key");
        if !triggers.is_empty() {
            state.id = Value::Unknown;
        }
        if !triggers.is_empty() || state.content_changed(&prior_state) || state.etag.is_null() {
            state.etag = Value::Unknown;
            state.size = Value::Unknown;
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
        let mut state = planned_state;
        self.upload(diags, &mut state).await?;
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = planned_state;
        self.upload(diags, &mut state).await?;
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
        match clients
            .oss
            .delete_object(string_or(&state.bucket, ""), string_or(&state.key, ""))
            .await
        {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete object", err);
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
        let Some((bucket, key)) = parse_import_id(&id) else {
            diags.root_error(
                "Invalid import id",
                format!("`{id}` should be of the form `<bucket>/<key>`"),
            );
            return None;
        };
        let clients = self.connection.get(diags).await?;
        let (body, meta) = match clients.oss.get_object(bucket, key).await {
            Ok(object) => object,
            Err(err) => {
                report(diags, "Could not import object", err);
                return None;
            }
        };
        let mut state = ObjectState {
            id: id.clone().into(),
            bucket: bucket.to_owned().into(),
            key: key.to_owned().into(),
            ..Default::default()
        };
        match String::from_utf8(body) {
            Ok(content) => state.content = content.into(),
            Err(err) => state.content_base64 = STANDARD.encode(err.into_bytes()).into(),
        }
        state.apply_meta(meta);
        Some((state, Default::default()))
    }
}

impl OssObjectResource {
    async fn upload<'a>(&self, diags: &mut Diagnostics, state: &mut ObjectState<'a>) -> Option<()> {
        let clients = self.connection.get(diags).await?;
        let body = match state.body().await {
            Ok(body) => body,
            Err(err) => {
                diags.root_error("Could not read the object content", err);
                return None;
            }
        };
        let size = body.len() as i64;
        if state.source_hash.is_unknown() {
            state.source_hash = Value::Value(Cow::Owned(sha256_hex(&body)));
        }
        let upload = ObjectUpload {
            bucket: string_or(&state.bucket, ""),
            key: string_or(&state.key, ""),
            body,
            content_type: state.content_type.as_deref_option(),
            cache_control: state.cache_control.as_deref_option(),
            acl: state.acl.as_deref_option(),
        };
        let etag = match clients.oss.put_object(upload).await {
            Ok(etag) => etag,
            Err(err) => {
                report(diags, "Could not upload object", err);
                return None;
            }
        };
        info!(id = %state.object_id(), size, "object uploaded");

        state.id = state.object_id().into();
        state.etag = optional_string(etag);
        state.size = Value::Value(size);
        if !state.content_type.is_value() {
            let meta = clients
                .oss
                .head_object(string_or(&state.bucket, ""), string_or(&state.key, ""))
                .await;
            state.content_type = match meta {
                Ok(meta) => optional_string(meta.content_type),
                Err(err) => {
                    warn!(error = %err, "could not read the object content type");
                    Value::Value(Cow::Borrowed("binary/octet-stream"))
                }
            };
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exactly_one_content() {
        let resource = OssObjectResource::default();
        let base = ObjectState {
            bucket: "assets".into(),
            key: "index.html".into(),
            ..Default::default()
        };

        let mut diags = Diagnostics::default();
        assert!(resource.validate(&mut diags, base.clone()).await.is_none());

        let mut diags = Diagnostics::default();
        let both = ObjectState {
            content: "hello".into(),
            source: "index.html".into(),
            ..base.clone()
        };
        assert!(resource.validate(&mut diags, both).await.is_none());

        let mut diags = Diagnostics::default();
        let unknown = ObjectState {
            content: Value::Unknown,
            ..base.clone()
        };
        assert!(resource.validate(&mut diags, unknown).await.is_some());

        let mut diags = Diagnostics::default();
        let invalid = ObjectState {
            content_base64: "not base64!".into(),
            ..base
        };
        assert!(resource.validate(&mut diags, invalid).await.is_none());
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("content_base64")
        );
    }

    #[tokio::test]
    async fn body_is_decoded() {
        let state = ObjectState {
            content_base64: STANDARD.encode(b"\x00\x01binary").into(),
            ..Default::default()
        };
        assert_eq!(state.body().await.unwrap(), b"\x00\x01binary".to_vec());

        let state = ObjectState {
            content: "text".into(),
            ..Default::default()
        };
        assert_eq!(state.body().await.unwrap(), b"text".to_vec());

        let state = ObjectState {
            source: "/nonexistent/file".into(),
            ..Default::default()
        };
        assert!(state.body().await.is_err());
    }

    #[test]
    fn etag_drift_is_nulled() {
        let mut state = ObjectState {
            key: "index.html".into(),
            etag: "abc".into(),
            ..Default::default()
        };
        state.apply_meta(ObjectMeta {
            etag: Some("abc".into()),
            size: 5,
            ..Default::default()
        });
        assert_eq!(state.etag, Value::Value(Cow::Borrowed("abc")));
        assert_eq!(state.size, Value::Value(5));

        state.apply_meta(ObjectMeta {
            etag: Some("def".into()),
            size: 6,
            ..Default::default()
        });
        assert!(state.etag.is_null());
    }

    #[tokio::test]
    async fn drifted_object_is_uploaded_again() {
        let resource = OssObjectResource::default();
        let prior = ObjectState {
            id: "assets/index.html".into(),
            bucket: "assets".into(),
            key: "index.html".into(),
            content: "hello".into(),
            content_type: "text/html".into(),
            etag: Value::Null,
            size: Value::Value(5),
            ..Default::default()
        };
        let (planned, _, triggers) = resource
            .plan_update(
                &mut Diagnostics::default(),
                prior.clone(),
                prior.clone(),
                prior,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(triggers.is_empty());
        assert!(planned.etag.is_unknown());
        assert!(planned.size.is_unknown());
    }

    #[tokio::test]
    async fn edited_source_is_uploaded_again() {
        let path = std::env::temp_dir().join(format!("edge-object-{}.txt", std::process::id()));
        let source = path.to_string_lossy().into_owned();
        tokio::fs::write(&path, b"hello").await.unwrap();

        let resource = OssObjectResource::default();
        let prior = ObjectState {
            id: "assets/index.html".into(),
            bucket: "assets".into(),
            key: "index.html".into(),
            source: source.clone().into(),
            source_hash: sha256_hex(b"hello").into(),
            content_type: "text/html".into(),
            etag: "abc".into(),
            size: Value::Value(5),
            ..Default::default()
        };
        let plan = |prior: ObjectState<'static>| {
            let resource = resource.clone();
            async move {
                resource
                    .plan_update(
                        &mut Diagnostics::default(),
                        prior.clone(),
                        prior.clone(),
                        prior,
                        Default::default(),
                        Default::default(),
                    )
                    .await
                    .unwrap()
                    .0
            }
        };

        let unchanged = plan(prior.clone()).await;
        assert_eq!(unchanged.etag, Value::Value(Cow::Borrowed("abc")));
        assert_eq!(unchanged.source_hash, prior.source_hash);

        tokio::fs::write(&path, b"hello world").await.unwrap();
        let edited = plan(prior).await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(edited.etag.is_unknown());
        assert!(edited.size.is_unknown());
        assert_eq!(
            edited.source_hash,
            Value::Value(Cow::Owned(sha256_hex(b"hello world")))
        );
    }

    #[test]
    fn import_id_is_split() {
        assert_eq!(
            parse_import_id("assets/css/site.css"),
            Some(("assets", "css/site.css"))
        );
        assert_eq!(parse_import_id("assets"), None);
        assert_eq!(parse_import_id("/key"), None);
    }
}
