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
use tracing::warn;

use crate::connection::oss::BucketInfo;
use crate::connection::Connection;
use crate::schema::{computed, computed_objects, optional, required};
use crate::utils::{check_not_empty, no_errors, optional_string, or_report, string_or};

#[derive(Debug, Clone, Default)]
pub struct OssBucketsDataSource {
    connection: Connection,
}

impl OssBucketsDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BucketItem<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub created_at: ValueString<'a>,
}

impl<'a> From<BucketInfo> for BucketItem<'a> {
    fn from(bucket: BucketInfo) -> Self {
        Self {
            name: bucket.name.into(),
            created_at: optional_string(bucket.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BucketsState<'a> {
    #[serde(borrow = "'a")]
    pub prefix: ValueString<'a>,
    pub buckets: ValueList<Value<BucketItem<'a>>>,
}

#[async_trait]
impl DataSource for OssBucketsDataSource {
    type State<'a> = BucketsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "prefix" => optional(AttributeType::String, "Only list the buckets starting with this prefix"),
                    "buckets" => computed_objects("Buckets of the account", map! {
                        "name" => computed(AttributeType::String, "Name of the bucket"),
                        "created_at" => computed(AttributeType::String, "Creation date"),
                    }),
                },
                description: Description::plain("Lists the object storage buckets"),
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
        let buckets = or_report(
            diags,
            "Could not list buckets",
            clients
                .oss
                .list_buckets(config.prefix.as_deref_option())
                .await,
        )?;
        Some(BucketsState {
            buckets: Value::Value(
                buckets
                    .into_iter()
                    .map(|bucket| Value::Value(bucket.into()))
                    .collect(),
            ),
            ..config
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct OssObjectDataSource {
    connection: Connection,
}

impl OssObjectDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObjectItem<'a> {
    #[serde(borrow = "'a")]
    pub bucket: ValueString<'a>,
    pub key: ValueString<'a>,
    pub content: ValueString<'a>,
    pub content_type: ValueString<'a>,
    pub etag: ValueString<'a>,
    pub size: ValueNumber,
    pub last_modified: ValueString<'a>,
}

/// Text content of an object, binary objects have no content
fn text_content<'a>(key: &str, body: Vec<u8>) -> ValueString<'a> {
    match String::from_utf8(body) {
        Ok(text) => text.into(),
        Err(_) => {
            warn!(key, "object is not valid UTF-8, its content is not exposed");
            Value::Null
        }
    }
}

#[async_trait]
impl DataSource for OssObjectDataSource {
    type State<'a> = ObjectItem<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "bucket" => required(AttributeType::String, "Bucket of the object"),
                    "key" => required(AttributeType::String, "Key of the object"),
                    "content" => computed(AttributeType::String, "Content of the object, null when it is not text"),
                    "content_type" => computed(AttributeType::String, "MIME type of the object"),
                    "etag" => computed(AttributeType::String, "ETag of the object"),
                    "size" => computed(AttributeType::Number, "Size of the object in bytes"),
                    "last_modified" => computed(AttributeType::String, "Last modification date"),
                },
                description: Description::plain("Reads an object of a bucket"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.bucket, AttributePath::new("bucket"));
        check_not_empty(diags, &config.key, AttributePath::new("key"));
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let clients = self.connection.get(diags).await?;
        let key = string_or(&config.key, "");
        let (body, meta) = or_report(
            diags,
            "Could not read object",
            clients
                .oss
                .get_object(string_or(&config.bucket, ""), key)
                .await,
        )?;
        let content = text_content(key, body);
        Some(ObjectItem {
            content,
            content_type: optional_string(meta.content_type),
            etag: optional_string(meta.etag),
            size: Value::Value(meta.size),
            last_modified: optional_string(meta.last_modified),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn binary_content_is_null() {
        assert_eq!(
            text_content("a.txt", b"hello".to_vec()),
            Value::Value(Cow::Borrowed("hello"))
        );
        assert!(text_content("a.bin", vec![0xff, 0xfe]).is_null());
    }

    #[test]
    fn bucket_is_converted() {
        let item: BucketItem = BucketInfo {
            name: "assets".into(),
            created_at: None,
        }
        .into();
        assert_eq!(item.name, Value::Value(Cow::Borrowed("assets")));
        assert!(item.created_at.is_null());
    }
}
