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

use std::time::Duration;

use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime, DateTimeFormat};
use aws_sdk_s3::types::{BucketCannedAcl, Delete, ObjectCannedAcl, ObjectIdentifier};
use aws_sdk_s3::Client;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};

/// Settings of the S3 compatible object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OssSettings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub timeout: Duration,
}

/// Object storage client, built on first use
#[derive(Debug, Default)]
pub struct OssClient {
    settings: Option<OssSettings>,
    client: OnceCell<Client>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BucketInfo {
    pub name: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectMeta {
    pub etag: Option<String>,
    pub size: i64,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectUpload<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub body: Vec<u8>,
    pub content_type: Option<&'a str>,
    pub cache_control: Option<&'a str>,
    pub acl: Option<&'a str>,
}

impl OssClient {
    pub fn new(settings: Option<OssSettings>) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    async fn client(&self) -> Result<&Client> {
        let settings = self
            .settings
            .as_ref()
            .ok_or(Error::NotConfigured("oss_endpoint"))?;
        Ok(self.client.get_or_init(|| build_client(settings)).await)
    }

    pub async fn create_bucket(&self, bucket: &str, acl: &str) -> Result<()> {
        debug!(bucket, acl, "creating bucket");
        self.client()
            .await?
            .create_bucket()
            .bucket(bucket)
            .acl(BucketCannedAcl::from(acl))
            .send()
            .await
            .map_err(|err| sdk_error(bucket, err))?;
        Ok(())
    }

    pub async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.client()
            .await?
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| sdk_error(bucket, err))?;
        Ok(())
    }

    pub async fn put_bucket_acl(&self, bucket: &str, acl: &str) -> Result<()> {
        debug!(bucket, acl, "updating bucket acl");
        self.client()
            .await?
            .put_bucket_acl()
            .bucket(bucket)
            .acl(BucketCannedAcl::from(acl))
            .send()
            .await
            .map_err(|err| sdk_error(bucket, err))?;
        Ok(())
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        debug!(bucket, "deleting bucket");
        self.client()
            .await?
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| sdk_error(bucket, err))?;
        Ok(())
    }

    pub async fn list_buckets(&self, prefix: Option<&str>) -> Result<Vec<BucketInfo>> {
        let output = self
            .client()
            .await?
            .list_buckets()
            .send()
            .await
            .map_err(|err| sdk_error("buckets", err))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                let name = bucket.name()?;
                if prefix.is_some_and(|prefix| !name.starts_with(prefix)) {
                    return None;
                }
                Some(BucketInfo {
                    name: name.to_owned(),
                    created_at: bucket.creation_date().and_then(format_date),
                })
            })
            .collect())
    }

    /// Delete every object of the bucket
    pub async fn empty_bucket(&self, bucket: &str) -> Result<usize> {
        let client = self.client().await?;
        let mut deleted = 0;
        let mut token = None;

        loop {
            let page = client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|err| sdk_error(bucket, err))?;

            let objects = page
                .contents()
                .iter()
                .filter_map(|object| object.key())
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|err| Error::Oss(err.to_string()))?;

            if !objects.is_empty() {
                deleted += objects.len();
                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .map_err(|err| Error::Oss(err.to_string()))?;
                client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|err| sdk_error(bucket, err))?;
            }

            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_owned())
                }
                _ => break,
            }
        }

        debug!(bucket, deleted, "emptied bucket");
        Ok(deleted)
    }

    /// Upload an object and return its etag
    pub async fn put_object(&self, upload: ObjectUpload<'_>) -> Result<Option<String>> {
        debug!(
            bucket = upload.bucket,
            key = upload.key,
            size = upload.body.len(),
            "uploading object"
        );
        let output = self
            .client()
            .await?
            .put_object()
            .bucket(upload.bucket)
            .key(upload.key)
            .body(ByteStream::from(upload.body))
            .set_content_type(upload.content_type.map(str::to_owned))
            .set_cache_control(upload.cache_control.map(str::to_owned))
            .set_acl(upload.acl.map(ObjectCannedAcl::from))
            .send()
            .await
            .map_err(|err| sdk_error(upload.key, err))?;
        Ok(output.e_tag().map(normalize_etag))
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        let output = self
            .client()
            .await?
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| sdk_error(key, err))?;
        Ok(ObjectMeta {
            etag: output.e_tag().map(normalize_etag),
            size: output.content_length().unwrap_or_default(),
            content_type: output.content_type().map(str::to_owned),
            cache_control: output.cache_control().map(str::to_owned),
            last_modified: output.last_modified().and_then(format_date),
        })
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<(Vec<u8>, ObjectMeta)> {
        let output = self
            .client()
            .await?
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| sdk_error(key, err))?;
        let meta = ObjectMeta {
            etag: output.e_tag().map(normalize_etag),
            size: output.content_length().unwrap_or_default(),
            content_type: output.content_type().map(str::to_owned),
            cache_control: output.cache_control().map(str::to_owned),
            last_modified: output.last_modified().and_then(format_date),
        };
        let body = output
            .body
            .collect()
            .await
            .map_err(|err| Error::Oss(err.to_string()))?
            .into_bytes()
            .to_vec();
        Ok((body, meta))
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        debug!(bucket, key, "deleting object");
        self.client()
            .await?
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| sdk_error(key, err))?;
        Ok(())
    }
}

async fn build_client(settings: &OssSettings) -> Client {
    debug!(endpoint = %settings.endpoint, region = %settings.region, "building object storage client");
    let credentials = Credentials::new(
        settings.access_key.clone(),
        settings.secret_key.clone(),
        None,
        None,
        "terraform-provider-edge",
    );
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .endpoint_url(settings.endpoint.clone())
        .credentials_provider(credentials)
        .timeout_config(
            aws_config::timeout::TimeoutConfig::builder()
                .operation_timeout(settings.timeout)
                .build(),
        )
        .load()
        .await;
    let config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(true)
        .build();
    Client::from_conf(config)
}

fn sdk_error<E>(what: &str, err: SdkError<E>) -> Error
where
    E: std::error::Error + 'static,
{
    if is_not_found(&err) {
        Error::NotFound(what.to_owned())
    } else {
        Error::Oss(DisplayErrorContext(err).to_string())
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .is_some_and(|raw| raw.status().as_u16() == 404)
}

fn format_date(date: &DateTime) -> Option<String> {
    date.fmt(DateTimeFormat::DateTime).ok()
}

/// Etags are returned quoted
pub(crate) fn normalize_etag(etag: &str) -> String {
    etag.trim_matches('"').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_quotes_are_removed() {
        assert_eq!(normalize_etag("\"abc\""), "abc");
        assert_eq!(normalize_etag("abc"), "abc");
    }

    #[tokio::test]
    async fn unconfigured_storage_is_reported() {
        let client = OssClient::new(None);
        assert!(!client.is_configured());
        let err = client.head_bucket("bucket").await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured("oss_endpoint")));
    }
}
