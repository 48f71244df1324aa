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

//! Typed wrappers over the REST endpoints

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod cdn;
pub mod domain_group;
pub mod scdn_cache;
pub mod scdn_cache_operate;
pub mod sdns;
pub mod ssl;

pub use cdn::CdnService;
pub use domain_group::DomainGroupService;
pub use scdn_cache::ScdnCacheService;
pub use scdn_cache_operate::ScdnCacheOperateService;
pub use sdns::SdnsService;
pub use ssl::SslCertificateService;

pub const PAGE_SIZE: i64 = 100;

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub total: i64,
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

/// Identifier of a created object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ObjectId {
    pub id: String,
}

/// Identifier of an asynchronous task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskId {
    pub task_id: String,
}

/// Fetch pages, starting at 1, until `total` items have been returned
pub(crate) async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let Page { total, list } = fetch(page).await?;
        if list.is_empty() {
            break;
        }
        items.extend(list);
        if items.len() as i64 >= total {
            break;
        }
        page += 1;
    }
    Ok(items)
}

/// Query parameters of a paged listing
pub(crate) fn page_query(page: i64) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("page_size", PAGE_SIZE.to_string())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_are_collected_until_total() {
        let mut requested = Vec::new();
        let items = collect_pages(|page| {
            requested.push(page);
            async move {
                Ok(Page {
                    total: 5,
                    list: match page {
                        1 => vec![1, 2],
                        2 => vec![3, 4],
                        _ => vec![5],
                    },
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(requested, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_page_stops() {
        let items: Vec<i32> = collect_pages(|_| async {
            Ok(Page {
                total: 10,
                list: vec![],
            })
        })
        .await
        .unwrap();
        assert!(items.is_empty());
    }
}
