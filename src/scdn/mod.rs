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

//! Cache rules and cache operations of the SCDN

pub mod cache_operate;
pub mod cache_rule;
pub mod conf;
pub mod data_source;

pub use cache_operate::{ScdnCacheCleanResource, ScdnCachePreheatResource};
pub use cache_rule::ScdnCacheRuleResource;
pub use data_source::ScdnCacheRulesDataSource;
