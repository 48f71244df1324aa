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

//! Terraform provider for an edge cloud platform
//!
//! It manages CDN domains and their configuration, cache purges and prefetches, SSL certificates,
//! authoritative DNS zones and records, domain groups, SCDN cache rules, and buckets and objects
//! of the S3 compatible object storage.
//!
//! Every resource and data source holds a [`connection::Connection`], filled by
//! [`EdgeProvider`] when Terraform configures the provider.

pub mod cdn;
pub mod config;
pub mod connection;
pub mod domain_group;
pub mod error;
pub mod logging;
pub mod oss;
pub mod provider;
pub mod scdn;
pub mod sdns;
pub mod service;
pub mod ssl;

mod schema;
mod utils;

pub use error::{Error, Result};
pub use provider::EdgeProvider;
