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

use tracing::Level;

/// Install a stderr subscriber, unless the plugin server logs to a file
///
/// stdout is reserved for the plugin handshake.
pub fn init() {
    if std::env::var_os("PLUGIN_LOG_FILE").is_some() {
        return;
    }

    let setting = std::env::var("TF_LOG_PROVIDER")
        .or_else(|_| std::env::var("TF_LOG"))
        .unwrap_or_default();
    let (level, json) = parse_level(&setting);

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed
    _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Parse a Terraform log level, returning the level and whether JSON output is requested
fn parse_level(setting: &str) -> (Level, bool) {
    match setting.trim().to_ascii_uppercase().as_str() {
        "TRACE" => (Level::TRACE, false),
        "DEBUG" => (Level::DEBUG, false),
        "INFO" => (Level::INFO, false),
        "ERROR" => (Level::ERROR, false),
        "JSON" => (Level::TRACE, true),
        _ => (Level::WARN, false),
    }
}
