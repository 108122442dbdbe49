// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::modules::context::executors::FABRIC_RUNTIME;
use chrono::Local;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FabricStatus {
    /// The service uptime in milliseconds since it started.
    pub uptime_ms: i64,
    /// The timezone in which the service is operating (e.g., "+00:00").
    pub timezone: String,
    /// The version of the mail fabric currently running.
    pub version: String,
}

impl FabricStatus {
    pub fn get() -> Self {
        Self {
            uptime_ms: FABRIC_RUNTIME.uptime_ms(),
            timezone: Local::now().offset().to_string(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}
