// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::modules::context::controller::SYNC_CONTROLLER;
use crate::modules::context::Initialize;
use crate::modules::error::MailFabricResult;
use crate::modules::repository::entities::connection::Connection;
use crate::utc_now;
use std::sync::LazyLock;
use tracing::info;

pub static FABRIC_RUNTIME: LazyLock<FabricRuntime> = LazyLock::new(FabricRuntime::new);

pub struct FabricRuntime {
    start_at: i64,
}

impl Initialize for FabricRuntime {
    async fn initialize() -> MailFabricResult<()> {
        FABRIC_RUNTIME.start_connection_syncers().await
    }
}

impl FabricRuntime {
    pub fn new() -> Self {
        Self { start_at: utc_now!() }
    }

    pub fn uptime_ms(&self) -> i64 {
        utc_now!() - self.start_at
    }

    async fn start_connection_syncers(&self) -> MailFabricResult<()> {
        let connections = Connection::list_enabled().await?;

        if connections.is_empty() {
            info!("no enabled connections found at startup");
            return Ok(());
        }
        info!("starting sync for {} enabled connections", connections.len());
        for connection in connections {
            SYNC_CONTROLLER.trigger_start(connection.id).await;
        }

        Ok(())
    }
}
