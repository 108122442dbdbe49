// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::modules::error::MailFabricResult;

pub mod controller;
pub mod executors;
pub mod status;

pub trait Initialize {
    async fn initialize() -> MailFabricResult<()>;
}

pub trait RustMailTask {
    fn start();
}
