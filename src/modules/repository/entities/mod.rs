// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

pub mod ai_cache;
pub mod classify;
pub mod connection;
pub mod mail;
pub mod modifier;
pub mod notification;
pub mod sync;
pub mod webhook;
