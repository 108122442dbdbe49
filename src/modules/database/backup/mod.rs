// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

pub mod task;
