// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Login flags and stages.
pub mod common;
pub mod request;
pub mod response;
/// Login status classes and their error mapping.
pub mod status;
