// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Login text segments: NUL-terminated `key=value` records.

pub mod builder;
pub mod parser;
