// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Flags, task attributes and status codes of SCSI Command/Response PDUs.
pub mod common;
pub mod request;
pub mod response;
