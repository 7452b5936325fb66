// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Data-In / Data-Out flag definitions.
pub mod common;
/// SCSI Data-Out (initiator to target).
pub mod request;
/// SCSI Data-In (target to initiator).
pub mod response;
