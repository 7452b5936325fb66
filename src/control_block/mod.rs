// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The SCSI side of the engine: command objects and the few CDBs a boot
//! path needs.

/// Command object and completion.
pub mod command;
pub mod read;
pub mod read_capacity;
pub mod write;
