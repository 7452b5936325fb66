// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Login Response status codes (RFC 3720 § 10.13.5) and their translation
//! into engine errors.

use crate::error::IscsiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// initiator must follow TargetAddress
    Redirection,
    InitiatorError,
    TargetError,
    Unknown(u8),
}

impl From<u8> for StatusClass {
    fn from(b: u8) -> Self {
        match b {
            0 => StatusClass::Success,
            1 => StatusClass::Redirection,
            2 => StatusClass::InitiatorError,
            3 => StatusClass::TargetError,
            other => StatusClass::Unknown(other),
        }
    }
}

impl From<StatusClass> for u8 {
    fn from(class: StatusClass) -> Self {
        match class {
            StatusClass::Success => 0x00,
            StatusClass::Redirection => 0x01,
            StatusClass::InitiatorError => 0x02,
            StatusClass::TargetError => 0x03,
            StatusClass::Unknown(v) => v,
        }
    }
}

/// Status-Detail values for Status-Class 0x02.
pub mod initiator_detail {
    pub const AUTHENTICATION: u8 = 0x01;
    pub const AUTHORISATION: u8 = 0x02;
    pub const NOT_FOUND: u8 = 0x03;
    pub const REMOVED: u8 = 0x04;
}

/// Status-Detail values for Status-Class 0x03.
pub mod target_detail {
    pub const UNAVAILABLE: u8 = 0x01;
    pub const NO_RESOURCES: u8 = 0x02;
}

/// Map a non-success, non-redirect login status onto an engine error.
pub fn status_to_error(class: StatusClass, detail: u8) -> IscsiError {
    let what = format!("login rejected (class {:#04x}, detail {detail:#04x})", u8::from(class));
    match class {
        StatusClass::InitiatorError => match detail {
            initiator_detail::AUTHENTICATION => IscsiError::AccessDenied(what),
            initiator_detail::AUTHORISATION => IscsiError::PermissionDenied(what),
            initiator_detail::NOT_FOUND | initiator_detail::REMOVED => {
                IscsiError::NoDevice(what)
            },
            _ => IscsiError::NotSupported(what),
        },
        StatusClass::TargetError => match detail {
            target_detail::UNAVAILABLE | target_detail::NO_RESOURCES => {
                IscsiError::Io(what)
            },
            _ => IscsiError::NotSupported(what),
        },
        _ => IscsiError::InvalidArgument(what),
    }
}
