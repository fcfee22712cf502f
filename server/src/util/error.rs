/*
 * Created on Tue May 12 2026
 *
 * This file is a part of Skyconf
 * Skyconf is a free and open-source YANG-driven configuration management
 * engine written by Sayan Nandan ("the Author") with the vision to provide
 * safe, transactional network configuration without compromising on
 * correctness or performance.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Structured errors for every engine call path
//!
//! Every library-boundary function in the engine either returns a value or an
//! [`Error`] carrying one of the wire-visible error kinds, an optional
//! sub-errno and a reason string. Handlers encode these 1:1 into `ERR` reply
//! frames.

use std::fmt;
use std::io::Error as IoError;

/// A result type using the engine [`Error`]
pub type ConfResult<T> = Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The wire-visible error taxonomy
pub enum ErrorKind {
    /// The request or payload could not be decoded
    Malformed,
    /// An element has no corresponding schema node
    UnknownElement,
    /// A `create` hit an existing node
    DataExists,
    /// A `delete` addressed a missing node
    DataMissing,
    /// The access-control policy denied the operation
    AccessDenied,
    /// The datastore is locked by another session
    InUse,
    /// The operation is not supported on this node
    OperationNotSupported,
    /// The operation ran and failed (extensions, persistence, validation)
    OperationFailed,
    /// An engine-internal invariant was violated
    Internal,
}

impl ErrorKind {
    /// The `u16` code used on the wire for this kind
    pub const fn code(self) -> u16 {
        match self {
            Self::Malformed => 1,
            Self::UnknownElement => 2,
            Self::DataExists => 3,
            Self::DataMissing => 4,
            Self::AccessDenied => 5,
            Self::InUse => 6,
            Self::OperationNotSupported => 7,
            Self::OperationFailed => 8,
            Self::Internal => 9,
        }
    }
    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::Malformed,
            2 => Self::UnknownElement,
            3 => Self::DataExists,
            4 => Self::DataMissing,
            5 => Self::AccessDenied,
            6 => Self::InUse,
            7 => Self::OperationNotSupported,
            8 => Self::OperationFailed,
            9 => Self::Internal,
            _ => return None,
        })
    }
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnknownElement => "unknown-element",
            Self::DataExists => "data-exists",
            Self::DataMissing => "data-missing",
            Self::AccessDenied => "access-denied",
            Self::InUse => "in-use",
            Self::OperationNotSupported => "operation-not-supported",
            Self::OperationFailed => "operation-failed",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A structured engine error: kind, sub-errno and reason text
pub struct Error {
    kind: ErrorKind,
    suberrno: u32,
    reason: String,
}

impl Error {
    pub fn new(kind: ErrorKind, reason: impl ToString) -> Self {
        Self {
            kind,
            suberrno: 0,
            reason: reason.to_string(),
        }
    }
    pub fn with_suberrno(kind: ErrorKind, suberrno: u32, reason: impl ToString) -> Self {
        Self {
            kind,
            suberrno,
            reason: reason.to_string(),
        }
    }
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }
    pub const fn suberrno(&self) -> u32 {
        self.suberrno
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
    pub fn malformed(reason: impl ToString) -> Self {
        Self::new(ErrorKind::Malformed, reason)
    }
    pub fn unknown_element(name: impl fmt::Display) -> Self {
        Self::new(ErrorKind::UnknownElement, format!("No schema node found: {}", name))
    }
    pub fn data_exists(reason: impl ToString) -> Self {
        Self::new(ErrorKind::DataExists, reason)
    }
    pub fn data_missing(reason: impl ToString) -> Self {
        Self::new(ErrorKind::DataMissing, reason)
    }
    pub fn access_denied(reason: impl ToString) -> Self {
        Self::new(ErrorKind::AccessDenied, reason)
    }
    pub fn in_use(reason: impl ToString) -> Self {
        Self::new(ErrorKind::InUse, reason)
    }
    pub fn not_supported(reason: impl ToString) -> Self {
        Self::new(ErrorKind::OperationNotSupported, reason)
    }
    pub fn operation_failed(reason: impl ToString) -> Self {
        Self::new(ErrorKind::OperationFailed, reason)
    }
    pub fn internal(reason: impl ToString) -> Self {
        Self::new(ErrorKind::Internal, reason)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.suberrno == 0 {
            write!(f, "{}: {}", self.kind.as_str(), self.reason)
        } else {
            write!(f, "{}({}): {}", self.kind.as_str(), self.suberrno, self.reason)
        }
    }
}

impl std::error::Error for Error {}

impl From<IoError> for Error {
    fn from(ioe: IoError) -> Self {
        Self::with_suberrno(
            ErrorKind::OperationFailed,
            ioe.raw_os_error().unwrap_or(0) as u32,
            ioe,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_kind_codes_roundtrip() {
        for kind in [
            ErrorKind::Malformed,
            ErrorKind::UnknownElement,
            ErrorKind::DataExists,
            ErrorKind::DataMissing,
            ErrorKind::AccessDenied,
            ErrorKind::InUse,
            ErrorKind::OperationNotSupported,
            ErrorKind::OperationFailed,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
    }
    #[test]
    fn test_display() {
        let e = Error::data_exists("Data already exists; cannot create new resource");
        assert_eq!(
            e.to_string(),
            "data-exists: Data already exists; cannot create new resource"
        );
    }
}
