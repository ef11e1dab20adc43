// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Categorical error codes and the framework-wide result type.
//!
//! Expected failure modes (duplicate names, missing entries, operations on a
//! disposed registry) are returned as [`CoreError`] values so callers can
//! branch on the [`ErrorCode`] without `catch`-style control flow. Panics are
//! reserved for programmer errors.

use std::fmt::{self, Display};

/// The categorical reason for a failed registry or loader operation.
///
/// Callers are expected to branch on the code, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The operation was cancelled before it could complete.
    Cancelled,
    /// The operation did not complete within its allotted time.
    Timeout,
    /// An argument violated the operation's contract.
    InvalidArgument,
    /// The target object is in a state that forbids the operation
    /// (e.g., a disposed registry).
    InvalidState,
    /// An entry with the same key is already present.
    AlreadyExists,
    /// No entry matched the given key.
    NotFound,
    /// A downstream exporter reported a failure.
    Exporter,
    /// A failure that fits no other category.
    Unexpected,
}

/// An expected, recoverable failure carrying a diagnostic message and a
/// categorical code.
///
/// A `CoreError` is a plain value: it is created once per failed operation
/// and never mutated. A failure always carries a non-empty message;
/// constructing one with an empty message is a contract violation caught by
/// a debug assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    code: ErrorCode,
    message: String,
}

impl CoreError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(
            !message.trim().is_empty(),
            "a CoreError must carry a non-empty message"
        );
        Self { code, message }
    }

    /// Shorthand for an [`ErrorCode::Unexpected`] error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unexpected, message)
    }

    /// The categorical code of this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The human-readable diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for CoreError {}

/// A specialized `Result` type for framework operations.
pub type CoreResult<T> = Result<T, CoreError>;
