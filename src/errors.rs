//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Rtx Error Module
//!
//! This module defines the error types used throughout the Rtx runtime.
//!
//! ## Error Categories
//!
//! - **BadImage**: Malformed module images, rejected before anything is linked
//! - **Conflict**: Identity conflicts (module ids, core names, subscriptions)
//! - **Sequence**: Calls made in the wrong lifecycle phase
//! - **Sandbox**: Sandbox policy rejections
//! - **Link**: Failures while linking a module or opening its library
//! - **Validation**: Invalid parameters or inputs
//! - **Io**, **Serde**, **Zip**: Wrapped lower level failures
//! - **Internal**: Unexpected internal failures
//!
//! ## Usage
//!
//! ```rust
//! use rtx::errors::{Result, RtError};
//!
//! fn example(locked: bool) -> Result<()> {
//!     if locked {
//!         return Err(RtError::sequence("event table is locked"));
//!     }
//!     Ok(())
//! }
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::result::ZipError;

/// Convenience result type used throughout Rtx.
pub type Result<T> = std::result::Result<T, RtError>;

/// Canonical error enumeration for Rtx.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum RtError {
    /// Errors originating from filesystem or stream IO.
    #[error("io error: {0}")]
    Io(String),

    /// The module image could not be decoded. Nothing from it was loaded.
    #[error("bad module image '{path}': {message}")]
    BadImage { path: String, message: String },

    /// An identity is already taken by another module, slot or subscription.
    #[error("conflict on '{resource}' for '{module_id}'")]
    Conflict { module_id: String, resource: String },

    /// A call arrived in a lifecycle phase that does not permit it.
    #[error("sequence error: {message}")]
    Sequence { message: String },

    /// Validation errors triggered by invalid parameters or inputs.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A sandboxed module asked for something the policy does not allow.
    #[error("sandbox violation in '{module_id}': {message}")]
    Sandbox { module_id: String, message: String },

    /// Linking a module or resolving its manifest failed.
    #[error("link error in '{module_id}': {message}")]
    Link { module_id: String, message: String },

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Errors originating from ZIP file operations.
    #[error("zip error: {0}")]
    Zip(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for RtError {
    fn from(err: io::Error) -> Self {
        RtError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RtError {
    fn from(err: serde_json::Error) -> Self {
        RtError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for RtError {
    fn from(err: serde_yaml::Error) -> Self {
        RtError::Serde(err.to_string())
    }
}

impl From<ZipError> for RtError {
    fn from(err: ZipError) -> Self {
        RtError::Zip(err.to_string())
    }
}

impl RtError {
    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        RtError::Validation {
            message: message.into(),
        }
    }

    /// Helper to construct sequencing errors.
    pub fn sequence<T: Into<String>>(message: T) -> Self {
        RtError::Sequence {
            message: message.into(),
        }
    }

    pub fn bad_image(path: impl Into<String>, message: impl Into<String>) -> Self {
        RtError::BadImage {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn conflict(module_id: impl Into<String>, resource: impl Into<String>) -> Self {
        RtError::Conflict {
            module_id: module_id.into(),
            resource: resource.into(),
        }
    }

    pub fn sandbox(module_id: impl Into<String>, message: impl Into<String>) -> Self {
        RtError::Sandbox {
            module_id: module_id.into(),
            message: message.into(),
        }
    }

    pub fn link(module_id: impl Into<String>, message: impl Into<String>) -> Self {
        RtError::Link {
            module_id: module_id.into(),
            message: message.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        RtError::Internal(message.into())
    }

    /// Whether this error is an identity conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RtError::Conflict { .. })
    }

    /// Whether this error is a lifecycle sequencing violation.
    pub fn is_sequence(&self) -> bool {
        matches!(self, RtError::Sequence { .. })
    }
}
