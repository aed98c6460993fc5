// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable scene and backend errors.
//!
//! Usage bugs (stale handles, invalid indices) panic; conditions that depend
//! on runtime data a correct program cannot rule out are reported as errors.

use alloc::string::String;
use core::fmt;

/// Error from a scene-tree mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneError {
    /// A node with this id string is already registered in the tree.
    DuplicateId(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "duplicate node id \"{id}\""),
        }
    }
}

impl core::error::Error for SceneError {}

/// Error reported by a display backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not allocate a surface.
    SurfaceCreation,
    /// The backend is in an unrecoverable state; the frame is abandoned.
    Fatal(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurfaceCreation => write!(f, "surface creation failed"),
            Self::Fatal(msg) => write!(f, "backend failure: {msg}"),
        }
    }
}

impl core::error::Error for BackendError {}
