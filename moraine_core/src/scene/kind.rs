// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node kinds and per-kind data.

use crate::backend::SurfaceHandle;

/// Where a new child lands among siblings that share its z value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZTieBreak {
    /// The new child is inserted after existing equal-z siblings, so later
    /// additions paint on top.
    After,
    /// The new child is inserted before existing equal-z siblings, so later
    /// additions sit underneath but hit-test first among equals.
    Before,
}

/// What a node is and the kind-specific data it carries.
///
/// [`Group`](Self::Group) and [`Overlay`](Self::Overlay) are containers; the
/// remaining kinds are leaves that present a backend surface. A leaf with no
/// surface yet draws nothing but still occupies its viewport for hit-testing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeKind {
    /// An ordinary container. Children may optionally be cropped to the
    /// container's viewport.
    #[default]
    Group,
    /// An input-only container layered over siblings. Draws nothing itself;
    /// new equal-z children go in front of existing ones.
    Overlay,
    /// A still image. `opaque` marks images with no alpha, which lets the
    /// draw pass skip content known to be fully covered.
    Image {
        /// Surface holding the decoded pixels.
        surface: Option<SurfaceHandle>,
        /// Whether every pixel is fully opaque.
        opaque: bool,
    },
    /// A video stream target. The decoder writes frames into the surface.
    Video {
        /// Surface the decoder renders into.
        surface: Option<SurfaceHandle>,
    },
    /// A block of laid-out text rasterized externally.
    Words {
        /// Surface holding the rasterized glyphs.
        surface: Option<SurfaceHandle>,
    },
}

impl NodeKind {
    /// Whether nodes of this kind may have children.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Group | Self::Overlay)
    }

    /// The surface this node presents, if any.
    #[must_use]
    pub const fn surface(&self) -> Option<SurfaceHandle> {
        match self {
            Self::Group | Self::Overlay => None,
            Self::Image { surface, .. } | Self::Video { surface } | Self::Words { surface } => {
                *surface
            }
        }
    }

    /// Whether this node is known to cover its viewport with opaque pixels.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Image { opaque: true, surface: Some(_) })
    }

    /// Equal-z insertion policy for children of this kind of container.
    #[must_use]
    pub const fn z_tie_break(&self) -> ZTieBreak {
        match self {
            Self::Overlay => ZTieBreak::Before,
            _ => ZTieBreak::After,
        }
    }
}
