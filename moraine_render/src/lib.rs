// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage-driven compositing for the moraine presentation engine.
//!
//! [`RenderPass`] turns one scene evaluation into backend calls. Per frame it
//! advances any open video sessions, evaluates the scene, collects the dirty
//! region, repaints exactly the dirty rectangles back-to-front, and presents.
//! A frame with no damage costs one evaluation and presents nothing.
//!
//! [`VideoRegistry`] tracks the decoder session behind each video node and
//! drives decoders off the frame clock, so a 25 fps stream displayed at
//! 60 fps only uploads when a new media frame is actually due.
//!
//! [`RenderPass`]: pass::RenderPass
//! [`VideoRegistry`]: video::VideoRegistry

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![no_std]

extern crate alloc;

pub mod pass;
pub mod video;
