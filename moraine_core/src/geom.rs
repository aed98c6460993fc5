// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small rectangle helpers shared across the crate.
//!
//! Built on [`kurbo::Rect`]. The compositor's overlap rules are stricter than
//! `Rect::overlaps`: rectangles that merely share an edge do not count as
//! overlapping, so adjacent dirty rects stay separate and adjacent nodes do
//! not occlude each other.

use kurbo::{Affine, Point, Rect};

/// Returns `true` if the rectangles share interior area.
///
/// Edge and corner contact is not overlap. Degenerate rectangles (zero or
/// negative width or height) never overlap anything.
#[must_use]
pub fn strictly_overlaps(a: &Rect, b: &Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Returns `true` if `outer` contains every point of `inner`.
///
/// An empty `inner` is contained by anything.
#[must_use]
pub fn contains_rect(outer: &Rect, inner: &Rect) -> bool {
    is_degenerate(inner)
        || (inner.x0 >= outer.x0 && inner.x1 <= outer.x1 && inner.y0 >= outer.y0 && inner.y1 <= outer.y1)
}

/// Returns `true` if the rectangle has no interior area.
#[must_use]
pub fn is_degenerate(r: &Rect) -> bool {
    r.x1 <= r.x0 || r.y1 <= r.y0
}

/// Returns `true` if `p` lies inside `r`.
///
/// The left and top edges are inclusive, the right and bottom edges are
/// exclusive, so abutting nodes never both claim a shared edge point.
#[must_use]
pub fn contains_point(r: &Rect, p: Point) -> bool {
    p.x >= r.x0 && p.x < r.x1 && p.y >= r.y0 && p.y < r.y1
}

/// The rectangle translated so its origin moves by the origin of `by`.
#[must_use]
pub fn offset_by(r: &Rect, by: &Rect) -> Rect {
    Rect::new(r.x0 + by.x0, r.y0 + by.y0, r.x1 + by.x0, r.y1 + by.y0)
}

/// Axis-aligned bounding box of `r` rotated by `angle` radians about `pivot`.
///
/// Returns `r` unchanged for a zero angle.
#[must_use]
pub fn rotated_bounds(r: &Rect, angle: f64, pivot: Point) -> Rect {
    if angle == 0.0 {
        return *r;
    }
    let xf = Affine::rotate_about(angle, pivot);
    let corners = [
        xf * Point::new(r.x0, r.y0),
        xf * Point::new(r.x1, r.y0),
        xf * Point::new(r.x1, r.y1),
        xf * Point::new(r.x0, r.y1),
    ];
    let mut out = Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
    for c in &corners[1..] {
        out.x0 = out.x0.min(c.x);
        out.y0 = out.y0.min(c.y);
        out.x1 = out.x1.max(c.x);
        out.y1 = out.y1.max(c.y);
    }
    out
}

/// Maps a screen point into the unrotated frame of a node rotated by `angle`
/// about `pivot`, so containment checks can use the axis-aligned viewport.
#[must_use]
pub fn unrotate_point(p: Point, angle: f64, pivot: Point) -> Point {
    if angle == 0.0 {
        return p;
    }
    Affine::rotate_about(-angle, pivot) * p
}

/// Intersection of two rectangles, or `None` if they do not strictly overlap.
#[must_use]
pub fn intersection(a: &Rect, b: &Rect) -> Option<Rect> {
    if strictly_overlaps(a, b) {
        Some(Rect::new(a.x0.max(b.x0), a.y0.max(b.y0), a.x1.min(b.x1), a.y1.min(b.y1)))
    } else {
        None
    }
}
