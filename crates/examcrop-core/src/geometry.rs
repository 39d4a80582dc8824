//! Page-space geometry: points, bounding boxes and affine matrices.

use serde::{Deserialize, Serialize};

/// Smallest width or height (in points) a produced box may have.
pub const MIN_EXTENT: f64 = 5.0;

/// A point in page space (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box with top-left origin coordinate system.
///
/// Coordinates are PDF points:
/// - `x0`: left edge
/// - `top`: top edge (distance from top of page)
/// - `x1`: right edge
/// - `bottom`: bottom edge (distance from top of page)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    /// Box covering a whole page.
    pub fn page(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Width of the bounding box.
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// Height of the bounding box.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Area, zero for inverted boxes.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Compute the union of two bounding boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Union of every box in the iterator, `None` when it is empty.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BBox>) -> Option<BBox> {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BBox>, b| match acc {
                Some(u) => Some(u.union(b)),
                None => Some(*b),
            })
    }

    /// Overlapping rectangle of two boxes, `None` when they only touch or are apart.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let x0 = self.x0.max(other.x0);
        let top = self.top.max(other.top);
        let x1 = self.x1.min(other.x1);
        let bottom = self.bottom.min(other.bottom);
        if x1 > x0 && bottom > top {
            Some(BBox::new(x0, top, x1, bottom))
        } else {
            None
        }
    }

    pub fn intersection_area(&self, other: &BBox) -> f64 {
        self.intersection(other).map_or(0.0, |i| i.area())
    }

    /// Whether the boxes share a region of positive area.
    pub fn overlaps(&self, other: &BBox) -> bool {
        self.intersection(other).is_some()
    }

    /// Whether `other` lies entirely inside `self` (edges may coincide).
    pub fn contains(&self, other: &BBox) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.top >= self.top && other.bottom <= self.bottom
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x0 && p.x <= self.x1 && p.y >= self.top && p.y <= self.bottom
    }

    /// Length of the shared horizontal span (0 when disjoint).
    pub fn horizontal_overlap(&self, other: &BBox) -> f64 {
        (self.x1.min(other.x1) - self.x0.max(other.x0)).max(0.0)
    }

    /// Length of the shared vertical span (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BBox) -> f64 {
        (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0)
    }

    /// Clamp to `[0, width] x [0, height]`.
    pub fn clamp(&self, width: f64, height: f64) -> BBox {
        self.clamp_to(&BBox::page(width, height))
    }

    /// Clamp every edge into `area`. An inverted `area` pins edges to its
    /// far side instead of panicking.
    pub fn clamp_to(&self, area: &BBox) -> BBox {
        BBox {
            x0: self.x0.max(area.x0).min(area.x1),
            top: self.top.max(area.top).min(area.bottom),
            x1: self.x1.max(area.x0).min(area.x1),
            bottom: self.bottom.max(area.top).min(area.bottom),
        }
    }

    /// Grow (or shrink, for negative `by`) every edge.
    pub fn inflate(&self, by: f64) -> BBox {
        BBox::new(self.x0 - by, self.top - by, self.x1 + by, self.bottom + by)
    }

    /// A box narrower or shorter than `min_extent` is degenerate.
    pub fn is_degenerate(&self, min_extent: f64) -> bool {
        !(self.width() >= min_extent && self.height() >= min_extent)
    }

    /// Flip between top-left page space and PDF bottom-left user space.
    pub fn flip_y(&self, page_height: f64) -> BBox {
        BBox::new(self.x0, page_height - self.bottom, self.x1, page_height - self.top)
    }
}

/// Affine transform `[a b c d e f]` as used by PDF `cm` and `Tm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ctm {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Ctm {
    fn default() -> Self {
        Self::identity()
    }
}

impl Ctm {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self x other`: apply `self` first, then `other`.
    pub fn concat(&self, other: &Ctm) -> Ctm {
        Ctm {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform(&self, x: f64, y: f64) -> Point {
        Point::new(
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box (bottom-left space) of a rectangle after transformation.
    pub fn transform_rect(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> BBox {
        let corners = [
            self.transform(x0, y0),
            self.transform(x1, y0),
            self.transform(x0, y1),
            self.transform(x1, y1),
        ];
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        BBox::new(min_x, min_y, max_x, max_y)
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_new() {
        let bbox = BBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(bbox.x0, 10.0);
        assert_eq!(bbox.top, 20.0);
        assert_eq!(bbox.x1, 30.0);
        assert_eq!(bbox.bottom, 40.0);
    }

    #[test]
    fn test_bbox_dimensions() {
        let bbox = BBox::new(10.0, 20.0, 50.0, 60.0);
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 40.0);
        assert_eq!(bbox.area(), 1600.0);
    }

    #[test]
    fn test_bbox_union() {
        let a = BBox::new(10.0, 20.0, 30.0, 40.0);
        let b = BBox::new(5.0, 25.0, 35.0, 45.0);
        assert_eq!(a.union(&b), BBox::new(5.0, 20.0, 35.0, 45.0));
    }

    #[test]
    fn union_all_empty_is_none() {
        assert!(BBox::union_all(&[]).is_none());
        let boxes = [BBox::new(0.0, 0.0, 1.0, 1.0), BBox::new(5.0, 5.0, 6.0, 7.0)];
        assert_eq!(BBox::union_all(&boxes), Some(BBox::new(0.0, 0.0, 6.0, 7.0)));
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.overlaps(&b));
        assert_eq!(a.intersection_area(&b), 0.0);
    }

    #[test]
    fn intersection_area_of_overlapping_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 20.0, 20.0);
        assert_eq!(a.intersection(&b), Some(BBox::new(5.0, 5.0, 10.0, 10.0)));
        assert_eq!(a.intersection_area(&b), 25.0);
    }

    #[test]
    fn clamp_keeps_box_on_page() {
        let b = BBox::new(-10.0, -5.0, 700.0, 900.0).clamp(612.0, 792.0);
        assert_eq!(b, BBox::new(0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn degenerate_boxes() {
        assert!(BBox::new(0.0, 0.0, 2.0, 100.0).is_degenerate(MIN_EXTENT));
        assert!(BBox::new(10.0, 10.0, 5.0, 20.0).is_degenerate(MIN_EXTENT));
        assert!(!BBox::new(0.0, 0.0, 5.0, 5.0).is_degenerate(MIN_EXTENT));
    }

    #[test]
    fn overlap_lengths() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(4.0, 8.0, 30.0, 30.0);
        assert_eq!(a.horizontal_overlap(&b), 6.0);
        assert_eq!(a.vertical_overlap(&b), 2.0);
    }

    #[test]
    fn flip_y_round_trip() {
        let b = BBox::new(10.0, 100.0, 50.0, 150.0);
        assert_eq!(b.flip_y(792.0), BBox::new(10.0, 642.0, 50.0, 692.0));
        assert_eq!(b.flip_y(792.0).flip_y(792.0), b);
    }

    #[test]
    fn ctm_concat_applies_left_first() {
        let scale = Ctm::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Ctm::translation(10.0, 20.0);
        let p = scale.concat(&shift).transform(1.0, 1.0);
        assert_eq!(p, Point::new(12.0, 22.0));
    }

    #[test]
    fn ctm_transform_rect() {
        let m = Ctm::new(100.0, 0.0, 0.0, 50.0, 72.0, 600.0);
        assert_eq!(
            m.transform_rect(0.0, 0.0, 1.0, 1.0),
            BBox::new(72.0, 600.0, 172.0, 650.0)
        );
    }
}
