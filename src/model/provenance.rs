//! Page provenance: where on which page an item came from.

use serde::{Deserialize, Serialize};

/// Origin of a bounding box coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoordOrigin {
    /// `t` is the distance from the top edge; `t < b`.
    #[default]
    Topleft,
    /// PDF native: `t` is the distance from the bottom edge; `t > b`.
    Bottomleft,
}

/// Axis-aligned rectangle in page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub l: f32,
    /// Top edge
    pub t: f32,
    /// Right edge
    pub r: f32,
    /// Bottom edge
    pub b: f32,
    /// Coordinate origin the values are expressed in
    pub coord_origin: CoordOrigin,
}

impl BoundingBox {
    /// Create a box in top-left coordinates.
    pub fn new(l: f32, t: f32, r: f32, b: f32) -> Self {
        Self {
            l,
            t,
            r,
            b,
            coord_origin: CoordOrigin::Topleft,
        }
    }

    /// Create a box in bottom-left (PDF) coordinates.
    pub fn bottom_left(l: f32, t: f32, r: f32, b: f32) -> Self {
        Self {
            l,
            t,
            r,
            b,
            coord_origin: CoordOrigin::Bottomleft,
        }
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        (self.r - self.l).abs()
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        (self.b - self.t).abs()
    }

    /// Area of the box.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Convert to top-left origin given the page height.
    pub fn to_top_left_origin(&self, page_height: f32) -> Self {
        match self.coord_origin {
            CoordOrigin::Topleft => *self,
            CoordOrigin::Bottomleft => Self::new(
                self.l,
                page_height - self.t,
                self.r,
                page_height - self.b,
            ),
        }
    }

    /// Smallest box enclosing both boxes. Both must share an origin.
    pub fn union(&self, other: &BoundingBox) -> Self {
        match self.coord_origin {
            CoordOrigin::Topleft => Self::new(
                self.l.min(other.l),
                self.t.min(other.t),
                self.r.max(other.r),
                self.b.max(other.b),
            ),
            CoordOrigin::Bottomleft => Self::bottom_left(
                self.l.min(other.l),
                self.t.max(other.t),
                self.r.max(other.r),
                self.b.min(other.b),
            ),
        }
    }

    /// Fraction of this box's area covered by `other`.
    pub fn intersection_over_self(&self, other: &BoundingBox) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        let (top, bottom) = match self.coord_origin {
            CoordOrigin::Topleft => (self.t.max(other.t), self.b.min(other.b)),
            CoordOrigin::Bottomleft => (other.b.max(self.b), self.t.min(other.t)),
        };
        let w = self.r.min(other.r) - self.l.max(other.l);
        let h = bottom - top;
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        (w * h) / area
    }
}

/// Provenance of a document item on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceItem {
    /// 1-based page number
    pub page_no: u32,
    /// Location on the page
    pub bbox: BoundingBox,
    /// Character span covered in the item's text
    pub charspan: (usize, usize),
}

impl ProvenanceItem {
    /// Create provenance covering `text_len` characters.
    pub fn new(page_no: u32, bbox: BoundingBox, text_len: usize) -> Self {
        Self {
            page_no,
            bbox,
            charspan: (0, text_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let bbox = BoundingBox::new(10.0, 20.0, 110.0, 70.0);
        assert_eq!(bbox.width(), 100.0);
        assert_eq!(bbox.height(), 50.0);
        assert_eq!(bbox.area(), 5000.0);
    }

    #[test]
    fn test_to_top_left() {
        let bbox = BoundingBox::bottom_left(72.0, 720.0, 300.0, 700.0);
        let tl = bbox.to_top_left_origin(792.0);
        assert_eq!(tl.coord_origin, CoordOrigin::Topleft);
        assert_eq!(tl.t, 72.0);
        assert_eq!(tl.b, 92.0);
        assert_eq!(tl.to_top_left_origin(792.0), tl);
    }

    #[test]
    fn test_union_and_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 20.0, 20.0);
        let u = a.union(&b);
        assert_eq!((u.l, u.t, u.r, u.b), (0.0, 0.0, 20.0, 20.0));
        assert!((a.intersection_over_self(&b) - 0.25).abs() < 1e-6);

        let far = BoundingBox::new(50.0, 50.0, 60.0, 60.0);
        assert_eq!(a.intersection_over_self(&far), 0.0);
    }

    #[test]
    fn test_serde_origin() {
        let json = serde_json::to_string(&BoundingBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert!(json.contains("\"coord_origin\":\"TOPLEFT\""));
    }
}
