//! Subband tree used to look up the region of interest mask of a coefficient.
//!
//! The tree mirrors the dyadic wavelet decomposition of a tile-component.
//! Every node covers the rectangle its subband occupies in the usual layout
//! (LL top-left, HL top-right, LH bottom-left, HH bottom-right), so a point
//! inside an internal node lies in exactly one of its four children.
//!
//! ROI rectangles are given on the tile-component and are projected into
//! every subband using the support of the analysis filters: a coefficient is
//! in the mask as soon as one of the samples it depends on is in the ROI.

use log::{debug, warn};

use super::encoder_specs::{FilterSupport, WaveletFilter};
use crate::error::{J2kError, J2kResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubbandOrientation {
    #[default]
    /// Low-Low (base image)
    LL,
    /// High-Low (vertical edges)
    HL,
    /// Low-High (horizontal edges)
    LH,
    /// High-High (diagonal details)
    HH,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub ulx: i64,
    pub uly: i64,
    pub w: i64,
    pub h: i64,
}

impl Rect {
    pub fn new(ulx: i64, uly: i64, w: i64, h: i64) -> Self {
        Self { ulx, uly, w, h }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.ulx && x < self.ulx + self.w && y >= self.uly && y < self.uly + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    fn intersect(&self, other: &Rect) -> Rect {
        let ulx = self.ulx.max(other.ulx);
        let uly = self.uly.max(other.uly);
        let lrx = (self.ulx + self.w).min(other.ulx + other.w);
        let lry = (self.uly + self.h).min(other.uly + other.h);
        Rect::new(ulx, uly, lrx - ulx, lry - uly)
    }
}

/// Geometry and ROI content of one subband.
#[derive(Debug, Clone, Default)]
pub struct Subband {
    /// Position in the decomposition layout.
    pub rect: Rect,
    /// First coefficient index of the band on each axis, which fixes the
    /// parity of the next split.
    pub origin: (i64, i64),
    pub orientation: SubbandOrientation,
    /// Number of decompositions that produced this band; 0 for the root.
    pub level: u8,
    /// ROI rectangles in band coordinates.
    pub rois: Vec<Rect>,
}

impl Subband {
    /// Whether the coefficient at layout position (x, y) is in the ROI mask.
    pub fn in_roi(&self, x: i64, y: i64) -> bool {
        let bx = x - self.rect.ulx + self.origin.0;
        let by = y - self.rect.uly + self.origin.1;
        self.rois.iter().any(|r| r.contains(bx, by))
    }

    fn children(&self, filter: WaveletFilter) -> Children {
        let (low_x, high_x) = split_axis(self.origin.0, self.rect.w);
        let (low_y, high_y) = split_axis(self.origin.1, self.rect.h);
        let low = filter.low_pass_support();
        let high = filter.high_pass_support();

        let child = |orientation, x_band: &Band, y_band: &Band, x_high: bool, y_high: bool| {
            let rect = Rect::new(
                self.rect.ulx + if x_high { low_x.len } else { 0 },
                self.rect.uly + if y_high { low_y.len } else { 0 },
                x_band.len,
                y_band.len,
            );
            let (x_support, y_support) = (
                if x_high { high } else { low },
                if y_high { high } else { low },
            );
            let rois = self
                .rois
                .iter()
                .filter_map(|roi| {
                    let (x0, x1) = project(roi.ulx, roi.ulx + roi.w - 1, x_support, x_high, x_band)?;
                    let (y0, y1) = project(roi.uly, roi.uly + roi.h - 1, y_support, y_high, y_band)?;
                    Some(Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
                })
                .collect();
            MaskNode::Leaf(Subband {
                rect,
                origin: (x_band.origin, y_band.origin),
                orientation,
                level: self.level + 1,
                rois,
            })
        };

        Children {
            ll: child(SubbandOrientation::LL, &low_x, &low_y, false, false),
            hl: child(SubbandOrientation::HL, &high_x, &low_y, true, false),
            lh: child(SubbandOrientation::LH, &low_x, &high_y, false, true),
            hh: child(SubbandOrientation::HH, &high_x, &high_y, true, true),
        }
    }
}

struct Band {
    origin: i64,
    len: i64,
}

fn ceil_half(v: i64) -> i64 {
    -(-v).div_euclid(2)
}

fn floor_half(v: i64) -> i64 {
    v.div_euclid(2)
}

/// Splits `len` samples starting at `origin` into the low and high pass bands.
fn split_axis(origin: i64, len: i64) -> (Band, Band) {
    let low_origin = ceil_half(origin);
    let high_origin = floor_half(origin);
    (
        Band {
            origin: low_origin,
            len: ceil_half(origin + len) - low_origin,
        },
        Band {
            origin: high_origin,
            len: floor_half(origin + len) - high_origin,
        },
    )
}

/// Maps the inclusive sample range [first, last] to the coefficients of a
/// band that depend on it, clipped to the band.
fn project(
    first: i64,
    last: i64,
    support: FilterSupport,
    high_pass: bool,
    band: &Band,
) -> Option<(i64, i64)> {
    // Coefficient k is centred on sample 2k (low pass) or 2k + 1 (high pass).
    let centre = i64::from(high_pass);
    let k0 = ceil_half(first - support.positive - centre).max(band.origin);
    let k1 = floor_half(last + support.negative - centre).min(band.origin + band.len - 1);
    (k0 <= k1).then_some((k0, k1))
}

#[derive(Debug, Clone)]
pub struct Children {
    pub ll: MaskNode,
    pub hl: MaskNode,
    pub lh: MaskNode,
    pub hh: MaskNode,
}

#[derive(Debug, Clone)]
pub enum MaskNode {
    Leaf(Subband),
    Internal {
        subband: Subband,
        children: Box<Children>,
    },
}

impl MaskNode {
    pub fn subband(&self) -> &Subband {
        match self {
            Self::Leaf(subband) | Self::Internal { subband, .. } => subband,
        }
    }

    pub fn rect(&self) -> Rect {
        self.subband().rect
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn children(&self) -> Option<&Children> {
        match self {
            Self::Leaf(_) => None,
            Self::Internal { children, .. } => Some(children),
        }
    }

    /// Turns a leaf into an internal node with one decomposition level below
    /// it. Internal nodes are left as they are.
    pub fn split(&mut self, filter: WaveletFilter) {
        let Self::Leaf(subband) = self else {
            return;
        };
        let subband = std::mem::take(subband);
        let children = Box::new(subband.children(filter));
        *self = Self::Internal { subband, children };
    }

    fn decompose_lowest(&mut self, mut levels: u8, filter: WaveletFilter) {
        if self.is_leaf() {
            if levels == 0 {
                return;
            }
            self.split(filter);
            levels -= 1;
        }
        if let Self::Internal { children, .. } = self {
            children.ll.decompose_lowest(levels, filter);
        }
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a MaskNode>) {
        match self {
            Self::Leaf(_) => leaves.push(self),
            Self::Internal { children, .. } => {
                for child in [&children.ll, &children.hl, &children.lh, &children.hh] {
                    child.collect_leaves(leaves);
                }
            }
        }
    }
}

/// The subband mask tree of one tile-component.
#[derive(Debug, Clone)]
pub struct SubbandMaskTree {
    root: MaskNode,
}

impl SubbandMaskTree {
    /// A tree made of a single, undecomposed band.
    pub fn new(ulx: i64, uly: i64, w: i64, h: i64) -> Self {
        Self {
            root: MaskNode::Leaf(Subband {
                rect: Rect::new(ulx, uly, w, h),
                origin: (ulx, uly),
                ..Subband::default()
            }),
        }
    }

    /// Builds the tree of a `levels` deep decomposition with the ROI
    /// rectangles projected into every band.
    pub fn with_rois(
        rect: Rect,
        rois: &[Rect],
        levels: u8,
        filter: WaveletFilter,
    ) -> J2kResult<Self> {
        if rect.is_empty() {
            return Err(J2kError::config(format!(
                "empty tile-component {}x{}",
                rect.w, rect.h
            )));
        }

        let mut tree = Self::new(rect.ulx, rect.uly, rect.w, rect.h);
        if let MaskNode::Leaf(root) = &mut tree.root {
            for roi in rois {
                let clipped = roi.intersect(&rect);
                if clipped.is_empty() {
                    warn!("ignoring ROI {roi:?} outside of {rect:?}");
                } else {
                    root.rois.push(clipped);
                }
            }
        }
        tree.decompose(levels, filter);

        debug!(
            "subband mask tree: {levels} levels, {} ROIs, {filter} filter",
            rois.len()
        );
        Ok(tree)
    }

    /// Decomposes the lowest LL band `levels` more times.
    pub fn decompose(&mut self, levels: u8, filter: WaveletFilter) {
        self.root.decompose_lowest(levels, filter);
    }

    pub fn root(&self) -> &MaskNode {
        &self.root
    }

    /// Returns the leaf whose band contains the point (x, y).
    pub fn query(&self, x: i64, y: i64) -> J2kResult<&MaskNode> {
        if !self.root.rect().contains(x, y) {
            return Err(J2kError::OutOfBounds { x, y });
        }

        let mut node = &self.root;
        while let MaskNode::Internal { children, .. } = node {
            let split = children.hh.rect();
            node = match (x < split.ulx, y < split.uly) {
                (true, true) => &children.ll,
                (false, true) => &children.hl,
                (true, false) => &children.lh,
                (false, false) => &children.hh,
            };
        }
        Ok(node)
    }

    /// Whether the coefficient at layout position (x, y) is in the ROI mask.
    pub fn in_roi(&self, x: i64, y: i64) -> J2kResult<bool> {
        Ok(self.query(x, y)?.subband().in_roi(x, y))
    }

    /// All leaves, in LL, HL, LH, HH order at every level.
    pub fn leaves(&self) -> Vec<&MaskNode> {
        let mut leaves = Vec::new();
        self.root.collect_leaves(&mut leaves);
        leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_containment_one_level() {
        let mut tree = SubbandMaskTree::new(0, 0, 256, 256);
        tree.decompose(1, WaveletFilter::Reversible5x3);

        let children = tree.root().children().unwrap();
        for child in [&children.ll, &children.hl, &children.lh, &children.hh] {
            assert_eq!(child.rect().w, 128);
            assert_eq!(child.rect().h, 128);
        }

        for y in 0..256 {
            for x in 0..256 {
                let leaf = tree.query(x, y).unwrap();
                assert!(leaf.is_leaf());
                assert!(leaf.rect().contains(x, y));
            }
        }

        assert_eq!(
            tree.query(200, 10).unwrap().subband().orientation,
            SubbandOrientation::HL
        );
        assert_eq!(
            tree.query(10, 200).unwrap().subband().orientation,
            SubbandOrientation::LH
        );
    }

    #[test]
    fn test_query_out_of_bounds() {
        let mut tree = SubbandMaskTree::new(0, 0, 256, 256);
        tree.decompose(1, WaveletFilter::Reversible5x3);
        assert!(matches!(
            tree.query(-1, 0),
            Err(J2kError::OutOfBounds { x: -1, y: 0 })
        ));
        assert!(matches!(
            tree.query(256, 0),
            Err(J2kError::OutOfBounds { x: 256, y: 0 })
        ));
        assert!(tree.query(0, 256).is_err());
    }

    #[test]
    fn test_multi_level_odd_sizes() {
        let mut tree = SubbandMaskTree::new(3, 1, 37, 21);
        tree.decompose(3, WaveletFilter::Irreversible9x7);

        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 10);
        let area: i64 = leaves.iter().map(|l| l.rect().w * l.rect().h).sum();
        assert_eq!(area, 37 * 21);

        for y in 1..22 {
            for x in 3..40 {
                let leaf = tree.query(x, y).unwrap();
                assert!(leaf.rect().contains(x, y), "({x}, {y}) not in {:?}", leaf.rect());
            }
        }

        // Odd origin: the low band gets the smaller half.
        let children = tree.root().children().unwrap();
        assert_eq!(children.ll.rect().w, 18);
        assert_eq!(children.hl.rect().w, 19);
        assert_eq!(children.ll.subband().level, 1);
    }

    #[test]
    fn test_decompose_continues_from_lowest_band() {
        let mut tree = SubbandMaskTree::new(0, 0, 64, 64);
        tree.decompose(1, WaveletFilter::Reversible5x3);
        tree.decompose(1, WaveletFilter::Reversible5x3);
        let leaf = tree.query(0, 0).unwrap();
        assert_eq!(leaf.subband().level, 2);
        assert_eq!(leaf.rect(), Rect::new(0, 0, 16, 16));
        assert_eq!(tree.leaves().len(), 7);
    }

    #[test]
    fn test_roi_projection() {
        let tree = SubbandMaskTree::with_rois(
            Rect::new(0, 0, 256, 256),
            &[Rect::new(0, 0, 1, 1)],
            1,
            WaveletFilter::Reversible5x3,
        )
        .unwrap();

        // LL: samples 0..=2 reach low pass coefficients 0 and 1.
        assert!(tree.in_roi(0, 0).unwrap());
        assert!(tree.in_roi(1, 1).unwrap());
        assert!(!tree.in_roi(2, 0).unwrap());
        // HL: only the first high pass coefficient.
        assert!(tree.in_roi(128, 1).unwrap());
        assert!(!tree.in_roi(129, 0).unwrap());
        assert!(!tree.in_roi(128, 2).unwrap());
        // HH
        assert!(tree.in_roi(128, 128).unwrap());
        assert!(!tree.in_roi(129, 129).unwrap());
        assert!(!tree.in_roi(200, 200).unwrap());
    }

    #[test]
    fn test_roi_covering_everything() {
        let rect = Rect::new(0, 0, 40, 30);
        let tree =
            SubbandMaskTree::with_rois(rect, &[rect], 2, WaveletFilter::Irreversible9x7).unwrap();
        for y in 0..30 {
            for x in 0..40 {
                assert!(tree.in_roi(x, y).unwrap());
            }
        }
    }

    #[test]
    fn test_roi_outside_is_dropped() {
        let tree = SubbandMaskTree::with_rois(
            Rect::new(0, 0, 16, 16),
            &[Rect::new(100, 100, 4, 4)],
            1,
            WaveletFilter::Reversible5x3,
        )
        .unwrap();
        assert!(tree.leaves().iter().all(|l| l.subband().rois.is_empty()));
        assert!(!tree.in_roi(0, 0).unwrap());
    }

    #[test]
    fn test_empty_tile_component_is_rejected() {
        let result = SubbandMaskTree::with_rois(
            Rect::new(0, 0, 0, 16),
            &[],
            1,
            WaveletFilter::Reversible5x3,
        );
        assert!(matches!(result, Err(J2kError::Config(_))));
    }
}
