// src/contours.rs - Region extraction with parent/hole bookkeeping
//
// Contours live in a flat list; their nesting is an arena of index links so
// siblings and holes can be walked without owning pointers.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use log::debug;

use crate::channel::ExtractionMode;
use crate::shape_analysis::contour_area;

/// Closed boundary as traced from a mask
pub type ContourPoints = Vec<Point<i32>>;

/// Links of one contour into the flat contour list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HierarchyRecord {
    pub next: Option<usize>,
    pub previous: Option<usize>,
    pub first_child: Option<usize>,
    pub parent: Option<usize>,
}

impl HierarchyRecord {
    pub fn is_external(&self) -> bool {
        self.parent.is_none()
    }
}

/// Outcome of area filtering for one contour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLabel {
    Invalid,
    Hole,
    Accepted,
}

/// Contours of a mask with their hierarchy
#[derive(Debug, Clone, Default)]
pub struct ContourSet {
    pub contours: Vec<ContourPoints>,
    pub hierarchy: Vec<HierarchyRecord>,
}

impl ContourSet {
    /// Build sibling and child links from each contour's parent.
    /// Siblings are chained in ascending index order.
    pub fn from_parents(contours: Vec<ContourPoints>, parents: &[Option<usize>]) -> Self {
        debug_assert_eq!(contours.len(), parents.len());
        let mut hierarchy = vec![HierarchyRecord::default(); contours.len()];
        let mut last_top: Option<usize> = None;
        let mut last_child: Vec<Option<usize>> = vec![None; contours.len()];

        for (index, &parent) in parents.iter().enumerate() {
            hierarchy[index].parent = parent;
            let previous = match parent {
                Some(p) => {
                    if hierarchy[p].first_child.is_none() {
                        hierarchy[p].first_child = Some(index);
                    }
                    last_child[p].replace(index)
                }
                None => last_top.replace(index),
            };

            if let Some(prev) = previous {
                hierarchy[prev].next = Some(index);
                hierarchy[index].previous = Some(prev);
            }
        }

        Self { contours, hierarchy }
    }

    pub fn len(&self) -> usize {
        self.contours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// Indices of the holes directly under `index`, following the sibling chain
    pub fn children(&self, index: usize) -> Vec<usize> {
        walk_children(&self.hierarchy, index)
    }
}

fn walk_children(hierarchy: &[HierarchyRecord], index: usize) -> Vec<usize> {
    let mut children = Vec::new();
    let mut cursor = hierarchy[index].first_child;
    // A well-formed chain never revisits a contour
    while let Some(child) = cursor {
        if children.len() >= hierarchy.len() {
            break;
        }
        children.push(child);
        cursor = hierarchy[child].next;
    }
    children
}

/// Copy of `mask` inside a one-pixel background frame
fn pad_mask(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);
    for (x, y, pixel) in mask.enumerate_pixels() {
        padded.put_pixel(x + 1, y + 1, *pixel);
    }
    padded
}

/// Trace every border of `mask` and arrange it according to `mode`
pub fn find_contour_set(mask: &GrayImage, mode: ExtractionMode) -> ContourSet {
    // Borders touching the image edge are only classified correctly with background around them
    let mut traced = find_contours::<i32>(&pad_mask(mask));
    for contour in &mut traced {
        for point in &mut contour.points {
            point.x -= 1;
            point.y -= 1;
        }
    }

    match mode {
        ExtractionMode::External => {
            let contours: Vec<ContourPoints> = traced
                .into_iter()
                .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
                .map(|c| c.points)
                .collect();
            let parents = vec![None; contours.len()];
            ContourSet::from_parents(contours, &parents)
        }
        ExtractionMode::TwoLevel => {
            // Islands inside holes start a new top level; holes keep their outer border
            let parents: Vec<Option<usize>> = traced
                .iter()
                .map(|c| match c.border_type {
                    BorderType::Outer => None,
                    BorderType::Hole => c.parent,
                })
                .collect();
            let contours = traced.into_iter().map(|c| c.points).collect();
            ContourSet::from_parents(contours, &parents)
        }
    }
}

/// Contours labelled and measured against a minimum area
#[derive(Debug, Clone, Default)]
pub struct RegionSegmentation {
    pub contours: Vec<ContourPoints>,
    pub hierarchy: Vec<HierarchyRecord>,
    pub labels: Vec<RegionLabel>,
    /// Net area per contour; zero unless the label is `Accepted`
    pub areas: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelCounts {
    pub invalid: usize,
    pub hole: usize,
    pub accepted: usize,
}

impl LabelCounts {
    pub fn total(&self) -> usize {
        self.invalid + self.hole + self.accepted
    }
}

impl RegionSegmentation {
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn label_counts(&self) -> LabelCounts {
        let mut counts = LabelCounts::default();
        for label in &self.labels {
            match label {
                RegionLabel::Invalid => counts.invalid += 1,
                RegionLabel::Hole => counts.hole += 1,
                RegionLabel::Accepted => counts.accepted += 1,
            }
        }
        counts
    }

    /// Accepted contour indices in ascending order
    pub fn accepted(&self) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == RegionLabel::Accepted)
            .map(|(index, _)| index)
    }

    /// Holes of an accepted contour that were subtracted from its area
    pub fn holes_of(&self, index: usize) -> Vec<usize> {
        walk_children(&self.hierarchy, index)
            .into_iter()
            .filter(|&child| self.labels[child] == RegionLabel::Hole)
            .collect()
    }
}

/// Label every contour and compute the net area of accepted ones.
///
/// Each external contour whose outer area reaches `min_area` has its direct
/// holes subtracted; it is accepted when the remaining area still reaches
/// `min_area`, and its non-empty holes are then labelled `Hole`. Holes of
/// holes are not walked. Anything else stays `Invalid`.
pub fn label_regions(set: ContourSet, min_area: f64) -> RegionSegmentation {
    let count = set.len();
    let mut labels = vec![RegionLabel::Invalid; count];
    let mut areas = vec![0.0; count];

    for index in 0..count {
        if !set.hierarchy[index].is_external() {
            continue;
        }

        let outer_area = contour_area(&set.contours[index]);
        if outer_area < min_area {
            continue;
        }

        let mut holes = Vec::new();
        let mut hole_area = 0.0;
        for child in set.children(index) {
            let area = contour_area(&set.contours[child]);
            if area > 0.0 {
                holes.push(child);
                hole_area += area;
            }
        }

        let net_area = outer_area - hole_area;
        if net_area >= min_area {
            labels[index] = RegionLabel::Accepted;
            areas[index] = net_area;
            for hole in holes {
                labels[hole] = RegionLabel::Hole;
            }
        }
    }

    let segmentation = RegionSegmentation {
        contours: set.contours,
        hierarchy: set.hierarchy,
        labels,
        areas,
    };
    let counts = segmentation.label_counts();
    debug!(
        "Labelled {} contours: {} accepted, {} holes, {} invalid",
        count, counts.accepted, counts.hole, counts.invalid
    );
    segmentation
}

/// Trace, arrange and label the regions of a mask in one step
pub fn segment_mask(mask: &GrayImage, mode: ExtractionMode, min_area: f64) -> RegionSegmentation {
    label_regions(find_contour_set(mask, mode), min_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use image::Luma;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> ContourPoints {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([value]));
            }
        }
    }

    #[test]
    fn links_follow_parents() {
        let set = ContourSet::from_parents(
            vec![rect(0, 0, 20, 20), rect(2, 2, 4, 4), rect(6, 6, 8, 8), rect(30, 30, 40, 40)],
            &[None, Some(0), Some(0), None],
        );

        assert_eq!(set.hierarchy[0].first_child, Some(1));
        assert_eq!(set.hierarchy[0].next, Some(3));
        assert_eq!(set.hierarchy[3].previous, Some(0));
        assert_eq!(set.hierarchy[1].next, Some(2));
        assert_eq!(set.hierarchy[2].previous, Some(1));
        assert_eq!(set.hierarchy[2].parent, Some(0));
        assert_eq!(set.hierarchy[3].first_child, None);
        assert_eq!(set.children(0), vec![1, 2]);
    }

    #[test]
    fn outer_with_holes_nets_out_hole_area() {
        // 20x20 outer (400) with holes of 25 and 16
        let set = ContourSet::from_parents(
            vec![rect(0, 0, 20, 20), rect(2, 2, 7, 7), rect(10, 10, 14, 14)],
            &[None, Some(0), Some(0)],
        );
        let seg = label_regions(set, 1.0);

        assert_eq!(seg.labels, vec![RegionLabel::Accepted, RegionLabel::Hole, RegionLabel::Hole]);
        assert_approx_eq!(seg.areas[0], 400.0 - 25.0 - 16.0);
        assert_eq!(seg.holes_of(0), vec![1, 2]);
        assert_eq!(seg.label_counts().total(), 3);
    }

    #[test]
    fn one_hole_scenario() {
        let set = ContourSet::from_parents(vec![rect(0, 0, 20, 20), rect(5, 5, 10, 10)], &[None, Some(0)]);
        let seg = label_regions(set, 1.0);
        assert_approx_eq!(seg.areas[0], 375.0);
        assert_eq!(seg.label_counts(), LabelCounts { invalid: 0, hole: 1, accepted: 1 });
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let at = label_regions(ContourSet::from_parents(vec![rect(0, 0, 10, 10)], &[None]), 100.0);
        assert_eq!(at.labels[0], RegionLabel::Accepted);

        let below = label_regions(ContourSet::from_parents(vec![rect(0, 0, 10, 10)], &[None]), 101.0);
        assert_eq!(below.labels[0], RegionLabel::Invalid);
        assert_eq!(below.areas[0], 0.0);
        assert_eq!(below.accepted().count(), 0);
    }

    #[test]
    fn holes_can_push_net_area_below_threshold() {
        // outer 100 passes on its own, net 100 - 64 = 36 does not
        let set = ContourSet::from_parents(vec![rect(0, 0, 10, 10), rect(1, 1, 9, 9)], &[None, Some(0)]);
        let seg = label_regions(set, 50.0);
        assert_eq!(seg.labels, vec![RegionLabel::Invalid, RegionLabel::Invalid]);
        assert_eq!(seg.label_counts(), LabelCounts { invalid: 2, hole: 0, accepted: 0 });
    }

    #[test]
    fn zero_area_hole_is_not_collected() {
        let degenerate = vec![Point::new(3, 3), Point::new(5, 3)];
        let set = ContourSet::from_parents(vec![rect(0, 0, 10, 10), degenerate], &[None, Some(0)]);
        let seg = label_regions(set, 1.0);
        assert_eq!(seg.labels, vec![RegionLabel::Accepted, RegionLabel::Invalid]);
        assert_approx_eq!(seg.areas[0], 100.0);
    }

    #[test]
    fn nested_contours_below_a_hole_are_not_walked() {
        // outer -> hole -> inner island listed under the hole
        let set = ContourSet::from_parents(
            vec![rect(0, 0, 20, 20), rect(2, 2, 18, 18), rect(5, 5, 10, 10)],
            &[None, Some(0), Some(1)],
        );
        let seg = label_regions(set, 1.0);
        assert_eq!(seg.labels[0], RegionLabel::Accepted);
        assert_eq!(seg.labels[1], RegionLabel::Hole);
        assert_eq!(seg.labels[2], RegionLabel::Invalid);
        assert_approx_eq!(seg.areas[0], 400.0 - 256.0);
    }

    #[test]
    fn filled_square_from_mask() {
        // 11x11 pixels trace a 10x10 boundary polygon
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 5, 5, 16, 16, 255);

        let seg = segment_mask(&mask, ExtractionMode::TwoLevel, 1.0);
        assert_eq!(seg.len(), 1);
        assert_eq!(seg.labels[0], RegionLabel::Accepted);
        assert_approx_eq!(seg.areas[0], 100.0);
    }

    #[test]
    fn square_with_hole_from_mask() {
        let mut mask = GrayImage::new(40, 40);
        fill(&mut mask, 5, 5, 26, 26, 255);
        fill(&mut mask, 12, 12, 17, 17, 0);

        let seg = segment_mask(&mask, ExtractionMode::TwoLevel, 1.0);
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.label_counts(), LabelCounts { invalid: 0, hole: 1, accepted: 1 });

        let parent = seg.accepted().next().unwrap();
        let hole = seg.holes_of(parent)[0];
        assert_eq!(seg.hierarchy[hole].parent, Some(parent));

        let outer = contour_area(&seg.contours[parent]);
        let hole_area = contour_area(&seg.contours[hole]);
        assert_approx_eq!(outer, 400.0);
        assert!(hole_area > 0.0);
        assert_approx_eq!(seg.areas[parent], outer - hole_area);
    }

    #[test]
    fn external_mode_ignores_holes_and_islands() {
        let mut mask = GrayImage::new(40, 40);
        fill(&mut mask, 5, 5, 26, 26, 255);
        fill(&mut mask, 10, 10, 21, 21, 0);
        fill(&mut mask, 14, 14, 17, 17, 255);
        fill(&mut mask, 30, 30, 35, 35, 255);

        let set = find_contour_set(&mask, ExtractionMode::External);
        assert_eq!(set.len(), 2);
        assert!(set.hierarchy.iter().all(|h| h.parent.is_none() && h.first_child.is_none()));

        let seg = label_regions(set, 1.0);
        assert_approx_eq!(seg.areas[0], 400.0);
    }

    #[test]
    fn two_level_mode_lifts_islands_to_top_level() {
        let mut mask = GrayImage::new(40, 40);
        fill(&mut mask, 5, 5, 26, 26, 255);
        fill(&mut mask, 10, 10, 21, 21, 0);
        fill(&mut mask, 14, 14, 17, 17, 255);

        let set = find_contour_set(&mask, ExtractionMode::TwoLevel);
        assert_eq!(set.len(), 3);
        let top_level = set.hierarchy.iter().filter(|h| h.is_external()).count();
        assert_eq!(top_level, 2);

        let seg = label_regions(set, 1.0);
        assert_eq!(seg.label_counts(), LabelCounts { invalid: 0, hole: 1, accepted: 2 });
    }

    #[test]
    fn labelling_is_deterministic() {
        let mut mask = GrayImage::new(50, 50);
        fill(&mut mask, 2, 2, 20, 20, 255);
        fill(&mut mask, 6, 6, 9, 9, 0);
        fill(&mut mask, 25, 25, 45, 40, 255);
        fill(&mut mask, 30, 30, 32, 35, 0);

        let a = segment_mask(&mask, ExtractionMode::TwoLevel, 1.0);
        let b = segment_mask(&mask, ExtractionMode::TwoLevel, 1.0);
        assert_eq!(a.contours, b.contours);
        assert_eq!(a.hierarchy, b.hierarchy);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.areas, b.areas);
    }

    #[test]
    fn square_touching_the_corner_is_found() {
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 0, 0, 11, 11, 255);

        for mode in [ExtractionMode::External, ExtractionMode::TwoLevel] {
            let seg = segment_mask(&mask, mode, 1.0);
            assert_eq!(seg.len(), 1);
            assert_eq!(seg.labels[0], RegionLabel::Accepted);
            assert_approx_eq!(seg.areas[0], 100.0);
            assert!(seg.contours[0].iter().all(|p| p.x >= 0 && p.y >= 0 && p.x <= 10 && p.y <= 10));
            assert!(seg.contours[0].contains(&Point::new(0, 0)));
        }
    }

    #[test]
    fn edge_touching_region_keeps_its_hole() {
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 0, 0, 21, 21, 255);
        fill(&mut mask, 8, 8, 13, 13, 0);

        let seg = segment_mask(&mask, ExtractionMode::TwoLevel, 1.0);
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.label_counts(), LabelCounts { invalid: 0, hole: 1, accepted: 1 });

        let parent = seg.accepted().next().unwrap();
        let hole = seg.holes_of(parent)[0];
        let outer = contour_area(&seg.contours[parent]);
        assert_approx_eq!(outer, 400.0);
        assert!(seg.areas[parent] < outer);
        assert_approx_eq!(seg.areas[parent], outer - contour_area(&seg.contours[hole]));

        let external = segment_mask(&mask, ExtractionMode::External, 1.0);
        assert_eq!(external.len(), 1);
        assert_approx_eq!(external.areas[0], 400.0);
    }

    #[test]
    fn full_foreground_mask_is_one_region() {
        let mask = GrayImage::from_pixel(10, 10, Luma([255]));
        let seg = segment_mask(&mask, ExtractionMode::External, 1.0);
        assert_eq!(seg.len(), 1);
        assert_approx_eq!(seg.areas[0], 81.0);
    }

    #[test]
    fn empty_mask_has_no_contours() {
        let seg = segment_mask(&GrayImage::new(10, 10), ExtractionMode::TwoLevel, 1.0);
        assert!(seg.is_empty());
        assert_eq!(seg.label_counts().total(), 0);
    }
}
