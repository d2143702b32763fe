// src/classification.rs - Sort nuclei into cell types by mask overlap

use image::GrayImage;
use imageproc::point::Point;
use log::debug;

use crate::config::ClassifierRule;
use crate::image_utils::{count_foreground, mask_and};
use crate::render::rasterize_contour;
use crate::shape_analysis::arc_length;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Target,
    Other,
}

/// Outcome of testing one candidate contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub bucket: Bucket,
    /// Fraction of the contour's pixels inside the intersection; `None` when it was never measured
    pub coverage: Option<f64>,
}

/// Candidates split by verdict, input order preserved within each bucket
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub target: Vec<Vec<Point<i32>>>,
    pub other: Vec<Vec<Point<i32>>>,
}

/// Share of the contour's filled area that lies inside `intersection`.
/// `None` if the contour covers no pixels of the image.
pub fn coverage_ratio(contour: &[Point<i32>], intersection: &GrayImage) -> Option<f64> {
    let (width, height) = intersection.dimensions();
    let single = rasterize_contour(contour, width, height);

    let before = count_foreground(&single);
    if before == 0 {
        return None;
    }
    let after = count_foreground(&mask_and(&single, intersection));

    Some(after as f64 / before as f64)
}

/// Decide the bucket of one contour
pub fn classify_contour(contour: &[Point<i32>], intersection: &GrayImage, rule: &ClassifierRule) -> Verdict {
    if contour.len() < rule.min_points || arc_length(contour) < rule.min_arc_length {
        return Verdict {
            bucket: Bucket::Other,
            coverage: None,
        };
    }

    let coverage = coverage_ratio(contour, intersection);
    let bucket = match coverage {
        Some(ratio) if ratio >= rule.coverage_threshold => Bucket::Target,
        _ => Bucket::Other,
    };
    Verdict { bucket, coverage }
}

/// Split candidates into those overlapping `intersection` and the rest
pub fn classify_contours(
    candidates: Vec<Vec<Point<i32>>>,
    intersection: &GrayImage,
    rule: &ClassifierRule,
) -> Classification {
    let mut result = Classification::default();
    for contour in candidates {
        match classify_contour(&contour, intersection, rule).bucket {
            Bucket::Target => result.target.push(contour),
            Bucket::Other => result.other.push(contour),
        }
    }

    debug!(
        "Classified {} contours: {} target, {} other",
        result.target.len() + result.other.len(),
        result.target.len(),
        result.other.len()
    );
    result
}
