// src/shape_analysis.rs - Polygon measurements on traced contours

use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use nalgebra::{Matrix2, SymmetricEigen};

/// Unsigned area enclosed by a closed contour (shoelace formula over the point chain)
pub fn contour_area(contour: &[Point<i32>]) -> f64 {
    signed_area(contour).abs()
}

fn signed_area(contour: &[Point<i32>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let n = contour.len();
    let mut twice_area = 0i64;
    for i in 0..n {
        let p = contour[i];
        let q = contour[(i + 1) % n];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }

    twice_area as f64 / 2.0
}

/// Perimeter of the closed contour
pub fn arc_length(contour: &[Point<i32>]) -> f64 {
    if contour.len() < 2 {
        return 0.0;
    }

    let n = contour.len();
    let mut perimeter = 0.0;
    for i in 0..n {
        let p = contour[i];
        let q = contour[(i + 1) % n]; // Wrap around to first point
        let dx = (q.x - p.x) as f64;
        let dy = (q.y - p.y) as f64;
        perimeter += (dx * dx + dy * dy).sqrt();
    }

    perimeter
}

/// Centroid of the polygon from its first-order moments.
/// Falls back to the mean of the points when the polygon has no area.
pub fn contour_centroid(contour: &[Point<i32>]) -> Option<(f64, f64)> {
    if contour.is_empty() {
        return None;
    }

    let n = contour.len();
    let area = signed_area(contour);
    if area.abs() > f64::EPSILON {
        let mut m10 = 0.0;
        let mut m01 = 0.0;
        for i in 0..n {
            let (x0, y0) = (contour[i].x as f64, contour[i].y as f64);
            let (x1, y1) = (contour[(i + 1) % n].x as f64, contour[(i + 1) % n].y as f64);
            let cross = x0 * y1 - x1 * y0;
            m10 += (x0 + x1) * cross;
            m01 += (y0 + y1) * cross;
        }
        return Some((m10 / (6.0 * area), m01 / (6.0 * area)));
    }

    let sum_x: f64 = contour.iter().map(|p| p.x as f64).sum();
    let sum_y: f64 = contour.iter().map(|p| p.y as f64).sum();
    Some((sum_x / n as f64, sum_y / n as f64))
}

/// Diagonal of the minimum-area bounding rectangle
pub fn min_rect_diameter(contour: &[Point<i32>]) -> f64 {
    match contour.len() {
        0 | 1 => 0.0,
        2 => {
            let dx = (contour[1].x - contour[0].x) as f64;
            let dy = (contour[1].y - contour[0].y) as f64;
            (dx * dx + dy * dy).sqrt()
        }
        _ => {
            let corners = min_area_rect(contour);
            let dx = (corners[2].x - corners[0].x) as f64;
            let dy = (corners[2].y - corners[0].y) as f64;
            (dx * dx + dy * dy).sqrt()
        }
    }
}

/// Ellipse summarising a point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center: (f64, f64),
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Rotation of the major axis from +x, radians
    pub angle: f64,
}

impl Ellipse {
    /// Point on the outline at parameter `t` (radians)
    pub fn point_at(&self, t: f64) -> (f64, f64) {
        let (sin_a, cos_a) = self.angle.sin_cos();
        let (sin_t, cos_t) = t.sin_cos();
        let u = self.semi_major * cos_t;
        let v = self.semi_minor * sin_t;
        (
            self.center.0 + u * cos_a - v * sin_a,
            self.center.1 + u * sin_a + v * cos_a,
        )
    }
}

/// Fit an ellipse to boundary points from their second-order moments.
///
/// Points spread evenly along an ellipse with semi-axis `a` have variance
/// `a² / 2` along that axis, so each semi-axis is `sqrt(2 λ)` for the matching
/// eigenvalue of the covariance. Needs at least five points.
pub fn fit_ellipse(points: &[Point<i32>]) -> Option<Ellipse> {
    if points.len() < 5 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for p in points {
        let dx = p.x as f64 - mean_x;
        let dy = p.y as f64 - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let covariance = Matrix2::new(sxx / n, sxy / n, sxy / n, syy / n);
    let eigen = SymmetricEigen::new(covariance);
    let (major_idx, minor_idx) = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] {
        (0, 1)
    } else {
        (1, 0)
    };

    let major_axis = eigen.eigenvectors.column(major_idx);
    let angle = major_axis[1].atan2(major_axis[0]);

    Some(Ellipse {
        center: (mean_x, mean_y),
        semi_major: (2.0 * eigen.eigenvalues[major_idx].max(0.0)).sqrt(),
        semi_minor: (2.0 * eigen.eigenvalues[minor_idx].max(0.0)).sqrt(),
        angle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn square(side: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(0, 0),
            Point::new(side, 0),
            Point::new(side, side),
            Point::new(0, side),
        ]
    }

    #[test]
    fn area_is_orientation_free() {
        let mut points = square(10);
        assert_approx_eq!(contour_area(&points), 100.0);
        points.reverse();
        assert_approx_eq!(contour_area(&points), 100.0);
    }

    #[test]
    fn degenerate_contours_have_no_area() {
        assert_eq!(contour_area(&[]), 0.0);
        assert_eq!(contour_area(&[Point::new(1, 1), Point::new(4, 1)]), 0.0);
    }

    #[test]
    fn perimeter_closes_the_loop() {
        assert_approx_eq!(arc_length(&square(2)), 8.0);
        assert_eq!(arc_length(&[Point::new(3, 3)]), 0.0);
    }

    #[test]
    fn centroid_of_square() {
        let (cx, cy) = contour_centroid(&square(4)).unwrap();
        assert_approx_eq!(cx, 2.0);
        assert_approx_eq!(cy, 2.0);

        let line = [Point::new(0, 0), Point::new(4, 0)];
        let (lx, ly) = contour_centroid(&line).unwrap();
        assert_approx_eq!(lx, 2.0);
        assert_approx_eq!(ly, 0.0);
        assert!(contour_centroid(&[]).is_none());
    }

    #[test]
    fn rect_diameter_of_axis_aligned_rectangle() {
        let rect = [
            Point::new(0, 0),
            Point::new(3, 0),
            Point::new(3, 4),
            Point::new(0, 4),
        ];
        assert_approx_eq!(min_rect_diameter(&rect), 5.0, 1e-6);
    }

    #[test]
    fn ellipse_of_circle_points() {
        let points: Vec<Point<i32>> = (0..72)
            .map(|i| {
                let t = i as f64 * std::f64::consts::PI / 36.0;
                Point::new(
                    (50.0 + 20.0 * t.cos()).round() as i32,
                    (40.0 + 20.0 * t.sin()).round() as i32,
                )
            })
            .collect();

        let ellipse = fit_ellipse(&points).unwrap();
        assert_approx_eq!(ellipse.center.0, 50.0, 0.2);
        assert_approx_eq!(ellipse.center.1, 40.0, 0.2);
        assert_approx_eq!(ellipse.semi_major, 20.0, 0.5);
        assert_approx_eq!(ellipse.semi_minor, 20.0, 0.5);
    }

    #[test]
    fn ellipse_orientation_follows_long_axis() {
        let points: Vec<Point<i32>> = (0..72)
            .map(|i| {
                let t = i as f64 * std::f64::consts::PI / 36.0;
                Point::new((30.0 * t.cos()).round() as i32, (10.0 * t.sin()).round() as i32)
            })
            .collect();

        let ellipse = fit_ellipse(&points).unwrap();
        assert!(ellipse.semi_major > 2.0 * ellipse.semi_minor);
        // Major axis along x, either direction
        assert!(ellipse.angle.sin().abs() < 0.05);

        let (x, y) = ellipse.point_at(0.0);
        assert_approx_eq!(x.abs(), ellipse.semi_major, 1e-6);
        assert!(y.abs() < 1.5);
    }

    #[test]
    fn ellipse_needs_five_points() {
        assert!(fit_ellipse(&square(5)).is_none());
    }
}
