// src/point_analysis.rs - Neighbourhood statistics between classified cells

use imageproc::point::Point;
use serde::Serialize;

use crate::shape_analysis::{contour_centroid, min_rect_diameter};

/// How many neural cells sit around each microglial cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct ProximityStats {
    pub mean_count: f64,
    /// Population standard deviation of the per-cell counts
    pub stddev_count: f64,
    /// Radius of the neighbourhood searched around each microglial centroid
    pub roi_radius: f64,
}

/// Mean and population standard deviation; zeros for an empty slice
pub fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Count neural centroids within `roi_factor` mean microglial diameters (as ROI width)
/// of every microglial centroid, then summarise the counts.
pub fn proximity_stats(
    microglial: &[Vec<Point<i32>>],
    neural: &[Vec<Point<i32>>],
    roi_factor: f64,
) -> ProximityStats {
    let microglial_centers: Vec<(f64, f64)> = microglial.iter().filter_map(|c| contour_centroid(c)).collect();
    if microglial_centers.is_empty() {
        return ProximityStats::default();
    }

    let diameters: Vec<f64> = microglial.iter().map(|c| min_rect_diameter(c)).collect();
    let (mean_diameter, _) = mean_and_stddev(&diameters);
    let roi_radius = roi_factor * mean_diameter / 2.0;

    let neural_centers: Vec<(f64, f64)> = neural.iter().filter_map(|c| contour_centroid(c)).collect();

    let counts: Vec<f64> = microglial_centers
        .iter()
        .map(|&(mx, my)| {
            neural_centers
                .iter()
                .filter(|&&(nx, ny)| ((nx - mx).powi(2) + (ny - my).powi(2)).sqrt() <= roi_radius)
                .count() as f64
        })
        .collect();

    let (mean_count, stddev_count) = mean_and_stddev(&counts);
    ProximityStats {
        mean_count,
        stddev_count,
        roi_radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn square_at(cx: i32, cy: i32, half: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(cx - half, cy - half),
            Point::new(cx + half, cy - half),
            Point::new(cx + half, cy + half),
            Point::new(cx - half, cy + half),
        ]
    }

    #[test]
    fn stats_of_constant_values() {
        let (mean, stddev) = mean_and_stddev(&[3.0, 3.0, 3.0]);
        assert_approx_eq!(mean, 3.0);
        assert_approx_eq!(stddev, 0.0);
        assert_eq!(mean_and_stddev(&[]), (0.0, 0.0));
    }

    #[test]
    fn population_deviation() {
        let (mean, stddev) = mean_and_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_approx_eq!(mean, 5.0);
        assert_approx_eq!(stddev, 2.0);
    }

    #[test]
    fn no_microglia_means_zero() {
        let stats = proximity_stats(&[], &[square_at(10, 10, 2)], 20.0);
        assert_eq!(stats, ProximityStats::default());
    }

    #[test]
    fn counts_neural_cells_per_microglial_cell() {
        // Side 2 squares have diagonal sqrt(8); factor 5 gives a radius of about 7.07
        let microglial = vec![square_at(10, 10, 1), square_at(100, 100, 1)];
        let neural = vec![square_at(14, 10, 1), square_at(10, 15, 1), square_at(40, 40, 1)];

        let stats = proximity_stats(&microglial, &neural, 5.0);
        assert_approx_eq!(stats.roi_radius, 5.0 * 8f64.sqrt() / 2.0, 1e-6);
        assert_approx_eq!(stats.mean_count, 1.0);
        assert_approx_eq!(stats.stddev_count, 1.0);
    }
}
