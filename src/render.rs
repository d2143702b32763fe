// src/render.rs - Rasterisation and debug/annotation images

use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AnnotationConfig;
use crate::contours::RegionSegmentation;
use crate::image_utils::{in_bounds, FOREGROUND};
use crate::shape_analysis::Ellipse;

/// Seeded source of region colours; the same seed yields the same colour sequence
pub struct RegionPalette {
    rng: StdRng,
}

impl RegionPalette {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_color(&mut self) -> Rgb<u8> {
        Rgb([
            self.rng.gen_range(0..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(0..255),
        ])
    }
}

/// Drop a repeated closing point; polygon filling needs an open chain
fn open_chain(contour: &[Point<i32>]) -> &[Point<i32>] {
    let mut end = contour.len();
    while end > 1 && contour[end - 1] == contour[0] {
        end -= 1;
    }
    &contour[..end]
}

/// Draw the closed boundary of a contour, one pixel wide
pub fn draw_outline<P>(canvas: &mut ImageBuffer<P, Vec<P::Subpixel>>, contour: &[Point<i32>], color: P)
where
    P: Pixel + 'static,
{
    let chain = open_chain(contour);
    match chain.len() {
        0 => {}
        1 => {
            let p = chain[0];
            if in_bounds(p.x, p.y, canvas.width(), canvas.height()) {
                canvas.put_pixel(p.x as u32, p.y as u32, color);
            }
        }
        n => {
            for i in 0..n {
                let a = chain[i];
                let b = chain[(i + 1) % n];
                draw_line_segment_mut(canvas, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), color);
            }
        }
    }
}

/// Draw the closed boundary of a contour with a pen `thickness` pixels wide
pub fn draw_thick_outline(canvas: &mut RgbImage, contour: &[Point<i32>], thickness: u32, color: Rgb<u8>) {
    if thickness <= 1 {
        draw_outline(canvas, contour, color);
        return;
    }

    let radius = (thickness / 2) as i32;
    let chain = open_chain(contour);
    let n = chain.len();
    for i in 0..n {
        let a = chain[i];
        let b = chain[(i + 1) % n];
        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).max(1);
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = a.x as f32 + t * (b.x - a.x) as f32;
            let y = a.y as f32 + t * (b.y - a.y) as f32;
            draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, color);
        }
    }
}

/// Fill a contour's interior and boundary
pub fn fill_contour<P>(canvas: &mut ImageBuffer<P, Vec<P::Subpixel>>, contour: &[Point<i32>], color: P)
where
    P: Pixel + 'static,
{
    let chain = open_chain(contour);
    if chain.len() >= 3 {
        draw_polygon_mut(canvas, chain, color);
    }
    draw_outline(canvas, chain, color);
}

/// Rasterise one contour alone into a fresh mask
pub fn rasterize_contour(contour: &[Point<i32>], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    fill_contour(&mut mask, contour, Luma([FOREGROUND]));
    mask
}

/// Colour every accepted region, leaving its holes open, in ascending contour order
pub fn render_segmentation(
    segmentation: &RegionSegmentation,
    width: u32,
    height: u32,
    palette: &mut RegionPalette,
) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);

    for index in segmentation.accepted() {
        let color = palette.next_color();
        fill_contour(&mut canvas, &segmentation.contours[index], color);

        for hole in segmentation.holes_of(index) {
            let contour = &segmentation.contours[hole];
            // Hole borders run through region pixels, so repaint them after clearing
            fill_contour(&mut canvas, contour, Rgb([0, 0, 0]));
            draw_outline(&mut canvas, contour, color);
        }
    }

    canvas
}

/// Trace an ellipse outline with a pen of the given thickness
pub fn draw_ellipse_outline(canvas: &mut RgbImage, ellipse: &Ellipse, thickness: u32, color: Rgb<u8>) {
    let perimeter_estimate = std::f64::consts::PI * (ellipse.semi_major + ellipse.semi_minor);
    let steps = (perimeter_estimate.ceil() as usize * 2).max(16);
    let radius = (thickness / 2) as i32;

    let points: Vec<(f32, f32)> = (0..steps)
        .map(|i| {
            let t = i as f64 * std::f64::consts::TAU / steps as f64;
            let (x, y) = ellipse.point_at(t);
            (x as f32, y as f32)
        })
        .collect();

    for (i, &start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        if radius == 0 {
            draw_line_segment_mut(canvas, start, end, color);
        } else {
            let center = (start.0.round() as i32, start.1.round() as i32);
            draw_filled_circle_mut(canvas, center, radius, color);
        }
    }
}

/// Geometry of the cells found in one layer group
pub struct ClassifiedCells<'a> {
    pub microglial: &'a [Ellipse],
    pub neural: &'a [Ellipse],
    pub other: &'a [Vec<Point<i32>>],
}

/// Overlay classified cells on the merged blue mask.
/// Microglial and neural ellipses replace whatever lies under them; other nuclei get an outline.
pub fn render_classification(blue_mask: &GrayImage, cells: &ClassifiedCells<'_>, style: &AnnotationConfig) -> RgbImage {
    let (width, height) = blue_mask.dimensions();
    let mut canvas = ImageBuffer::from_fn(width, height, |x, y| Rgb([0, 0, blue_mask.get_pixel(x, y)[0]]));

    if style.other_thickness > 0 {
        let color = Rgb(style.other_color);
        for contour in cells.other {
            draw_thick_outline(&mut canvas, contour, style.other_thickness, color);
        }
    }

    for ellipse in cells.microglial {
        draw_ellipse_outline(&mut canvas, ellipse, style.ellipse_thickness, Rgb(style.microglial_color));
    }

    for ellipse in cells.neural {
        draw_ellipse_outline(&mut canvas, ellipse, style.ellipse_thickness, Rgb(style.neural_color));
    }

    canvas
}
