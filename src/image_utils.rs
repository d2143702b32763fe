use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

/// Sample value of mask foreground
pub const FOREGROUND: u8 = 255;
/// Sample value of mask background
pub const BACKGROUND: u8 = 0;

/// Zero every sample at or below `threshold`, keep the rest unchanged
pub fn threshold_to_zero(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        if pixel[0] <= threshold {
            pixel[0] = 0;
        }
    }
    result
}

/// Samples above `threshold` become foreground, all others background
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    imageproc::contrast::threshold(image, threshold)
}

/// Invert polarity in place
pub fn invert(image: &mut GrayImage) {
    image::imageops::invert(image);
}

/// Binomial weights of length `2 * radius + 1`; they sum to `4^radius`
pub fn binomial_kernel(radius: u32) -> Vec<u64> {
    let order = 2 * radius as u64;
    let mut weights = vec![1u64; order as usize + 1];
    for k in 1..order {
        weights[k as usize] = weights[k as usize - 1] * (order - k + 1) / k;
    }
    weights
}

/// Reflect an out-of-range index about the border without repeating the edge sample
#[inline]
fn reflect_101(index: i64, len: u32) -> usize {
    let last = len as i64 - 1;
    if last <= 0 {
        return 0;
    }
    let mut i = index;
    while i < 0 || i > last {
        i = if i < 0 { -i } else { 2 * last - i };
    }
    i as usize
}

/// Smooth with a separable binomial kernel; radius 1 is the 3x3 [1 2 1] kernel.
/// Both passes accumulate exactly and the result is rounded once.
pub fn binomial_blur(image: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let kernel = binomial_kernel(radius);
    let r = radius as i64;
    let norm = 1u64 << (4 * radius);

    let mut horizontal = vec![0u64; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0u64;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as i64 + k as i64 - r, width);
                acc += weight * image.get_pixel(sx as u32, y)[0] as u64;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    ImageBuffer::from_fn(width, height, |x, y| {
        let mut acc = 0u64;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = reflect_101(y as i64 + k as i64 - r, height);
            acc += weight * horizontal[sy * width as usize + x as usize];
        }
        Luma([((acc + norm / 2) / norm).min(255) as u8])
    })
}

/// Pixel-wise intersection of two masks
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine_masks(a, b, |p, q| p > 0 && q > 0)
}

/// Pixel-wise union of two masks
pub fn mask_or(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine_masks(a, b, |p, q| p > 0 || q > 0)
}

fn combine_masks<F>(a: &GrayImage, b: &GrayImage, op: F) -> GrayImage
where
    F: Fn(u8, u8) -> bool,
{
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        let value = if op(a.get_pixel(x, y)[0], b.get_pixel(x, y)[0]) {
            FOREGROUND
        } else {
            BACKGROUND
        };
        Luma([value])
    })
}

/// Number of non-zero samples
pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

/// Stack three planes into one RGB image
pub fn merge_channels(red: &GrayImage, green: &GrayImage, blue: &GrayImage) -> RgbImage {
    let (width, height) = red.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            red.get_pixel(x, y)[0],
            green.get_pixel(x, y)[0],
            blue.get_pixel(x, y)[0],
        ])
    })
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i32, y: i32, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height
}
