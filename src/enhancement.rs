// src/enhancement.rs - Turn one intensity plane into a clean binary mask

use image::GrayImage;

use crate::channel::{Band, Channel};
use crate::config::{ChannelConfig, ChannelSet, LowBandConfig};
use crate::errors::{GliaCensusError, Result};
use crate::image_utils::{binarize, binomial_blur, invert, mask_and, threshold_to_zero};

/// Enhance a single channel plane with the thresholds configured for `channel`
pub fn enhance_channel(
    plane: &GrayImage,
    channel: Channel,
    band: Band,
    channels: &ChannelSet,
) -> Result<GrayImage> {
    let params = channels.get(channel);
    match band {
        Band::Full => Ok(enhance_full(plane, params, params.high_threshold)),
        Band::Low => {
            let low_band = params
                .low_band
                .as_ref()
                .ok_or_else(|| GliaCensusError::UnsupportedBand(channel.to_string()))?;
            Ok(enhance_low(plane, params, low_band))
        }
    }
}

/// Enhance a plane whose channel is given by name, as read from a manifest or config
pub fn enhance_named_channel(
    plane: &GrayImage,
    channel_name: &str,
    band: Band,
    channels: &ChannelSet,
) -> Result<GrayImage> {
    let channel: Channel = channel_name.parse()?;
    enhance_channel(plane, channel, band, channels)
}

fn enhance_full(plane: &GrayImage, params: &ChannelConfig, high_threshold: u8) -> GrayImage {
    // Background becomes bright once the noise floor is cut and the plane inverted
    let mut mask = threshold_to_zero(plane, params.low_threshold);
    invert(&mut mask);

    let smoothed = binomial_blur(&mask, params.blur_radius);
    let mut mask = binarize(&smoothed, high_threshold);

    invert(&mut mask);
    mask
}

fn enhance_low(plane: &GrayImage, params: &ChannelConfig, low_band: &LowBandConfig) -> GrayImage {
    let mask = enhance_full(plane, params, low_band.high_threshold);

    // Keep only faint, unsaturated signal
    let mut faint = binomial_blur(plane, low_band.light_blur_radius);
    for pixel in faint.pixels_mut() {
        pixel[0] = if pixel[0] > 0 && pixel[0] < low_band.saturation_threshold {
            255
        } else {
            0
        };
    }

    mask_and(&mask, &faint)
}
