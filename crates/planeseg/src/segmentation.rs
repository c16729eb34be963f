//! Mask cleanup and connected-component labelling.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_erode, Mask};
use imageproc::region_labelling::connected_components;

use crate::config::Connectivity;
use crate::result::LabelImage;
use crate::sliding_window::PLANAR;

/// Erode a binary mask with a cross-shaped element of size `2 * radius + 1`.
///
/// Radius 0 returns the mask unchanged. Erosion only removes planar cells.
pub(crate) fn erode_cross(mask: &GrayImage, radius: usize) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let size = (2 * radius + 1) as u32;
    let center = radius as u32;
    let mut element = GrayImage::new(size, size);
    for i in 0..size {
        element.put_pixel(center, i, Luma([PLANAR]));
        element.put_pixel(i, center, Luma([PLANAR]));
    }
    // `radius <= ExtractorParams::MAX_EROSION` is checked by config validation.
    let element = Mask::from_image(&element, center as u8, center as u8);
    grayscale_erode(mask, &element)
}

/// Label connected planar regions. Background is 0, regions are positive.
///
/// Returns the label image together with the highest label in use.
pub(crate) fn label_regions(mask: &GrayImage, connectivity: Connectivity) -> (LabelImage, u32) {
    let labels = connected_components(mask, connectivity.into(), Luma([0u8]));
    let highest = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
    (labels, highest)
}
