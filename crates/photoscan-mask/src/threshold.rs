use image::GrayImage;

use crate::MaskError;

/// Pixels at or below this value are background.
pub const MASK_THRESHOLD: u8 = 5;

/// Apply a binary threshold to a grayscale image.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `dst` - The output image, with the same size as the input.
/// * `threshold` - Values strictly greater than this become `max_value`, the others 0.
/// * `max_value` - The foreground value.
///
/// # Example
///
/// ```
/// use image::GrayImage;
/// use photoscan_mask::threshold::threshold_binary;
///
/// let src = GrayImage::from_raw(3, 1, vec![4, 5, 6]).unwrap();
/// let mut dst = GrayImage::new(3, 1);
/// threshold_binary(&src, &mut dst, 5, 255).unwrap();
/// assert_eq!(dst.as_raw(), &vec![0, 0, 255]);
/// ```
pub fn threshold_binary(
    src: &GrayImage,
    dst: &mut GrayImage,
    threshold: u8,
    max_value: u8,
) -> Result<(), MaskError> {
    if src.dimensions() != dst.dimensions() {
        return Err(MaskError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    apply_threshold(src, dst, threshold, max_value);

    Ok(())
}

fn apply_threshold(src: &GrayImage, dst: &mut GrayImage, threshold: u8, max_value: u8) {
    src.as_raw()
        .iter()
        .zip(dst.iter_mut())
        .for_each(|(src_pixel, dst_pixel)| {
            *dst_pixel = if *src_pixel > threshold { max_value } else { 0 };
        });
}

/// Collapse a soft alpha mask into a hard `{0, 255}` mask at [`MASK_THRESHOLD`].
pub fn binarize(mask: &GrayImage) -> GrayImage {
    let mut binary = GrayImage::new(mask.width(), mask.height());
    apply_threshold(mask, &mut binary, MASK_THRESHOLD, u8::MAX);
    binary
}
