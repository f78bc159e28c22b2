use image::RgbaImage;

/// Replaces every pixel with the integer mean of its RGB channels, fully opaque.
pub fn grayscale(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let sum = u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2]);
        let v = (sum / 3) as u8;
        px.0 = [v, v, v, 255];
    }
}
