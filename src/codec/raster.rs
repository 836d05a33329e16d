//! PNG/JPEG image codec backed by the `image` crate.

use std::io::Cursor;

use image::{
    ColorType, DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage,
};

use crate::error::{DatasetError, DatasetResult};

use super::image::{ImageCodec, PixelBuffer, PixelLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterFormat {
    #[default]
    Png,
    /// Lossy; decoded pixels differ from the stored ones.
    Jpeg,
}

impl RasterFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Stores images as standard raster files.
///
/// BGR(A) buffers are written as RGB(A); decoding always yields gray, gray
/// with alpha, RGB or RGBA layouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec {
    format: RasterFormat,
}

impl RasterCodec {
    pub fn new(format: RasterFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }
}

fn swap_red_blue(mut data: Vec<u8>, channels: usize) -> Vec<u8> {
    for pixel in data.chunks_exact_mut(channels) {
        pixel.swap(0, 2);
    }
    data
}

fn to_dynamic(image: &PixelBuffer) -> DatasetResult<DynamicImage> {
    let (width, height) = (image.width(), image.height());
    let data = image.data().to_vec();
    let dynamic = match image.layout() {
        PixelLayout::Gray8 => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
        PixelLayout::GrayAlpha8 => {
            GrayAlphaImage::from_raw(width, height, data).map(DynamicImage::ImageLumaA8)
        }
        PixelLayout::Rgb8 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
        PixelLayout::Rgba8 => {
            RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
        }
        PixelLayout::Bgr8 => RgbImage::from_raw(width, height, swap_red_blue(data, 3))
            .map(DynamicImage::ImageRgb8),
        PixelLayout::Bgra8 => RgbaImage::from_raw(width, height, swap_red_blue(data, 4))
            .map(DynamicImage::ImageRgba8),
    };
    dynamic.ok_or_else(|| DatasetError::image_codec("pixel buffer does not match its dimensions"))
}

impl ImageCodec for RasterCodec {
    fn encode(&self, image: &PixelBuffer) -> DatasetResult<Vec<u8>> {
        let dynamic = to_dynamic(image)?;
        let mut out = Cursor::new(Vec::new());
        dynamic
            .write_to(&mut out, self.format.image_format())
            .map_err(|err| DatasetError::image_codec(err.to_string()))?;
        Ok(out.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> DatasetResult<PixelBuffer> {
        let dynamic = image::load_from_memory(bytes)
            .map_err(|err| DatasetError::image_codec(err.to_string()))?;

        let (width, height, layout, data) = match dynamic.color() {
            ColorType::L8 => {
                let img = dynamic.into_luma8();
                (img.width(), img.height(), PixelLayout::Gray8, img.into_raw())
            }
            ColorType::La8 => {
                let img = dynamic.into_luma_alpha8();
                (img.width(), img.height(), PixelLayout::GrayAlpha8, img.into_raw())
            }
            color if color.has_alpha() => {
                let img = dynamic.into_rgba8();
                (img.width(), img.height(), PixelLayout::Rgba8, img.into_raw())
            }
            _ => {
                let img = dynamic.into_rgb8();
                (img.width(), img.height(), PixelLayout::Rgb8, img.into_raw())
            }
        };
        PixelBuffer::new(width, height, layout, data)
            .map_err(|err| DatasetError::image_codec(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_is_lossless_and_bgr_comes_back_as_rgb() {
        let codec = RasterCodec::new(RasterFormat::Png);
        let bgr = PixelBuffer::new(2, 1, PixelLayout::Bgr8, vec![1, 2, 3, 4, 5, 6]).unwrap();

        let decoded = codec.decode(&codec.encode(&bgr).unwrap()).unwrap();
        assert_eq!(decoded.layout(), PixelLayout::Rgb8);
        assert_eq!(decoded.data(), &[3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn jpeg_keeps_dimensions() {
        let codec = RasterCodec::new(RasterFormat::Jpeg);
        let gray = PixelBuffer::new(16, 8, PixelLayout::Gray8, vec![128; 128]).unwrap();

        let decoded = codec.decode(&codec.encode(&gray).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        assert_eq!(decoded.layout(), PixelLayout::Gray8);
    }
}
