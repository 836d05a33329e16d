//! Pixel buffers and the codec seam used for image records.

use std::fmt;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{DatasetError, DatasetResult};

/// Channel layout of an 8-bit pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Gray8,
    GrayAlpha8,
    Rgb8,
    Rgba8,
    /// Blue-green-red order, as produced by OpenCV.
    Bgr8,
    Bgra8,
}

impl PixelLayout {
    pub const fn channels(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::GrayAlpha8 => 2,
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::Gray8 => 1,
            Self::GrayAlpha8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
            Self::Bgr8 => 5,
            Self::Bgra8 => 6,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Gray8),
            2 => Some(Self::GrayAlpha8),
            3 => Some(Self::Rgb8),
            4 => Some(Self::Rgba8),
            5 => Some(Self::Bgr8),
            6 => Some(Self::Bgra8),
            _ => None,
        }
    }
}

/// Row-major, tightly packed 8-bit image.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps `data`, which must hold exactly `width * height * channels` bytes.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> DatasetResult<Self> {
        let buffer = Self {
            width,
            height,
            layout,
            data,
        };
        buffer.validate()?;
        Ok(buffer)
    }

    pub fn expected_len(width: u32, height: u32, layout: PixelLayout) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(layout.channels())
    }

    pub(crate) fn validate(&self) -> DatasetResult<()> {
        let invalid = |reason: String| DatasetError::ValueType {
            expected: "image",
            reason,
        };

        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!(
                "image dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        match Self::expected_len(self.width, self.height, self.layout) {
            Some(expected) if expected == self.data.len() => Ok(()),
            Some(expected) => Err(invalid(format!(
                "{}x{} {:?} needs {expected} bytes, got {}",
                self.width,
                self.height,
                self.layout,
                self.data.len()
            ))),
            None => Err(invalid("image dimensions overflow".to_owned())),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Compresses pixel buffers to bytes and back.
pub trait ImageCodec: Send + Sync + fmt::Debug {
    fn encode(&self, image: &PixelBuffer) -> DatasetResult<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> DatasetResult<PixelBuffer>;
}

const FRAME_MAGIC: [u8; 4] = *b"PXF1";
const FRAME_HEADER_LEN: usize = FRAME_MAGIC.len() + 4 + 4 + 1;
/// Upper bound on how much one compressed LZ4 byte can expand.
const LZ4_MAX_EXPANSION: usize = 255;

/// Lossless default codec: a small header followed by an LZ4 block.
///
/// Layout: `b"PXF1"`, width (u32 LE), height (u32 LE), layout tag (u8), then
/// the pixel bytes compressed with a little-endian u32 size prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct PixelFrameCodec;

impl ImageCodec for PixelFrameCodec {
    fn encode(&self, image: &PixelBuffer) -> DatasetResult<Vec<u8>> {
        let compressed = lz4_flex::compress_prepend_size(image.data());
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + compressed.len());
        out.extend_from_slice(&FRAME_MAGIC);
        out.write_u32::<LittleEndian>(image.width())?;
        out.write_u32::<LittleEndian>(image.height())?;
        out.write_u8(image.layout().tag())?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> DatasetResult<PixelBuffer> {
        if bytes.len() < FRAME_HEADER_LEN + 4 || bytes[..FRAME_MAGIC.len()] != FRAME_MAGIC {
            return Err(DatasetError::image_codec("not a pixel frame"));
        }

        let mut header = &bytes[FRAME_MAGIC.len()..];
        let width = header.read_u32::<LittleEndian>()?;
        let height = header.read_u32::<LittleEndian>()?;
        let layout = PixelLayout::from_tag(header.read_u8()?)
            .ok_or_else(|| DatasetError::image_codec("unknown pixel layout tag"))?;
        let declared = header.read_u32::<LittleEndian>()? as usize;

        let expected = PixelBuffer::expected_len(width, height, layout)
            .ok_or_else(|| DatasetError::image_codec("frame dimensions overflow"))?;
        if declared != expected {
            return Err(DatasetError::image_codec(format!(
                "frame declares {declared} pixel bytes, dimensions need {expected}"
            )));
        }

        let compressed_len = bytes.len() - FRAME_HEADER_LEN - 4;
        if declared > compressed_len.saturating_mul(LZ4_MAX_EXPANSION) {
            return Err(DatasetError::image_codec(format!(
                "frame declares {declared} pixel bytes from {compressed_len} compressed bytes"
            )));
        }

        let data = lz4_flex::decompress_size_prepended(&bytes[FRAME_HEADER_LEN..])
            .map_err(|err| DatasetError::image_codec(err.to_string()))?;
        PixelBuffer::new(width, height, layout, data)
            .map_err(|err| DatasetError::image_codec(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, layout: PixelLayout) -> PixelBuffer {
        let len = PixelBuffer::expected_len(width, height, layout).unwrap();
        let data = (0..len).map(|i| (i % 251) as u8).collect();
        PixelBuffer::new(width, height, layout, data).unwrap()
    }

    #[test]
    fn buffer_length_must_match_dimensions() {
        assert!(PixelBuffer::new(2, 2, PixelLayout::Rgb8, vec![0; 12]).is_ok());
        for (w, h, len) in [(2, 2, 11), (0, 2, 0), (2, 0, 0)] {
            match PixelBuffer::new(w, h, PixelLayout::Rgb8, vec![0; len]) {
                Err(DatasetError::ValueType { expected, .. }) => assert_eq!(expected, "image"),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn frame_codec_is_lossless_for_every_layout() {
        let codec = PixelFrameCodec;
        for layout in [
            PixelLayout::Gray8,
            PixelLayout::GrayAlpha8,
            PixelLayout::Rgb8,
            PixelLayout::Rgba8,
            PixelLayout::Bgr8,
            PixelLayout::Bgra8,
        ] {
            let image = gradient(17, 9, layout);
            let encoded = codec.encode(&image).unwrap();
            assert_eq!(&encoded[..4], b"PXF1");
            assert_eq!(codec.decode(&encoded).unwrap(), image);
        }
    }

    #[test]
    fn frame_codec_rejects_foreign_and_inconsistent_frames() {
        let codec = PixelFrameCodec;
        assert!(matches!(
            codec.decode(b"\x89PNG\r\n\x1a\n0000000"),
            Err(DatasetError::ImageCodec { .. })
        ));

        let mut encoded = codec.encode(&gradient(4, 4, PixelLayout::Gray8)).unwrap();
        // Claim a wider image than the compressed payload holds.
        encoded[4] = 8;
        assert!(matches!(
            codec.decode(&encoded),
            Err(DatasetError::ImageCodec { .. })
        ));
    }

    #[test]
    fn frame_codec_rejects_sizes_the_payload_cannot_hold() {
        // 16384x16384 RGBA claims 1 GiB of pixels from a few bytes.
        let (width, height) = (16384u32, 16384u32);
        let declared = width * height * 4;
        let mut frame = FRAME_MAGIC.to_vec();
        frame.write_u32::<LittleEndian>(width).unwrap();
        frame.write_u32::<LittleEndian>(height).unwrap();
        frame.write_u8(PixelLayout::Rgba8.tag()).unwrap();
        frame.write_u32::<LittleEndian>(declared).unwrap();
        frame.extend_from_slice(&[0x1f, 0x00, 0x00, 0x00]);

        match PixelFrameCodec.decode(&frame) {
            Err(DatasetError::ImageCodec { reason }) => {
                assert!(reason.contains("compressed bytes"), "{reason}")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
