// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A simple interleaved pixmap type.

/// A flat, row-major buffer of interleaved `u8` channel data.
///
/// `Pixmap` is the interchange format at the engine's edges: drawables are
/// imported from and exported to pixmaps, and the optional `png` feature
/// adds PNG loading and saving. Unlike tile-backed storage, a pixmap is one
/// contiguous allocation with a row stride of `width * bpp` bytes.
#[derive(Debug, Clone)]
pub struct Pixmap {
    width: u32,
    height: u32,
    bpp: usize,
    buf: Vec<u8>,
}

impl Pixmap {
    /// Create a pixmap with the given size, initialized to zero.
    ///
    /// # Panics
    ///
    /// Panics if `bpp` is zero.
    pub fn new(width: u32, height: u32, bpp: usize) -> Self {
        assert!(bpp > 0, "pixmap must have a non-zero pixel size");
        Self {
            width,
            height,
            bpp,
            buf: vec![0; width as usize * height as usize * bpp],
        }
    }

    /// Create a pixmap from existing channel data.
    ///
    /// The pixels are in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not of length `width * height * bpp` exactly, or
    /// if `bpp` is zero.
    pub fn from_parts(data: Vec<u8>, width: u32, height: u32, bpp: usize) -> Self {
        assert!(bpp > 0, "pixmap must have a non-zero pixel size");
        assert_eq!(
            data.len(),
            width as usize * height as usize * bpp,
            "expected `data` to have length of exactly `width * height * bpp`"
        );
        Self {
            width,
            height,
            bpp,
            buf: data,
        }
    }

    /// The width of the pixmap in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The height of the pixmap in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(&self) -> usize {
        self.bpp
    }

    /// The underlying channel data, row-major.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable access to the underlying channel data, row-major.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// The bytes of row `y`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.bpp;
        &self.buf[y as usize * stride..(y as usize + 1) * stride]
    }

    /// Mutable access to the bytes of row `y`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * self.bpp;
        &mut self.buf[y as usize * stride..(y as usize + 1) * stride]
    }

    /// The bytes of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let base = (y as usize * self.width as usize + x as usize) * self.bpp;
        &self.buf[base..base + self.bpp]
    }

    /// Create a pixmap from a PNG file.
    ///
    /// Indexed and sub-byte images are expanded and 16-bit channels are
    /// stripped, so the resulting `bpp` is the natural channel count of the
    /// image: 1 (gray), 2 (gray+alpha), 3 (RGB), or 4 (RGBA).
    #[cfg(feature = "png")]
    pub fn from_png(data: impl std::io::Read) -> Result<Self, png::DecodingError> {
        let mut decoder = png::Decoder::new(data);
        decoder.set_transformations(png::Transformations::normalize_to_color8());

        let mut reader = decoder.read_info()?;
        // Note `reader.info()` returns the pre-transformation color type,
        // whereas `reader.output_color_type()` takes the transformations
        // into account.
        let (color_type, bit_depth) = reader.output_color_type();
        debug_assert_eq!(
            bit_depth,
            png::BitDepth::Eight,
            "normalize_to_color8 means the bit depth is always 8."
        );
        let bpp = match color_type {
            png::ColorType::Grayscale => 1,
            png::ColorType::GrayscaleAlpha => 2,
            png::ColorType::Rgb => 3,
            png::ColorType::Rgba => 4,
            png::ColorType::Indexed => {
                unreachable!("transformation should have expanded indexed images")
            }
        };

        let info = reader.info();
        let mut pixmap = Self::new(info.width, info.height, bpp);
        debug_assert_eq!(
            pixmap.buf.len(),
            reader.output_buffer_size(),
            "the pixmap buffer should have the same number of bytes as the image"
        );
        reader.next_frame(&mut pixmap.buf)?;
        Ok(pixmap)
    }

    /// Write the pixmap's content as a PNG.
    ///
    /// # Panics
    ///
    /// Panics if `bpp` is not 1, 2, 3, or 4, the channel counts PNG can
    /// represent.
    #[cfg(feature = "png")]
    pub fn write_png(&self, out: impl std::io::Write) -> Result<(), png::EncodingError> {
        let color = match self.bpp {
            1 => png::ColorType::Grayscale,
            2 => png::ColorType::GrayscaleAlpha,
            3 => png::ColorType::Rgb,
            4 => png::ColorType::Rgba,
            other => panic!("no PNG color type for {other} bytes per pixel"),
        };
        let mut encoder = png::Encoder::new(out, self.width, self.height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.buf)?;
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_and_pixels_index_consistently() {
        let mut p = Pixmap::new(4, 3, 2);
        p.row_mut(1).copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(p.pixel(0, 1), &[1, 2]);
        assert_eq!(p.pixel(3, 1), &[7, 8]);
        assert_eq!(p.row(0), &[0; 8]);
    }

    #[test]
    #[should_panic(expected = "width * height * bpp")]
    fn from_parts_rejects_short_buffers() {
        let _ = Pixmap::from_parts(vec![0; 5], 2, 2, 3);
    }

    #[cfg(feature = "png")]
    #[test]
    fn png_round_trip() {
        let mut p = Pixmap::new(5, 4, 3);
        for (i, byte) in p.data_mut().iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        let mut encoded = Vec::new();
        p.write_png(&mut encoded).unwrap();
        let decoded = Pixmap::from_png(encoded.as_slice()).unwrap();
        assert_eq!(decoded.width(), 5);
        assert_eq!(decoded.height(), 4);
        assert_eq!(decoded.bpp(), 3);
        assert_eq!(decoded.data(), p.data());
    }
}
