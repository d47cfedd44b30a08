use super::*;

//
// Image
//

// Linear-space render target. Pixels are row-major, row 0 at the top.

pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<ColorRgb>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "image must be non-empty");
        Self {
            width,
            height,
            pixels: vec![ColorRgb::BLACK; (width * height) as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixel(&self, row: u32, col: u32) -> ColorRgb {
        self.pixels[(row * self.width + col) as usize]
    }

    #[inline]
    pub fn set_pixel(&mut self, row: u32, col: u32, pixel: ColorRgb) {
        self.pixels[(row * self.width + col) as usize] = pixel;
    }

    pub fn pixels(&self) -> &[ColorRgb] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [ColorRgb] {
        &mut self.pixels
    }

    pub fn for_each_pixel_mut(&mut self, f: impl Fn(ColorRgb) -> ColorRgb) {
        for pixel in &mut self.pixels {
            *pixel = f(*pixel);
        }
    }

    // Quantizes to 8-bit sRGB and encodes based on the filename extension.
    // JPEG is written at quality 95; PNG, BMP and TGA use their defaults.
    pub fn save(&self, path: &Path) -> Result<()> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                anyhow!(
                    "image filename {} has no extension, don't know how to save it",
                    path.display()
                )
            })?;

        let mut bytes = Vec::with_capacity((self.width * self.height * 3) as usize);
        for pixel in &self.pixels {
            let clamped = pixel.clamped(0.0, 1.0) * 255.0;
            bytes.push(clamped.red() as u8);
            bytes.push(clamped.green() as u8);
            bytes.push(clamped.blue() as u8);
        }
        let buffer = imagelib::RgbImage::from_raw(self.width, self.height, bytes)
            .expect("pixel buffer size mismatch");

        match ext.as_str() {
            "png" => buffer
                .save_with_format(path, imagelib::ImageFormat::Png)
                .with_context(|| format!("writing {}", path.display()))?,
            "jpg" | "jpeg" => {
                let file = File::create(path)
                    .with_context(|| format!("creating {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                imagelib::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, 95)
                    .encode_image(&buffer)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            "bmp" => buffer
                .save_with_format(path, imagelib::ImageFormat::Bmp)
                .with_context(|| format!("writing {}", path.display()))?,
            "tga" => buffer
                .save_with_format(path, imagelib::ImageFormat::Tga)
                .with_context(|| format!("writing {}", path.display()))?,
            _ => bail!("saving images as '{ext}' is not supported"),
        }
        Ok(())
    }
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_addressing() {
        let mut image = Image::new(4, 2);
        image.set_pixel(1, 3, ColorRgb::WHITE);
        assert_eq!(image.pixel(1, 3), ColorRgb::WHITE);
        assert_eq!(image.pixel(0, 3), ColorRgb::BLACK);
        assert_eq!(image.pixels().len(), 8);
    }

    #[test]
    fn test_unsupported_extension() {
        let image = Image::new(2, 2);
        assert!(image.save(Path::new("out.webp")).is_err());
        assert!(image.save(Path::new("out")).is_err());
    }

    #[test]
    fn test_png_roundtrip() {
        let mut image = Image::new(3, 3);
        for row in 0..3 {
            for col in 0..3 {
                let v = (row * 3 + col) as f32 / 8.0;
                image.set_pixel(row, col, ColorRgb::new(v, 1.0 - v, 0.5));
            }
        }
        let path = std::env::temp_dir().join("raylume_roundtrip_test.png");
        image.save(&path).unwrap();

        let loaded = imagelib::open(&path).unwrap().to_rgb8();
        for row in 0..3 {
            for col in 0..3 {
                let expected = image.pixel(row, col).clamped(0.0, 1.0) * 255.0;
                let actual = loaded.get_pixel(col, row);
                // Equal up to 8-bit quantization.
                assert!((f32::from(actual[0]) - expected.red()).abs() <= 1.0);
                assert!((f32::from(actual[1]) - expected.green()).abs() <= 1.0);
                assert!((f32::from(actual[2]) - expected.blue()).abs() <= 1.0);
            }
        }
        std::fs::remove_file(&path).unwrap();
    }
}
