use std::path::Path;

use image::{ColorType, DynamicImage};

use super::dataset::Sample;
use super::error::DataLoaderError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    U8,
    U16,
    F32,
}

impl SourceFormat {
    pub fn bytes_per_element(&self) -> usize {
        match self {
            SourceFormat::U8 => 1,
            SourceFormat::U16 => 2,
            SourceFormat::F32 => 4,
        }
    }

    fn of(color_type: ColorType) -> Option<Self> {
        match color_type {
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => Some(SourceFormat::U8),
            ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => Some(SourceFormat::U16),
            ColorType::Rgb32F | ColorType::Rgba32F => Some(SourceFormat::F32),
            _ => None,
        }
    }
}

/// Decoded pixels of one image, interleaved channels, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub format: SourceFormat,
    pub pixels: Box<[u8]>,
}

impl ImageData {
    pub fn open(path: &Path) -> Result<Self, DataLoaderError> {
        Ok(Self::from_dynamic(image::open(path)?))
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        // Colour types without a matching SourceFormat are widened to RGBA8
        let img = match SourceFormat::of(img.color()) {
            Some(_) => img,
            None => DynamicImage::ImageRgba8(img.to_rgba8()),
        };
        let color = img.color();
        ImageData {
            width: img.width(),
            height: img.height(),
            channels: color.channel_count(),
            format: SourceFormat::of(color).unwrap_or(SourceFormat::U8),
            pixels: img.as_bytes().to_vec().into_boxed_slice(),
        }
    }

    pub fn bytes_per_image(&self) -> usize {
        self.pixels.len()
    }

    /// `(width, height, channels, format)`, the part two images must share to be batched together.
    pub fn shape(&self) -> ImageShape {
        ImageShape {
            width: self.width,
            height: self.height,
            channels: self.channels,
            format: self.format,
        }
    }

    pub fn to_f32(&self) -> Vec<f32> {
        pixels_to_f32(&self.pixels, self.format)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageShape {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub format: SourceFormat,
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}x{} {:?}",
            self.width, self.height, self.channels, self.format
        )
    }
}

/// Images of one batch packed into a single contiguous buffer.
pub struct ImageBatch<L> {
    pub data: Box<[u8]>,
    pub samples_in_batch: usize,
    pub bytes_per_sample: usize,
    pub shape: ImageShape,
    pub labels: Vec<L>,
    pub batch_number: usize,
}

impl<L> ImageBatch<L> {
    /// Packs `samples` in order. All images must have the same shape.
    pub fn collate(
        batch_number: usize,
        samples: Vec<Sample<ImageData, L>>,
    ) -> Result<Self, DataLoaderError> {
        let shape = match samples.first() {
            Some(first) => first.features.shape(),
            None => return Err(DataLoaderError::EmptyBatch { batch_number }),
        };
        let bytes_per_sample = samples[0].features.bytes_per_image();

        let mut data = Vec::with_capacity(bytes_per_sample * samples.len());
        let mut labels = Vec::with_capacity(samples.len());
        for sample in samples {
            let found = sample.features.shape();
            if found != shape {
                return Err(DataLoaderError::ShapeMismatch {
                    what: format!("batch {batch_number}"),
                    expected: shape.to_string(),
                    found: found.to_string(),
                });
            }
            data.extend_from_slice(&sample.features.pixels);
            labels.push(sample.label);
        }

        Ok(ImageBatch {
            data: data.into_boxed_slice(),
            samples_in_batch: labels.len(),
            bytes_per_sample,
            shape,
            labels,
            batch_number,
        })
    }

    pub fn to_f32(&self) -> Vec<f32> {
        pixels_to_f32(&self.data, self.shape.format)
    }
}

fn pixels_to_f32(data: &[u8], format: SourceFormat) -> Vec<f32> {
    match format {
        SourceFormat::U8 => data.iter().map(|&x| x as f32).collect(),
        SourceFormat::U16 => data
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]) as f32)
            .collect(),
        SourceFormat::F32 => data
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gray(w: u32, h: u32, v: u8) -> ImageData {
        ImageData::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([v]))))
    }

    #[test]
    fn decodes_shape_and_format() {
        let img = ImageData::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            3,
            2,
            Rgb([1, 2, 3]),
        )));
        assert_eq!(img.channels, 3);
        assert_eq!(img.format, SourceFormat::U8);
        assert_eq!(img.bytes_per_image(), 18);
        assert_eq!(&img.to_f32()[..3], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn collate_packs_in_order() {
        let samples = vec![Sample::new(gray(2, 2, 7), 'a'), Sample::new(gray(2, 2, 9), 'b')];
        let batch = ImageBatch::collate(4, samples).unwrap();
        assert_eq!(batch.samples_in_batch, 2);
        assert_eq!(batch.bytes_per_sample, 4);
        assert_eq!(batch.labels, vec!['a', 'b']);
        assert_eq!(&batch.data[..], &[7, 7, 7, 7, 9, 9, 9, 9]);
        assert_eq!(batch.to_f32().len(), 8);
    }

    #[test]
    fn collate_rejects_mixed_shapes() {
        let samples = vec![Sample::new(gray(2, 2, 0), 0), Sample::new(gray(3, 2, 0), 1)];
        assert!(matches!(
            ImageBatch::collate(0, samples),
            Err(DataLoaderError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn collating_nothing_is_a_fetch_error() {
        let err = match ImageBatch::<u8>::collate(3, Vec::new()) {
            Err(err) => err,
            Ok(_) => panic!("empty batch collated"),
        };
        assert!(matches!(err, DataLoaderError::EmptyBatch { batch_number: 3 }));
        assert_eq!(err.kind(), crate::dataloader::error::ErrorKind::Fetch);
    }
}
