use image::RgbImage;

use crate::error::{BizyAirError, Result};

/// Side length of the black placeholder frame.
pub const PLACEHOLDER_SIZE: usize = 64;

/// Pixel storage for an [`ImageTensor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// Normalized samples, nominally in `[0, 1]`.
    F32(Vec<f32>),
    /// Raw 8-bit samples.
    U8(Vec<u8>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::U8(v) => v.len(),
        }
    }

    fn sample_u8(&self, idx: usize) -> u8 {
        match self {
            // Scale, clamp, then truncate toward zero.
            TensorData::F32(v) => (v[idx] * 255.0).clamp(0.0, 255.0) as u8,
            TensorData::U8(v) => v[idx],
        }
    }
}

/// A batch of images in channel-last layout: `[frames, height, width, channels]`.
///
/// This mirrors the tensor layout node-graph hosts pass between nodes, so a
/// decoded result can be handed back without reshaping.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    frames: usize,
    height: usize,
    width: usize,
    channels: usize,
    data: TensorData,
}

impl ImageTensor {
    /// Build a tensor, checking that `data` holds exactly `frames * height * width * channels` samples.
    pub fn new(shape: [usize; 4], data: TensorData) -> Result<Self> {
        let [frames, height, width, channels] = shape;
        let expected = frames * height * width * channels;
        if data.len() != expected {
            return Err(BizyAirError::MalformedTensor(format!(
                "shape {:?} needs {} samples, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            frames,
            height,
            width,
            channels,
            data,
        })
    }

    /// Shorthand for [`ImageTensor::new`] with float samples.
    pub fn from_f32(shape: [usize; 4], data: Vec<f32>) -> Result<Self> {
        Self::new(shape, TensorData::F32(data))
    }

    /// Shorthand for [`ImageTensor::new`] with byte samples.
    pub fn from_u8(shape: [usize; 4], data: Vec<u8>) -> Result<Self> {
        Self::new(shape, TensorData::U8(data))
    }

    /// An all-zero float tensor of the given shape.
    pub fn zeros(frames: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            frames,
            height,
            width,
            channels,
            data: TensorData::F32(vec![0.0; frames * height * width * channels]),
        }
    }

    /// The single black 64x64 RGB frame returned whenever a real image is unavailable.
    pub fn placeholder() -> Self {
        Self::zeros(1, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, 3)
    }

    /// True if this tensor is exactly the [`ImageTensor::placeholder`].
    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }

    /// Wrap a decoded RGB image as a single normalized float frame.
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let data = img.as_raw().iter().map(|&b| b as f32 / 255.0).collect();
        Self {
            frames: 1,
            height: img.height() as usize,
            width: img.width() as usize,
            channels: 3,
            data: TensorData::F32(data),
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.frames, self.height, self.width, self.channels]
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Sample at `(frame, y, x, channel)` normalized to `[0, 1]`.
    pub fn get(&self, frame: usize, y: usize, x: usize, channel: usize) -> Option<f32> {
        if frame >= self.frames || y >= self.height || x >= self.width || channel >= self.channels {
            return None;
        }
        let idx = ((frame * self.height + y) * self.width + x) * self.channels + channel;
        Some(match &self.data {
            TensorData::F32(v) => v[idx],
            TensorData::U8(v) => v[idx] as f32 / 255.0,
        })
    }

    /// Convert the first frame to an 8-bit RGB image.
    ///
    /// Grayscale input is replicated across channels and alpha is dropped.
    /// Any other channel count is rejected.
    pub fn first_frame_rgb8(&self) -> Result<RgbImage> {
        if self.frames == 0 || self.height == 0 || self.width == 0 {
            return Err(BizyAirError::MalformedTensor(format!(
                "empty tensor with shape {:?}",
                self.shape()
            )));
        }
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(BizyAirError::MalformedTensor(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        let (width, height) = (u32::try_from(self.width), u32::try_from(self.height));
        let (Ok(width), Ok(height)) = (width, height) else {
            return Err(BizyAirError::MalformedTensor(format!(
                "dimensions {}x{} exceed image limits",
                self.width, self.height
            )));
        };

        let pixels = self.height * self.width;
        let mut buf = Vec::with_capacity(pixels * 3);
        for p in 0..pixels {
            let base = p * self.channels;
            if self.channels == 1 {
                let v = self.data.sample_u8(base);
                buf.extend_from_slice(&[v, v, v]);
            } else {
                for c in 0..3 {
                    buf.push(self.data.sample_u8(base + c));
                }
            }
        }

        RgbImage::from_raw(width, height, buf).ok_or_else(|| {
            BizyAirError::MalformedTensor("pixel buffer does not match dimensions".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_shape() {
        let p = ImageTensor::placeholder();
        assert_eq!(p.shape(), [1, 64, 64, 3]);
        assert!(p.is_placeholder());
        assert_eq!(p.get(0, 63, 63, 2), Some(0.0));
        assert_eq!(p.get(0, 64, 0, 0), None);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = ImageTensor::from_f32([1, 2, 2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, BizyAirError::MalformedTensor(_)));
    }

    #[test]
    fn test_first_frame_float_truncates() {
        // 0.999 * 255 = 254.7 -> 254, 1.5 clamps to 255, -1 clamps to 0
        let t = ImageTensor::from_f32([1, 1, 1, 3], vec![0.999, 1.5, -1.0]).unwrap();
        let img = t.first_frame_rgb8().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [254, 255, 0]);
    }

    #[test]
    fn test_first_frame_only() {
        let mut data = vec![10u8; 3];
        data.extend_from_slice(&[200u8; 3]);
        let t = ImageTensor::from_u8([2, 1, 1, 3], data).unwrap();
        let img = t.first_frame_rgb8().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [10, 10, 10]);
    }

    #[test]
    fn test_grayscale_and_alpha() {
        let gray = ImageTensor::from_u8([1, 1, 1, 1], vec![42]).unwrap();
        assert_eq!(gray.first_frame_rgb8().unwrap().get_pixel(0, 0).0, [42, 42, 42]);

        let rgba = ImageTensor::from_u8([1, 1, 1, 4], vec![1, 2, 3, 4]).unwrap();
        assert_eq!(rgba.first_frame_rgb8().unwrap().get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn test_bad_channels_rejected() {
        let t = ImageTensor::from_u8([1, 1, 1, 2], vec![1, 2]).unwrap();
        assert!(t.first_frame_rgb8().is_err());
        let empty = ImageTensor::zeros(0, 4, 4, 3);
        assert!(empty.first_frame_rgb8().is_err());
    }

    #[test]
    fn test_from_rgb_image_normalizes() {
        let img = RgbImage::from_raw(1, 1, vec![0, 51, 255]).unwrap();
        let t = ImageTensor::from_rgb_image(&img);
        assert_eq!(t.shape(), [1, 1, 1, 3]);
        assert_eq!(t.get(0, 0, 0, 1), Some(0.2));
        assert_eq!(t.get(0, 0, 0, 2), Some(1.0));
    }
}
