use image::imageops::{self, FilterType};
use std::str::FromStr;

use crate::error::{BizyAirError, Result};
use crate::tensor::ImageTensor;

/// Dimensions are snapped down to multiples of this when keeping aspect ratio.
pub const SIZE_STEP: u32 = 64;

/// Resampling filter for [`resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMethod {
    #[default]
    Lanczos,
    Bilinear,
    Bicubic,
    Nearest,
}

impl ResampleMethod {
    fn filter(self) -> FilterType {
        match self {
            ResampleMethod::Lanczos => FilterType::Lanczos3,
            ResampleMethod::Bilinear => FilterType::Triangle,
            ResampleMethod::Bicubic => FilterType::CatmullRom,
            ResampleMethod::Nearest => FilterType::Nearest,
        }
    }
}

impl FromStr for ResampleMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LANCZOS" => Ok(ResampleMethod::Lanczos),
            "BILINEAR" => Ok(ResampleMethod::Bilinear),
            "BICUBIC" => Ok(ResampleMethod::Bicubic),
            "NEAREST" => Ok(ResampleMethod::Nearest),
            other => Err(format!("unknown resample method: {}", other)),
        }
    }
}

/// Output size for a `src_w x src_h` image asked to fit `width x height`.
///
/// Without aspect preservation the target is returned as-is. With it, the
/// image is fitted to the limiting side, then both sides are floored to a
/// multiple of [`SIZE_STEP`] (minimum one step).
pub fn target_size(
    src_w: u32,
    src_h: u32,
    width: u32,
    height: u32,
    maintain_aspect_ratio: bool,
) -> (u32, u32) {
    if !maintain_aspect_ratio {
        return (width, height);
    }
    let aspect = src_w as f64 / src_h as f64;
    let (w, h) = if width as f64 / height as f64 > aspect {
        ((height as f64 * aspect) as u32, height)
    } else {
        (width, (width as f64 / aspect) as u32)
    };
    let snap = |v: u32| ((v / SIZE_STEP) * SIZE_STEP).max(SIZE_STEP);
    (snap(w), snap(h))
}

/// A resized image plus a description of the size change.
#[derive(Debug, Clone)]
pub struct Resized {
    pub image: ImageTensor,
    /// `"<w0>x<h0> -> <w1>x<h1>"`
    pub size_info: String,
}

/// Resize the first frame of `image`.
pub fn resize(
    image: &ImageTensor,
    width: u32,
    height: u32,
    method: ResampleMethod,
    maintain_aspect_ratio: bool,
) -> Result<Resized> {
    if width == 0 || height == 0 {
        return Err(BizyAirError::MissingInput("non-zero target size"));
    }
    let src = image.first_frame_rgb8()?;
    let (w, h) = target_size(src.width(), src.height(), width, height, maintain_aspect_ratio);
    let out = imageops::resize(&src, w, h, method.filter());

    let size_info = format!("{}x{} -> {}x{}", src.width(), src.height(), w, h);
    log::info!("Image resized: {}", size_info);
    Ok(Resized {
        image: ImageTensor::from_rgb_image(&out),
        size_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_size_stretch() {
        assert_eq!(target_size(100, 50, 300, 301, false), (300, 301));
    }

    #[test]
    fn test_target_size_fit_width() {
        // landscape source into square box: width limits
        assert_eq!(target_size(2000, 1000, 1536, 1536, true), (1536, 768));
    }

    #[test]
    fn test_target_size_fit_height() {
        // portrait source into square box: height limits
        assert_eq!(target_size(1000, 2000, 1536, 1536, true), (768, 1536));
    }

    #[test]
    fn test_target_size_snaps_and_floors() {
        // 1000x700 into 1000x1000 -> 1000x700 -> 960x640
        assert_eq!(target_size(1000, 700, 1000, 1000, true), (960, 640));
        // tiny results never go below one step
        assert_eq!(target_size(1000, 10, 512, 512, true), (512, 64));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("lanczos".parse::<ResampleMethod>(), Ok(ResampleMethod::Lanczos));
        assert_eq!("BICUBIC".parse::<ResampleMethod>(), Ok(ResampleMethod::Bicubic));
        assert!("sinc".parse::<ResampleMethod>().is_err());
        assert_eq!(ResampleMethod::default(), ResampleMethod::Lanczos);
    }

    #[test]
    fn test_resize_tensor() {
        let src = ImageTensor::from_u8([1, 100, 200, 3], vec![200; 100 * 200 * 3]).unwrap();
        let out = resize(&src, 128, 128, ResampleMethod::Nearest, true).unwrap();
        assert_eq!(out.image.shape(), [1, 64, 128, 3]);
        assert_eq!(out.size_info, "200x100 -> 128x64");
        let v = out.image.get(0, 10, 10, 0).unwrap();
        assert!((v - 200.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_rejects_zero_target() {
        let src = ImageTensor::placeholder();
        assert!(resize(&src, 0, 64, ResampleMethod::Lanczos, false).is_err());
    }
}
