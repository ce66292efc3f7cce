//! Conversions between [`ImageTensor`] and the transport formats BizyAir uses:
//! base64 WebP data URIs on the way in, downloadable object URLs on the way out.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;
use reqwest::Client;
use std::time::Duration;

use crate::error::{BizyAirError, Result};
use crate::tensor::ImageTensor;

/// MIME subtype used for encoded uploads.
pub const UPLOAD_FORMAT: &str = "webp";

/// Encode the first frame of `tensor` as a lossless WebP data URI.
///
/// Float samples are scaled by 255 and truncated; byte samples pass through.
/// A tensor that cannot be read as an RGB image is returned as an error
/// rather than encoded as something else.
pub fn encode(tensor: &ImageTensor) -> Result<String> {
    let img = tensor.first_frame_rgb8()?;
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf).encode(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(format!(
        "data:image/{};base64,{}",
        UPLOAD_FORMAT,
        BASE64.encode(&buf)
    ))
}

/// Decode any supported image file format into a single-frame RGB tensor.
pub fn decode_bytes(bytes: &[u8]) -> Result<ImageTensor> {
    let img = image::load_from_memory(bytes)?.to_rgb8();
    Ok(ImageTensor::from_rgb_image(&img))
}

/// Decode a `data:image/<fmt>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str) -> Result<ImageTensor> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| BizyAirError::InvalidDataUri("missing data: prefix".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| BizyAirError::InvalidDataUri("missing payload separator".into()))?;
    if !header.starts_with("image/") || !header.ends_with(";base64") {
        return Err(BizyAirError::InvalidDataUri(format!(
            "unsupported header {:?}",
            header
        )));
    }
    let bytes = BASE64.decode(payload.trim())?;
    decode_bytes(&bytes)
}

/// GET `url` and return the body, failing on transport errors and non-2xx statuses.
pub async fn download(http: &Client, url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let resp = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| BizyAirError::Network {
            context: format!("Failed to download image {}", url),
            source: e,
        })?;

    if !resp.status().is_success() {
        return Err(BizyAirError::Http {
            status: resp.status().as_u16(),
            body: format!("Failed to download image {}", url),
        });
    }

    let bytes = resp.bytes().await.map_err(|e| BizyAirError::Network {
        context: "Failed to read image bytes".into(),
        source: e,
    })?;
    Ok(bytes.to_vec())
}

/// Download `url` and decode it into a single-frame normalized RGB tensor.
pub async fn decode_url(http: &Client, url: &str, timeout: Duration) -> Result<ImageTensor> {
    let bytes = download(http, url, timeout).await?;
    let tensor = decode_bytes(&bytes)?;
    let [_, h, w, _] = tensor.shape();
    log::info!("Loaded image {} ({}x{})", url, w, h);
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(h: usize, w: usize) -> ImageTensor {
        let mut data = Vec::with_capacity(h * w * 3);
        for y in 0..h {
            for x in 0..w {
                data.push(((x * 17) % 256) as u8);
                data.push(((y * 31) % 256) as u8);
                data.push(((x + y) * 7 % 256) as u8);
            }
        }
        ImageTensor::from_u8([1, h, w, 3], data).unwrap()
    }

    #[test]
    fn test_encode_prefix() {
        let uri = encode(&gradient(4, 4)).unwrap();
        assert!(uri.starts_with("data:image/webp;base64,"));
    }

    #[test]
    fn test_round_trip_bytes() {
        let original = gradient(8, 5);
        let decoded = decode_data_uri(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded.shape(), [1, 8, 5, 3]);
        assert_eq!(
            decoded.first_frame_rgb8().unwrap(),
            original.first_frame_rgb8().unwrap()
        );
    }

    #[test]
    fn test_round_trip_float_grid() {
        let data: Vec<f32> = (0..2 * 3 * 3).map(|i| (i * 13 % 256) as f32 / 255.0).collect();
        let original = ImageTensor::from_f32([1, 2, 3, 3], data).unwrap();
        let decoded = decode_data_uri(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded.shape(), original.shape());
        for y in 0..2 {
            for x in 0..3 {
                for c in 0..3 {
                    let a = original.get(0, y, x, c).unwrap();
                    let b = decoded.get(0, y, x, c).unwrap();
                    // float -> u8 truncation may lose at most one step
                    assert!((a - b).abs() <= 1.0 / 255.0 + 1e-6, "{} vs {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_encode_uses_first_frame() {
        let mut data = vec![0u8; 2 * 2 * 3];
        data.extend(vec![255u8; 2 * 2 * 3]);
        let two = ImageTensor::from_u8([2, 2, 2, 3], data).unwrap();
        let decoded = decode_data_uri(&encode(&two).unwrap()).unwrap();
        assert_eq!(decoded.shape(), [1, 2, 2, 3]);
        assert_eq!(decoded.get(0, 1, 1, 0), Some(0.0));
    }

    #[test]
    fn test_encode_malformed_fails() {
        let t = ImageTensor::zeros(1, 0, 0, 3);
        assert!(matches!(encode(&t), Err(BizyAirError::MalformedTensor(_))));
    }

    #[test]
    fn test_decode_data_uri_rejects_garbage() {
        assert!(matches!(
            decode_data_uri("http://x/y.png"),
            Err(BizyAirError::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:text/plain;base64,AAAA"),
            Err(BizyAirError::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,!!!"),
            Err(BizyAirError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_bytes_not_an_image() {
        assert!(matches!(
            decode_bytes(b"definitely not an image"),
            Err(BizyAirError::Image(_))
        ));
    }
}
