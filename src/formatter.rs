//! Input tokens of the form `<node_ref>|<value>`.
//!
//! A node reference names a parameter slot in the remote workflow, e.g.
//! `91:LoadImage.image`. Only the first `|` separates reference from value, so
//! values may contain `|` themselves.

use crate::codec;
use crate::tensor::ImageTensor;

pub const SEPARATOR: char = '|';

/// Default reference for the string input node.
pub const DEFAULT_STRING_REF: &str = "14:PrimitiveStringMultiline.value";
/// Default reference for the numeric input node.
pub const DEFAULT_NUMBER_REF: &str = "99:easy float.value";
/// Default reference for the image input node.
pub const DEFAULT_IMAGE_REF: &str = "91:LoadImage.image";

/// Join a reference and value into a token.
pub fn token(reference: &str, value: &str) -> String {
    format!("{}{}{}", reference, SEPARATOR, value)
}

/// `reference|text`.
pub fn format_string(reference: &str, text: &str) -> String {
    token(reference, text)
}

/// Value emitted for a number that cannot be formatted.
pub const FALLBACK_NUMBER: &str = "2";

/// `reference|value`, with one decimal digit when `use_float` is set, otherwise
/// truncated toward zero (`7.9` becomes `7`).
///
/// NaN and infinities are logged and replaced by [`FALLBACK_NUMBER`].
pub fn format_number(reference: &str, value: f64, use_float: bool) -> String {
    if !value.is_finite() {
        log::warn!(
            "Number formatting failed for {}: {} is not finite, using {}",
            reference,
            value,
            FALLBACK_NUMBER
        );
        return token(reference, FALLBACK_NUMBER);
    }
    let formatted = if use_float {
        format!("{:.1}", value)
    } else {
        // `{:.0}` keeps every digit of large values; `-0` is printed as `0`
        let whole = value.trunc();
        format!("{:.0}", if whole == 0.0 { 0.0 } else { whole })
    };
    token(reference, &formatted)
}

/// `reference|data:image/webp;base64,...`, or `reference|` if encoding fails.
pub fn format_image_tensor(reference: &str, image: &ImageTensor) -> String {
    match codec::encode(image) {
        Ok(uri) => token(reference, &uri),
        Err(e) => {
            log::error!("Image formatting failed for {}: {}", reference, e);
            token(reference, "")
        }
    }
}

/// Split a token into `(reference, value)` on the first separator.
///
/// Blank tokens and tokens without a separator yield `None`.
pub fn parse_token(raw: &str) -> Option<(&str, &str)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.split_once(SEPARATOR)
}
