//! `MsgPack` frames for shipping widget state to a renderer process.
//!
//! Frames use named fields (`rmp_serde::to_vec_named()`), so a frame decodes
//! into the same camelCase shape as the JSON form.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes `value` as a named-field `MsgPack` frame.
///
/// # Errors
///
/// Returns the encoder error when `value` cannot be serialized.
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(value)
}

/// Decodes a frame produced by [`encode_frame`].
///
/// # Errors
///
/// Returns the decoder error when `bytes` is not a valid frame for `T`.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}
