//! # Codec Collaborator Module
//!
//! Contratto verso il codec esterno: decode dei byte in un handle e
//! una singola passata di re-encoding lossy a una qualità data.
//!
//! ## Responsabilità:
//! - Definisce il trait `ImageCodec` consumato dallo scheduler
//! - Fornisce `JpegCodec`, implementazione in-memory basata sul crate `image`
//!
//! Il codec è considerato deterministico per una coppia (byte, qualità) e
//! potenzialmente costoso: il lavoro CPU gira su `spawn_blocking` così il
//! loop cooperativo resta reattivo.

use crate::error::DecayError;
use crate::settings::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use std::future::Future;
use std::sync::Arc;

/// Encoded image bytes, shared between items and snapshots.
pub type ImageBytes = Arc<[u8]>;

/// Black-box re-encoder used by the item state machine.
///
/// Each pass feeds the previous pass's output back in, so artifacts compound.
pub trait ImageCodec: Send + Sync {
    /// Decoded image handle passed to `encode_pass`.
    type Handle: Send + Sync;

    /// Decode encoded bytes. Fails with `DecayError::Decode` on malformed input.
    fn decode(
        &self,
        bytes: ImageBytes,
    ) -> impl Future<Output = Result<Self::Handle, DecayError>> + Send;

    /// Run one lossy encode of `image` at `quality`.
    /// Fails with `DecayError::Encode` if the handle cannot be encoded.
    fn encode_pass(
        &self,
        image: &Self::Handle,
        quality: Quality,
    ) -> impl Future<Output = Result<ImageBytes, DecayError>> + Send;
}

/// JPEG re-encoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl JpegCodec {
    pub fn new() -> Self {
        Self
    }

    fn encode_blocking(image: &RgbImage, quality: Quality) -> Result<Vec<u8>, DecayError> {
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.percent());
        encoder
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .map_err(|e| DecayError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}

impl ImageCodec for JpegCodec {
    type Handle = Arc<RgbImage>;

    fn decode(
        &self,
        bytes: ImageBytes,
    ) -> impl Future<Output = Result<Self::Handle, DecayError>> + Send {
        async move {
            let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                .await
                .map_err(|e| DecayError::Decode(format!("decode task failed: {}", e)))?
                .map_err(|e| DecayError::Decode(e.to_string()))?;
            Ok(Arc::new(decoded.to_rgb8()))
        }
    }

    fn encode_pass(
        &self,
        image: &Self::Handle,
        quality: Quality,
    ) -> impl Future<Output = Result<ImageBytes, DecayError>> + Send {
        let image = Arc::clone(image);
        async move {
            if image.width() == 0 || image.height() == 0 {
                return Err(DecayError::Encode("image has no pixels".to_string()));
            }
            let encoded = tokio::task::spawn_blocking(move || Self::encode_blocking(&image, quality))
                .await
                .map_err(|e| DecayError::Encode(format!("encode task failed: {}", e)))??;
            Ok(ImageBytes::from(encoded))
        }
    }
}
