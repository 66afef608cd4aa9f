use super::*;
use image::{ImageReader, ImageResult};
use std::io::Cursor;

/// Probes images by downloading and decoding them
pub struct HttpImageProber {
    client: reqwest::Client,
}

impl HttpImageProber {
    pub fn new(timeout: Duration) -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn check(&self, url: &str) -> Result<DecodedImage, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }

        // A declared non-image type is final; a missing header falls through to decoding
        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.starts_with("image/") {
                return Err(format!("content type {}", content_type));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;

        tokio::task::spawn_blocking(move || decode_image(&bytes))
            .await
            .map_err(|e| format!("decoder task failed: {}", e))?
            .map_err(|e| format!("undecodable image: {}", e))
    }
}

#[async_trait]
impl ImageProber for HttpImageProber {
    async fn probe(&self, url: &str, cancel: CancellationToken) -> ProbeOutcome {
        if url.trim().is_empty() {
            return ProbeOutcome::Broken;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => ProbeOutcome::Cancelled,
            result = self.check(url) => match result {
                Ok(decoded) => {
                    tracing::trace!(
                        url,
                        format = ?decoded.format,
                        width = decoded.width,
                        height = decoded.height,
                        "Image probe succeeded"
                    );
                    ProbeOutcome::Loadable
                }
                Err(reason) => {
                    tracing::debug!(url, reason = %reason, "Image probe failed");
                    ProbeOutcome::Broken
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecodedImage {
    format: Option<image::ImageFormat>,
    width: u32,
    height: u32,
}

/// Fully decode an image payload. Blocking; header-only checks accept
/// truncated bodies, so the pixel data is decoded too.
fn decode_image(bytes: &[u8]) -> ImageResult<DecodedImage> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let decoded = reader.decode()?;

    Ok(DecodedImage {
        format,
        width: decoded.width(),
        height: decoded.height(),
    })
}
