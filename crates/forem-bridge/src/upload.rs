// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image upload coordination: picker -> resize -> transport -> DOM.
//
// Every outcome is reported for the element id the request came from, so the
// page can correlate it.

use std::sync::Arc;

use forem_core::config::BridgeConfig;
use forem_core::error::{BridgeError, Result};
use forem_core::human_errors::upload_error_message;
use forem_core::types::InstanceMetadata;
use forem_image::ImageProcessor;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::codec::{ImagePickRequest, UploadEvent};
use crate::traits::{NativePlatform, NetworkTransport, UploadOutcome, UploadRequest};

/// Session details captured when the request arrived.
#[derive(Debug, Clone, Default)]
pub struct UploadContext {
    pub csrf_token: Option<String>,
    pub instance: Option<InstanceMetadata>,
}

pub struct ImageUploadCoordinator {
    platform: Arc<dyn NativePlatform>,
    transport: Arc<dyn NetworkTransport>,
    config: BridgeConfig,
}

impl ImageUploadCoordinator {
    pub fn new(
        platform: Arc<dyn NativePlatform>,
        transport: Arc<dyn NetworkTransport>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            platform,
            transport,
            config,
        }
    }

    /// Run the whole flow, reporting each step through `report`.
    ///
    /// A cancelled picker reports nothing.
    #[instrument(skip_all, fields(element = %request.element_id, channel = %request.channel))]
    pub async fn pick_and_upload<F>(
        &self,
        request: ImagePickRequest,
        context: UploadContext,
        mut report: F,
    ) where
        F: FnMut(UploadEvent) + Send,
    {
        let picked = match self.platform.pick_image(request.ratio).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("image picker cancelled");
                return;
            }
            Err(e) => {
                warn!(error = %e, "image picker failed");
                report(UploadEvent::Error {
                    message: upload_error_message(&e),
                });
                return;
            }
        };

        report(UploadEvent::Uploading);

        match self.upload(picked, request.ratio, context).await {
            Ok(link) => {
                info!(%link, "image uploaded");
                report(UploadEvent::Success { link });
            }
            Err(e) => {
                warn!(error = %e, "image upload failed");
                report(UploadEvent::Error {
                    message: upload_error_message(&e),
                });
            }
        }
    }

    async fn upload(
        &self,
        picked: Vec<u8>,
        ratio: Option<f64>,
        context: UploadContext,
    ) -> Result<String> {
        let instance = context.instance.ok_or(BridgeError::MissingSession)?;
        let csrf_token = context
            .csrf_token
            .filter(|token| !token.is_empty())
            .ok_or(BridgeError::MissingSession)?;
        let base = self.config.instance_base_url(&instance)?;
        let url = base.join(&self.config.upload_path)?;

        let side_limit = self.config.image_side_limit;
        let quality = self.config.image_jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || {
            prepare_jpeg(&picked, ratio, side_limit, quality)
        })
        .await
        .map_err(|e| BridgeError::ImageError(e.to_string()))??;

        let request = UploadRequest {
            url,
            csrf_token,
            file_name: format!("m-{}.jpeg", Uuid::new_v4()),
            jpeg,
        };
        match self.transport.upload_image(request).await? {
            // Relative links are resolved against the instance root.
            UploadOutcome::Link(link) => Ok(base.join(&link)?.to_string()),
            UploadOutcome::Rejected(message) => {
                Err(BridgeError::Upload(message.unwrap_or_default()))
            }
        }
    }
}

/// Crop (when a ratio is given), downsize and JPEG-encode a picked image.
pub fn prepare_jpeg(
    bytes: &[u8],
    ratio: Option<f64>,
    side_limit: u32,
    quality: u8,
) -> Result<Vec<u8>> {
    let mut image = ImageProcessor::from_bytes(bytes)?;
    if let Some(ratio) = ratio {
        image = image.crop_to_ratio(ratio);
    }
    image.downsize(side_limit).to_jpeg_bytes(quality)
}
