//! Publishing finished images.

use std::path::PathBuf;

use image::DynamicImage;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::codec::encode_png;
use crate::constants::{OUTPUTS_ROUTE, UPLOAD_TIMEOUT};
use crate::error::PublishError;

/// Where finished images end up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublishTarget {
    /// Multipart POST to this endpoint, which answers with `{"url": ...}`
    Upload(Url),
    /// Written into this directory and served under `/outputs`
    Local(PathBuf),
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    url: String,
}

/// Persists artifacts and hands back a reference to them.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: reqwest::Client,
    target: PublishTarget,
}

impl Publisher {
    /// Builds a publisher for `target`.
    pub fn new(target: PublishTarget) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self { client, target })
    }

    /// The configured target.
    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    /// Encodes `image` as `<generation_id>.png` and stores it, returning its URL
    /// or local path.
    #[instrument(level = "debug", skip(self, image))]
    pub async fn publish(
        &self,
        image: &DynamicImage,
        generation_id: &str,
    ) -> Result<String, PublishError> {
        let png = encode_png(image).map_err(PublishError::Encode)?;
        let file_name = format!("{generation_id}.png");
        match &self.target {
            PublishTarget::Upload(endpoint) => self.upload(endpoint, file_name, png).await,
            PublishTarget::Local(dir) => write_local(dir, &file_name, &png).await,
        }
    }

    async fn upload(
        &self,
        endpoint: &Url,
        file_name: String,
        png: Vec<u8>,
    ) -> Result<String, PublishError> {
        let size = png.len();
        let part = Part::bytes(png)
            .file_name(file_name.clone())
            .mime_str("image/png")?;
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(endpoint.clone())
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Rejected { status, body });
        }
        let uploaded: UploadResponse = resp.json().await?;
        info!("Uploaded {} ({} bytes) to {}", file_name, size, uploaded.url);
        Ok(uploaded.url)
    }
}

async fn write_local(
    dir: &std::path::Path,
    file_name: &str,
    png: &[u8],
) -> Result<String, PublishError> {
    let path = dir.join(file_name);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| PublishError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, png)
        .await
        .map_err(|source| PublishError::Write {
            path: path.clone(),
            source,
        })?;
    debug!("Wrote {}", path.display());
    Ok(format!("{OUTPUTS_ROUTE}/{file_name}"))
}
