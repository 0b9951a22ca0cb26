use crate::error::MatchError;
use image::GrayImage;
use reqwest::Client;
use std::path::{Path, PathBuf};
use url::Url;

/// Where the pixels of an image come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(Url),
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// `http(s)` URLs become [`ImageSource::Url`], anything else a filesystem path.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ImageSource::Url(url),
            _ => ImageSource::Path(PathBuf::from(raw)),
        }
    }

    pub async fn load(&self, client: &Client) -> Result<GrayImage, MatchError> {
        match self {
            ImageSource::Path(path) => load_path(path).await,
            ImageSource::Url(url) => {
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(MatchError::Fetch)?;
                let bytes = response.bytes().await.map_err(MatchError::Fetch)?;
                decode(&bytes)
            }
            ImageSource::Bytes(bytes) => decode(bytes),
        }
    }
}

pub async fn load_path(path: &Path) -> Result<GrayImage, MatchError> {
    let bytes = tokio::fs::read(path).await?;
    decode(&bytes)
}

/// Decodes any supported format into 8-bit luminance.
pub fn decode(bytes: &[u8]) -> Result<GrayImage, MatchError> {
    Ok(image::load_from_memory(bytes)?.to_luma8())
}
