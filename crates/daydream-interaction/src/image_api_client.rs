//! Image generation client (`POST /generate-image`).

use crate::http::{build_client, error_from_response, map_reqwest_error};
use daydream_core::image::normalize_image_url;
use daydream_core::{ClientConfig, DaydreamError, ImageRef, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GenerateImageRequest<'a> {
    prompt: &'a str,
    identity_image_url: Option<&'a str>,
    user_id: &'a str,
}

/// The backend has shipped several field names for the result URL.
#[derive(Debug, Default, Deserialize)]
struct GenerateImageResponse {
    image_url: Option<String>,
    #[serde(rename = "imageUrl")]
    image_url_camel: Option<String>,
    secure_url: Option<String>,
    url: Option<String>,
    error: Option<String>,
}

impl GenerateImageResponse {
    fn raw_url(self) -> Option<String> {
        self.image_url
            .or(self.image_url_camel)
            .or(self.secure_url)
            .or(self.url)
    }
}

#[derive(Debug, Clone)]
pub struct ImageApiClient {
    client: Client,
    url: String,
    origin: String,
    timeout: Duration,
}

impl ImageApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    /// Uses an existing client; endpoint and timeout come from `config`.
    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            url: config.generate_image_url(),
            origin: config.origin().to_string(),
            timeout: config.request_timeout(),
        }
    }

    /// Generates an image for `prompt`.
    ///
    /// `identity_image` is the user's reference photo, if one was attached.
    /// The returned reference is always an absolute `https` URL.
    pub async fn generate(
        &self,
        user_id: &str,
        prompt: &str,
        identity_image: Option<&ImageRef>,
    ) -> Result<ImageRef> {
        let request = GenerateImageRequest {
            prompt,
            identity_image_url: identity_image.map(ImageRef::as_str),
            user_id,
        };

        tracing::info!("[ImageApiClient] Generating image for {}", user_id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: GenerateImageResponse = response.json().await.map_err(map_reqwest_error)?;
        if let Some(error) = body.error {
            return Err(DaydreamError::backend(error));
        }

        body.raw_url()
            .and_then(|raw| normalize_image_url(&raw, &self.origin))
            .ok_or_else(|| DaydreamError::protocol("No valid image URL returned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_field_precedence() {
        let body: GenerateImageResponse =
            serde_json::from_str(r#"{"url":"c","imageUrl":"b","secure_url":"x"}"#).unwrap();
        assert_eq!(body.raw_url().as_deref(), Some("b"));

        let body: GenerateImageResponse = serde_json::from_str(r#"{"secure_url":"s"}"#).unwrap();
        assert_eq!(body.raw_url().as_deref(), Some("s"));
    }
}
