//! HTTP client for a Stable Diffusion WebUI compatible server
//!
//! Both diffusion collaborators live behind the same server API:
//! inpainting goes through `img2img` with a mask, image-prompt variations go
//! through `txt2img` with an always-on IP-Adapter ControlNet unit. Images
//! travel as base64-encoded PNG.

use crate::config::DiffusionConfig;
use crate::error::{PipelineError, Result};
use crate::inference::{InpaintModel, InpaintRequest, VariationModel, VariationRequest};
use crate::services::ImageIOService;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const OPTIONS_PATH: &str = "/sdapi/v1/options";
const IMG2IMG_PATH: &str = "/sdapi/v1/img2img";
const TXT2IMG_PATH: &str = "/sdapi/v1/txt2img";

/// Image-prompt adapter preprocessor as known to the ControlNet extension
pub const IP_ADAPTER_MODULE: &str = "ip-adapter_clip_sd15";
/// Image-prompt adapter weights for SD 1.5
pub const IP_ADAPTER_MODEL: &str = "ip-adapter_sd15";

/// IP-Adapter attachment settings
#[derive(Debug, Clone, PartialEq)]
pub struct IpAdapterConfig {
    pub module: String,
    pub model: String,
    /// Conditioning strength, 0.0 to 1.0
    pub scale: f32,
}

impl IpAdapterConfig {
    pub fn new(scale: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&scale) {
            return Err(PipelineError::config_value_error("adapter scale", scale, "0.0-1.0"));
        }
        Ok(Self {
            module: IP_ADAPTER_MODULE.to_string(),
            model: IP_ADAPTER_MODEL.to_string(),
            scale,
        })
    }

    /// Scale as sent to the server: the shortest decimal of the `f32`
    /// (`0.6`, not `0.6000000238418579`)
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.scale.to_string().parse().unwrap_or_else(|_| f64::from(self.scale))
    }
}

/// Client bound to one diffusion server for the lifetime of a stage
#[derive(Debug, Clone)]
pub struct DiffusionClient {
    client: Client,
    config: DiffusionConfig,
    ip_adapter: Option<IpAdapterConfig>,
}

#[derive(Debug, Serialize)]
struct Img2ImgPayload<'a> {
    init_images: Vec<String>,
    mask: String,
    prompt: &'a str,
    negative_prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    width: u32,
    height: u32,
    sampler_name: &'a str,
    denoising_strength: f32,
    inpainting_mask_invert: u8,
    inpainting_fill: u8,
    inpaint_full_res: bool,
    batch_size: u32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl DiffusionClient {
    /// Connect to the server and load the configured checkpoint
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Server unreachable or rejecting the checkpoint
    pub async fn connect(config: DiffusionConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("petaug/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::network_error("Failed to create HTTP client", e))?;

        let this = Self {
            client,
            config,
            ip_adapter: None,
        };

        this.check_server().await?;
        if let Some(checkpoint) = this.config.checkpoint.clone() {
            this.load_checkpoint(&checkpoint).await?;
        }

        tracing::info!(
            server = %this.config.base_url,
            sampler = %this.config.sampler,
            "Diffusion server ready"
        );
        Ok(this)
    }

    /// Attach an IP-Adapter unit used by every variation request
    #[must_use]
    pub fn with_ip_adapter(mut self, adapter: IpAdapterConfig) -> Self {
        tracing::info!(
            module = %adapter.module,
            model = %adapter.model,
            scale = adapter.scale,
            "IP-Adapter attached"
        );
        self.ip_adapter = Some(adapter);
        self
    }

    #[must_use]
    pub fn config(&self) -> &DiffusionConfig {
        &self.config
    }

    async fn check_server(&self) -> Result<()> {
        let url = self.config.endpoint(OPTIONS_PATH);
        let response = self.client.get(&url).send().await.map_err(|e| {
            PipelineError::network_error(format!("Diffusion server unreachable at {url}"), e)
        })?;

        if !response.status().is_success() {
            return Err(PipelineError::model(format!(
                "Diffusion server at {} answered HTTP {}",
                self.config.base_url,
                response.status()
            )));
        }
        Ok(())
    }

    async fn load_checkpoint(&self, checkpoint: &str) -> Result<()> {
        tracing::info!(checkpoint, "Loading diffusion checkpoint");
        let url = self.config.endpoint(OPTIONS_PATH);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "sd_model_checkpoint": checkpoint }))
            .send()
            .await
            .map_err(|e| PipelineError::network_error("Failed to load checkpoint", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::model(format!(
                "Checkpoint '{checkpoint}' rejected (HTTP {status}): {}",
                body.trim()
            )));
        }
        Ok(())
    }

    async fn generate<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Vec<DynamicImage>> {
        let url = self.config.endpoint(path);
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| PipelineError::network_error(format!("Request to {url} failed"), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::inference(format!(
                "Diffusion request failed (HTTP {status}): {}",
                body.trim()
            )));
        }

        let body: GenerationResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::network_error("Malformed diffusion response", e))?;

        body.images.iter().map(|encoded| decode_image(encoded)).collect()
    }
}

fn encode_image(image: &DynamicImage) -> Result<String> {
    Ok(STANDARD.encode(ImageIOService::encode_png(image)?))
}

/// Decode a base64 image, tolerating a `data:` URI prefix
fn decode_image(encoded: &str) -> Result<DynamicImage> {
    let payload = encoded.split_once(',').map_or(encoded, |(_, data)| data);
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| PipelineError::inference(format!("Invalid base64 image in response: {e}")))?;
    Ok(image::load_from_memory(&bytes)?)
}

#[async_trait]
impl InpaintModel for DiffusionClient {
    async fn inpaint(&self, request: &InpaintRequest) -> Result<DynamicImage> {
        let payload = Img2ImgPayload {
            init_images: vec![encode_image(&DynamicImage::ImageRgb8(request.image.clone()))?],
            mask: encode_image(&DynamicImage::ImageLuma8(request.mask.clone()))?,
            prompt: &request.prompt,
            negative_prompt: &request.negative_prompt,
            steps: request.steps,
            cfg_scale: request.guidance_scale,
            width: request.image.width(),
            height: request.image.height(),
            sampler_name: &self.config.sampler,
            denoising_strength: 1.0,
            inpainting_mask_invert: 0,
            inpainting_fill: 1,
            inpaint_full_res: false,
            batch_size: 1,
        };

        self.generate(IMG2IMG_PATH, &payload)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::inference("Diffusion server returned no images"))
    }
}

#[async_trait]
impl VariationModel for DiffusionClient {
    async fn generate_variations(&self, request: &VariationRequest) -> Result<Vec<DynamicImage>> {
        let adapter = self.ip_adapter.as_ref().ok_or_else(|| {
            PipelineError::invalid_config("No IP-Adapter attached to the diffusion client")
        })?;

        let conditioning =
            encode_image(&DynamicImage::ImageRgb8(request.conditioning_image.clone()))?;
        let payload = json!({
            "prompt": request.prompt,
            "negative_prompt": request.negative_prompt,
            "steps": request.steps,
            "cfg_scale": request.guidance_scale,
            "width": request.width,
            "height": request.height,
            "sampler_name": self.config.sampler,
            "batch_size": request.num_images,
            "alwayson_scripts": {
                "controlnet": {
                    "args": [{
                        "enabled": true,
                        "image": conditioning,
                        "module": adapter.module,
                        "model": adapter.model,
                        "weight": adapter.weight(),
                    }]
                }
            }
        });

        let mut images = self.generate(TXT2IMG_PATH, &payload).await?;
        // ControlNet appends its detected maps after the generated batch
        images.truncate(request.num_images as usize);
        if images.len() < request.num_images as usize {
            return Err(PipelineError::inference(format!(
                "Expected {} images, server returned {}",
                request.num_images,
                images.len()
            )));
        }
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use mockito::Matcher;

    fn png_b64(color: [u8; 3]) -> String {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb(color)));
        encode_image(&image).unwrap()
    }

    async fn connected(server: &mockito::ServerGuard, checkpoint: Option<&str>) -> DiffusionClient {
        let config = DiffusionConfig::default()
            .with_base_url(server.url())
            .with_checkpoint(checkpoint);
        DiffusionClient::connect(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_loads_checkpoint() {
        let mut server = mockito::Server::new_async().await;
        let options = server
            .mock("GET", OPTIONS_PATH)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let load = server
            .mock("POST", OPTIONS_PATH)
            .match_body(Matcher::PartialJson(json!({"sd_model_checkpoint": "sd-v1-5-inpainting"})))
            .with_status(200)
            .with_body("null")
            .expect(1)
            .create_async()
            .await;

        let client = connected(&server, Some("sd-v1-5-inpainting")).await;
        options.assert_async().await;
        load.assert_async().await;
        assert_eq!(client.config().sampler, "DPM++ 2M");
    }

    #[tokio::test]
    async fn test_connect_fails_when_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let _options = server
            .mock("GET", OPTIONS_PATH)
            .with_status(503)
            .create_async()
            .await;

        let config = DiffusionConfig::default().with_base_url(server.url());
        let result = DiffusionClient::connect(config).await;
        assert!(matches!(result, Err(PipelineError::Model(_))));
    }

    #[tokio::test]
    async fn test_inpaint_sends_mask_and_decodes_result() {
        let mut server = mockito::Server::new_async().await;
        let _options = server.mock("GET", OPTIONS_PATH).with_body("{}").create_async().await;
        let img2img = server
            .mock("POST", IMG2IMG_PATH)
            .match_body(Matcher::PartialJson(json!({
                "prompt": "a pet on a beach",
                "steps": 25,
                "sampler_name": "DPM++ 2M",
                "inpainting_mask_invert": 0,
                "width": 8,
                "height": 8
            })))
            .with_status(200)
            .with_body(json!({ "images": [png_b64([1, 2, 3])] }).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = connected(&server, None).await;
        let request = InpaintRequest {
            image: RgbImage::from_pixel(8, 8, Rgb([50, 50, 50])),
            mask: GrayImage::from_pixel(8, 8, Luma([255])),
            prompt: "a pet on a beach".to_string(),
            negative_prompt: "blurry".to_string(),
            steps: 25,
            guidance_scale: 7.5,
        };

        let output = client.inpaint(&request).await.unwrap();
        img2img.assert_async().await;
        assert_eq!(output.to_rgb8().get_pixel(0, 0), &Rgb([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_inpaint_reports_server_failure() {
        let mut server = mockito::Server::new_async().await;
        let _options = server.mock("GET", OPTIONS_PATH).with_body("{}").create_async().await;
        let _img2img = server
            .mock("POST", IMG2IMG_PATH)
            .with_status(500)
            .with_body("CUDA out of memory")
            .create_async()
            .await;

        let client = connected(&server, None).await;
        let request = InpaintRequest {
            image: RgbImage::new(4, 4),
            mask: GrayImage::new(4, 4),
            prompt: String::new(),
            negative_prompt: String::new(),
            steps: 1,
            guidance_scale: 1.0,
        };

        let err = client.inpaint(&request).await.unwrap_err();
        assert!(err.to_string().contains("CUDA out of memory"));
    }

    #[tokio::test]
    async fn test_variations_use_ip_adapter_unit() {
        let mut server = mockito::Server::new_async().await;
        let _options = server.mock("GET", OPTIONS_PATH).with_body("{}").create_async().await;
        let txt2img = server
            .mock("POST", TXT2IMG_PATH)
            .match_body(Matcher::PartialJson(json!({
                "batch_size": 2,
                "alwayson_scripts": {"controlnet": {"args": [{
                    "enabled": true,
                    "module": IP_ADAPTER_MODULE,
                    "model": IP_ADAPTER_MODEL,
                    "weight": 0.6
                }]}}
            })))
            .with_status(200)
            .with_body(
                json!({ "images": [png_b64([10, 0, 0]), png_b64([20, 0, 0]), png_b64([0, 0, 0])] })
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = connected(&server, None)
            .await
            .with_ip_adapter(IpAdapterConfig::new(0.6).unwrap());
        let request = VariationRequest {
            conditioning_image: RgbImage::new(4, 4),
            prompt: "a photo of a basset hound".to_string(),
            negative_prompt: String::new(),
            steps: 30,
            guidance_scale: 7.5,
            num_images: 2,
            width: 512,
            height: 512,
        };

        let images = client.generate_variations(&request).await.unwrap();
        txt2img.assert_async().await;
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].to_rgb8().get_pixel(0, 0), &Rgb([20, 0, 0]));
    }

    #[tokio::test]
    async fn test_variations_require_adapter() {
        let mut server = mockito::Server::new_async().await;
        let _options = server.mock("GET", OPTIONS_PATH).with_body("{}").create_async().await;

        let client = connected(&server, None).await;
        let request = VariationRequest {
            conditioning_image: RgbImage::new(4, 4),
            prompt: String::new(),
            negative_prompt: String::new(),
            steps: 1,
            guidance_scale: 1.0,
            num_images: 1,
            width: 64,
            height: 64,
        };
        assert!(matches!(
            client.generate_variations(&request).await,
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_adapter_scale_range() {
        assert!(IpAdapterConfig::new(0.0).is_ok());
        assert!(IpAdapterConfig::new(1.0).is_ok());
        assert!(IpAdapterConfig::new(1.2).is_err());
        assert!(IpAdapterConfig::new(-0.1).is_err());
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_adapter_weight_keeps_decimal() {
        assert_eq!(IpAdapterConfig::new(0.6).unwrap().weight(), 0.6);
        assert_eq!(IpAdapterConfig::new(0.35).unwrap().weight(), 0.35);
        assert_eq!(IpAdapterConfig::new(1.0).unwrap().weight(), 1.0);
    }

    #[test]
    fn test_decode_data_uri() {
        let encoded = format!("data:image/png;base64,{}", png_b64([9, 9, 9]));
        let image = decode_image(&encoded).unwrap();
        assert_eq!(image.to_rgb8().get_pixel(1, 1), &Rgb([9, 9, 9]));
        assert!(decode_image("!!!").is_err());
    }
}
