//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;
use url::Url;

use crate::config::{ModelConfig, PipelineConfig};
use crate::constants::DEFAULT_MODEL;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "PFPREMIX_DEBUG")]
    /// Enable debug logging. Env: PFPREMIX_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "8000", env = "PFPREMIX_PORT")]
    /// http listener, defaults to `8000`.
    /// Env: PFPREMIX_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "PFPREMIX_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: PFPREMIX_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// Gemini API key. Generation is disabled without it.
    /// Env: GEMINI_API_KEY
    pub gemini_api_key: Option<String>,

    #[clap(long, default_value = DEFAULT_MODEL, env = "PFPREMIX_MODEL")]
    /// Image model name.
    /// Env: PFPREMIX_MODEL
    pub model: String,

    #[clap(long, env = "UPLOAD_ENDPOINT")]
    /// Multipart upload endpoint for finished images; when unset they're
    /// written to the output directory instead.
    /// Env: UPLOAD_ENDPOINT
    pub upload_endpoint: Option<Url>,

    #[clap(long, default_value = "./templates", env = "PFPREMIX_TEMPLATE_DIR")]
    /// Directory holding the style templates.
    /// Env: PFPREMIX_TEMPLATE_DIR
    pub template_dir: PathBuf,

    #[clap(long, default_value = "./outputs", env = "PFPREMIX_OUTPUT_DIR")]
    /// Local output directory, used when no upload endpoint is set.
    /// Env: PFPREMIX_OUTPUT_DIR
    pub output_dir: PathBuf,
}

impl CliOptions {
    /// The pipeline configuration these options describe.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(
            self.template_dir.clone(),
            self.upload_endpoint.clone(),
            self.output_dir.clone(),
        )
    }

    /// The model configuration, if a non-empty API key was given.
    pub fn model_config(&self) -> Option<ModelConfig> {
        let api_key = self.gemini_api_key.as_deref()?.trim();
        if api_key.is_empty() {
            return None;
        }
        Some(ModelConfig {
            api_key: api_key.to_string(),
            model: self.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_disables_generation() {
        let cli = CliOptions::parse_from(["pfpremix", "--gemini-api-key", "  "]);
        assert!(cli.model_config().is_none());
    }

    #[test]
    fn api_key_enables_generation() {
        let cli = CliOptions::parse_from(["pfpremix", "--gemini-api-key", "abc", "--model", "m"]);
        let model = cli.model_config().expect("model config");
        assert_eq!(model.api_key, "abc");
        assert_eq!(model.model, "m");
    }
}
