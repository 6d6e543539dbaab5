//! Config handling

use std::path::PathBuf;

use tracing::log::LevelFilter;
use url::Url;

use crate::pipeline::fetch::RetryPolicy;
use crate::pipeline::publish::PublishTarget;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Everything a [`crate::pipeline::Pipeline`] needs, resolved once at startup.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Directory holding `templateBase.jpg` and `template2.jpg`..`template5.jpg`
    pub template_dir: PathBuf,
    /// Where finished images go
    pub publish_target: PublishTarget,
    /// Retry behaviour for avatar downloads
    pub retry_policy: RetryPolicy,
}

impl PipelineConfig {
    /// Builds a config that uploads to `upload_endpoint` when given, and
    /// otherwise writes into `output_dir`.
    pub fn new(template_dir: PathBuf, upload_endpoint: Option<Url>, output_dir: PathBuf) -> Self {
        let publish_target = match upload_endpoint {
            Some(endpoint) => PublishTarget::Upload(endpoint),
            None => PublishTarget::Local(output_dir),
        };
        Self {
            template_dir,
            publish_target,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Credentials and model selection for the image model.
#[derive(Clone)]
pub struct ModelConfig {
    /// API key sent with every model call
    pub api_key: String,
    /// Model name, eg `gemini-2.5-flash-image`
    pub model: String,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}
