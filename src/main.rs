use std::sync::Arc;

use clap::Parser;
use pfpremix::config::setup_logging;
use pfpremix::pipeline::Pipeline;
use pfpremix::pipeline::publish::PublishTarget;
use pfpremix::pipeline::synth::GeminiSynthesizer;
use tracing::{error, info, warn};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = pfpremix::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let config = cli.pipeline_config();
    match &config.publish_target {
        PublishTarget::Upload(endpoint) => info!("Publishing to {}", endpoint),
        PublishTarget::Local(dir) => info!(
            "No upload endpoint configured, writing images to {}",
            dir.display()
        ),
    }

    let pipeline = match cli.model_config() {
        Some(model) => {
            let synthesizer = match GeminiSynthesizer::new(model) {
                Ok(synthesizer) => synthesizer,
                Err(err) => {
                    error!("Failed to build model client: {}", err);
                    return;
                }
            };
            match Pipeline::new(config, Arc::new(synthesizer)) {
                Ok(pipeline) => Some(pipeline),
                Err(err) => {
                    error!("Failed to build pipeline: {}", err);
                    return;
                }
            }
        }
        None => {
            warn!("GEMINI_API_KEY is not set, image generation is disabled");
            None
        }
    };

    if let Err(err) = pfpremix::web::setup_server(&cli.listen_address, cli.port, pipeline).await {
        error!("Application error: {}", err);
    }
}
