//! The remix pipeline: fetch the avatar, load templates, compose the prompt,
//! call the model, publish the result.

pub(crate) mod codec;
pub mod fetch;
pub mod prompt;
pub mod publish;
pub mod synth;
pub mod templates;

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineErrorKind};
use fetch::Fetcher;
use publish::Publisher;
use synth::ImageSynthesizer;

/// A request to remix one avatar.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct GenerationRequest {
    /// Farcaster id; seeds the hue shift
    pub fid: u64,
    /// Source avatar URL
    #[serde(rename = "pfp_url", alias = "avatar_url")]
    pub avatar_url: String,
    /// Profile bio, possibly empty
    #[serde(default)]
    pub bio: String,
    /// Follower count
    pub follower_count: u64,
    /// Whether the user holds a power badge
    #[serde(default)]
    pub power_badge: bool,
    /// Caller-chosen id; the output is stored as `<generation_id>.png`
    pub generation_id: String,
}

impl GenerationRequest {
    /// Checks the generation id is usable as a file key.
    pub fn validate(&self) -> Result<(), String> {
        if self.generation_id.is_empty() {
            return Err("generation_id must not be empty".to_string());
        }
        let safe = self
            .generation_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(format!(
                "generation_id {:?} may only contain ASCII letters, digits, '-' and '_'",
                self.generation_id
            ));
        }
        Ok(())
    }
}

/// The outcome of a successful run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedResult {
    /// Always true; failures are reported as [`PipelineError`]
    pub success: bool,
    /// Where the image can be retrieved
    pub image_url: String,
    /// Echo of the request's generation id
    pub generation_id: String,
}

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Checking the request
    Validating,
    /// Downloading the avatar
    Fetching,
    /// Reading templates from disk
    Loading,
    /// Building the prompt
    Composing,
    /// Waiting on the model
    Generating,
    /// Storing the artifact
    Publishing,
    /// Finished
    Done,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Fetching => "fetching",
            Stage::Loading => "loading",
            Stage::Composing => "composing",
            Stage::Generating => "generating",
            Stage::Publishing => "publishing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Runs generation requests end to end.
///
/// Holds no per-run state, so one instance can serve concurrent runs.
pub struct Pipeline {
    fetcher: Fetcher,
    template_dir: PathBuf,
    synthesizer: Arc<dyn ImageSynthesizer>,
    publisher: Publisher,
}

impl Pipeline {
    /// Builds a pipeline from its config and a model implementation.
    pub fn new(
        config: PipelineConfig,
        synthesizer: Arc<dyn ImageSynthesizer>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            fetcher: Fetcher::new(config.retry_policy)?,
            template_dir: config.template_dir,
            synthesizer,
            publisher: Publisher::new(config.publish_target)?,
        })
    }

    /// The publisher results are sent to.
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Runs one request through every stage.
    #[instrument(
        level = "debug",
        skip_all,
        fields(fid = request.fid, generation_id = %request.generation_id)
    )]
    pub async fn run(
        &self,
        request: &GenerationRequest,
    ) -> Result<PublishedResult, PipelineError> {
        debug!("Stage {}", Stage::Validating);
        request.validate().map_err(|reason| {
            PipelineError::new(Stage::Validating, PipelineErrorKind::InvalidRequest(reason))
        })?;

        debug!("Stage {}", Stage::Fetching);
        let avatar = self
            .fetcher
            .fetch_image(&request.avatar_url)
            .await
            .map_err(|kind| PipelineError::new(Stage::Fetching, kind))?;

        debug!("Stage {}", Stage::Loading);
        let templates = templates::load_templates(&self.template_dir)
            .await
            .map_err(|err| PipelineError::new(Stage::Loading, err))?;
        if templates.is_empty() {
            return Err(PipelineError::new(
                Stage::Loading,
                PipelineErrorKind::NoTemplates,
            ));
        }

        debug!("Stage {}", Stage::Composing);
        let prompt = prompt::compose_prompt(request, templates.len());

        debug!("Stage {}", Stage::Generating);
        let artifact = self
            .synthesizer
            .synthesize(&prompt, &avatar, &templates)
            .await
            .map_err(|err| PipelineError::new(Stage::Generating, err))?;

        debug!("Stage {}", Stage::Publishing);
        let image_url = self
            .publisher
            .publish(&artifact, &request.generation_id)
            .await
            .map_err(|err| PipelineError::new(Stage::Publishing, err))?;

        debug!("Stage {}", Stage::Done);
        info!(
            "Generation {} for fid {} published to {}",
            request.generation_id, request.fid, image_url
        );
        Ok(PublishedResult {
            success: true,
            image_url,
            generation_id: request.generation_id.clone(),
        })
    }
}
