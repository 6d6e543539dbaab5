//! Shared constants for the remix pipeline
//!

use std::time::Duration;

/// User-Agent sent when fetching avatars.
pub const FETCH_USER_AGENT: &str = "pfpremix/1.0";

/// Per-request timeout when fetching an avatar.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Additional attempts the avatar fetcher makes after the first one.
pub const FETCH_MAX_RETRIES: u32 = 3;

/// HTTP statuses worth retrying when fetching an avatar.
pub const FETCH_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Largest avatar body the fetcher will buffer.
pub const FETCH_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Base of the exponential backoff between avatar fetch attempts.
pub const FETCH_BACKOFF_FACTOR: Duration = Duration::from_secs(2);

/// The template that anchors pose, structure and hands.
pub const TEMPLATE_BASE_FILE: &str = "templateBase.jpg";

/// Indexes of the supplementary `template{N}.jpg` files, checked in order.
pub const TEMPLATE_NUMBERED_INDEXES: std::ops::RangeInclusive<u32> = 2..=5;

/// Hard cap on the number of templates sent to the model.
pub const MAX_TEMPLATES: usize = 5;

/// Size of the hue wheel the per-user seed is reduced into.
pub const HUE_DEGREES: u64 = 360;

/// Follower count a user must exceed to get the popularity clause.
pub const POPULAR_FOLLOWER_THRESHOLD: u64 = 10_000;

/// Default image model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Base URL of the Gemini REST API.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Sampling temperature for every generation.
pub const GENERATION_TEMPERATURE: f32 = 1.0;

/// Timeout for a single model call.
pub const MODEL_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeout for a single upload to the configured upload target.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Route the local output directory is served under.
pub const OUTPUTS_ROUTE: &str = "/outputs";
