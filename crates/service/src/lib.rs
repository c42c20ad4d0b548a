//! vidpress
//!
//! Target-size video compression service: computes a bitrate that hits a
//! requested output size, drives ffmpeg through a two-pass encode, and
//! reports live progress to a polling client.

pub mod bitrate;
pub mod encode;
pub mod jobs;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod registry;
pub mod server;
pub mod startup;

pub use bitrate::{plan_video_bitrate, PlanError, DEFAULT_AUDIO_BITRATE_BPS, MIN_VIDEO_BITRATE_BPS};
pub use encode::{
    EncodeError, EncodeObserver, EncodeOutcome, EncodeRequest, NullObserver, TwoPassEncoder,
    ANALYZE_WEIGHT, ENCODE_WEIGHT,
};
pub use jobs::{Job, JobStatus, StatusReport};
pub use orchestrator::{derive_max_concurrent_jobs, Orchestrator, OrchestratorError};
pub use probe::{parse_probe_output, probe_media, MediaInfo, ProbeError};
pub use progress::{parse_stats_line, ProgressUpdate};
pub use registry::{JobRegistry, RegistryError};
pub use server::{create_router, run_server, AppState, ServerError};
pub use startup::{run_startup_checks, StartupError};

pub use vidpress_config as config;
pub use vidpress_config::Config;
