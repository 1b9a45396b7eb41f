//! Trigger step plugin of the warpdrive pipeline runner, plus the manifest
//! helpers the runner shares with its deploy steps.

pub mod config;
pub mod errors;
pub mod manifest;
pub mod pipeline;
pub mod plugins;
pub mod task;
pub mod taskplugin;
pub mod util;

pub use config::Config;
pub use plugins::{initialize_task_plugin, AckFn, TaskPlugin, TaskType};
pub use task::{PipelineCtx, PipelineTask, Status, StepTask, Trigger};
