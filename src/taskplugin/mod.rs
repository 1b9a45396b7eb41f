//! Step plugins and the collaborators they call out to.

pub mod callback;
pub mod storage;
pub mod trigger;
pub mod webhook;

pub use callback::{CallbackFetcher, CallbackOutcome, CallbackQuery};
pub use storage::{Base64Uri, PlainUri, Storage, StorageResolver, UriDecrypter};
pub use trigger::{to_trigger_task, TriggerTaskPlugin, TIMEOUT_ERROR, TRIGGER_TASK_TIMEOUT};
pub use webhook::WebhookDispatcher;
