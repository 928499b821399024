pub mod event;
pub mod status;
pub mod watcher;

pub use event::{Batch, Event, LoadError};
pub use status::{extract_status_code, is_success, is_success_message, status_digits};
pub use watcher::{DirectoryWatcher, WatchError};
