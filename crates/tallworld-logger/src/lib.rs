pub mod log;
pub mod severity;
pub mod systime;

pub use log::{init_from_env, log, min_severity};
pub use severity::LogSeverity;
