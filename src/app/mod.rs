pub mod loader;
pub mod types;

pub use loader::{discover_configs, load_all, load_app_config, select_configs};
pub use types::{AppConfig, StepKind, StepRejection, StepSpec};
