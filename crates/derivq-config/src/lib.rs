//! Configuration for derivq: application settings, derivative task forms and
//! their validation.

pub mod app;
pub mod error;
pub mod mimetype;
pub mod task;
pub mod validator;

pub use app::{AppConfig, LoggingConfig, SiteConfig, loader};
pub use error::{ConfigError, FieldError};
pub use mimetype::{MimeType, validate_mimetype};
pub use task::{
    DerivativeTaskConfig, MappingStrategy, TaskConfigForm, TaskDefinition, TriggerFilter,
    normalize_path,
};
pub use validator::ConfigValidator;
