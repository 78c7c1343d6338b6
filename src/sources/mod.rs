// src/sources/mod.rs
pub mod auth;
pub mod detect;
pub mod registry;

pub use auth::{AuthBinding, AuthResolver, AuthRule};
pub use detect::{detect_source_type, DetectionRule, SourceType, DEFAULT_DETECTION_TABLE};
pub use registry::{SourceEntry, SourceRegistry};
