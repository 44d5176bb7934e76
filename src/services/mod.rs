pub mod auth_service;
pub mod evaluation_service;
pub mod scoring;
pub mod settings_service;

pub use evaluation_service::*;
pub use scoring::*;
pub use settings_service::*;
