pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod model;
pub mod remote;
pub mod services;
pub mod session;
pub mod validation;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{ServiceError, ServiceResult};
