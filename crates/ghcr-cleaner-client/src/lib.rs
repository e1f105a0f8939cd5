//! HTTP clients backing the ghcr-cleaner collaborator traits
//!
//! - [`GitHubClient`]: package versions listing and deletion, pull request
//!   states, through the GitHub REST API
//! - [`RegistryClient`]: manifests by digest, through the OCI distribution API

pub mod config;
pub mod error;
pub mod github;
pub mod registry;

pub use config::{ClientConfig, DEFAULT_API_URL, DEFAULT_REGISTRY_URL};
pub use error::{ClientError, Result};
pub use github::GitHubClient;
pub use registry::RegistryClient;
