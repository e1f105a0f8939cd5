//! Domain models for ghcr-cleaner.
//!
//! Canonical definitions for the entities a cleanup run works on:
//! - `Digest`: content address of a registry object
//! - `PackageRef` / `PackageVersion`: the GitHub package being cleaned and its versions
//! - `RegistryObject`: an image or image index discovered for this run
//! - `PullRequestRepo` / `PullRequestState`: inputs and outputs of the PR oracle

pub mod digest;
pub mod manifest;
pub mod package;
pub mod pull_request;

pub use digest::Digest;
pub use manifest::{FetchedManifest, IndexDescriptor, IndexManifest, MediaType};
pub use package::{ObjectKind, OwnerKind, PackageRef, PackageVersion, RegistryObject};
pub use pull_request::{PullRequestRepo, PullRequestState};
