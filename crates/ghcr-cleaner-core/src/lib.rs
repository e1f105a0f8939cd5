//! ghcr-cleaner core library
//!
//! Decides which objects of a container package are safe to delete and
//! drives their deletion:
//!
//! - [`classifier::TagClassifier`] pins objects whose tags are not all
//!   closed-pull-request tags
//! - [`graph::ReferenceGraph`] links image indices to the objects they list
//! - [`solver::LivenessSolver`] sweeps unreferenced, unpinned objects to a
//!   fixed point
//! - [`driver::Cleaner`] runs the whole sequence against the collaborator
//!   traits in [`registry_traits`]

pub mod classifier;
pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod fakes;
pub mod graph;
pub mod inventory;
pub mod obs;
pub mod registry_traits;
pub mod report;
pub mod solver;
pub mod telemetry;

pub use classifier::{ClassifierStats, KeepReason, TagClassifier, TagDecision};
pub use config::{
    compile_tag_pattern, CleanupConfig, DEFAULT_FETCH_CONCURRENCY, DEFAULT_PR_TAG_PATTERN,
};
pub use domain::{
    Digest, FetchedManifest, IndexManifest, MediaType, ObjectKind, OwnerKind, PackageRef,
    PackageVersion, PullRequestRepo, PullRequestState, RegistryObject,
};
pub use driver::Cleaner;
pub use error::{CleanerError, CleanerResult};
pub use graph::{DanglingReference, GraphNode, ReferenceGraph};
pub use inventory::{load_inventory, object_from_manifest, LoadedInventory};
pub use registry_traits::{ManifestSource, PackageInventory, PullRequestOracle};
pub use report::{CleanupReport, FailedDeletion, PlannedDeletion, SkippedObject};
pub use solver::{DeletionReason, DeletionSet, LivenessSolver, PassStats};
pub use telemetry::init_tracing;
