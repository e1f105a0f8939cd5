//! Packages, package versions and the registry objects they resolve to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::digest::Digest;
use crate::error::CleanerError;

/// Whether a package belongs to a user or an organization account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    #[default]
    User,
    Organization,
}

impl OwnerKind {
    /// Path segment used by the GitHub packages API.
    pub fn api_segment(&self) -> &'static str {
        match self {
            OwnerKind::User => "users",
            OwnerKind::Organization => "orgs",
        }
    }
}

impl FromStr for OwnerKind {
    type Err = CleanerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(OwnerKind::User),
            "org" | "orgs" | "organization" => Ok(OwnerKind::Organization),
            other => Err(CleanerError::Config(format!("unknown owner type '{other}'"))),
        }
    }
}

/// Container package being cleaned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    /// Registry host, e.g. `ghcr.io`
    pub registry: String,
    /// Owning user or organization
    pub owner: String,
    pub owner_kind: OwnerKind,
    /// Package name
    pub name: String,
}

impl PackageRef {
    pub fn new(registry: &str, owner: &str, name: &str) -> Self {
        PackageRef {
            registry: registry.to_string(),
            owner: owner.to_string(),
            owner_kind: OwnerKind::User,
            name: name.to_string(),
        }
    }

    pub fn with_owner_kind(mut self, owner_kind: OwnerKind) -> Self {
        self.owner_kind = owner_kind;
        self
    }

    /// Registry repository path, `owner/name`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Full image reference without tag or digest, `registry/owner/name`.
    pub fn image_reference(&self) -> String {
        format!("{}/{}/{}", self.registry, self.owner, self.name)
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.image_reference())
    }
}

/// One version of a container package as listed by the packages API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    /// Package version id, used for deletion
    pub id: u64,
    pub digest: Digest,
    pub tags: Vec<String>,
}

/// Image or image index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectKind {
    Image,
    Index { children: Vec<Digest> },
}

/// A content-addressed object discovered for the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryObject {
    pub digest: Digest,
    pub version_id: u64,
    pub tags: Vec<String>,
    pub kind: ObjectKind,
}

impl RegistryObject {
    pub fn image(version: &PackageVersion) -> Self {
        RegistryObject {
            digest: version.digest.clone(),
            version_id: version.id,
            tags: version.tags.clone(),
            kind: ObjectKind::Image,
        }
    }

    pub fn index(version: &PackageVersion, children: Vec<Digest>) -> Self {
        RegistryObject {
            digest: version.digest.clone(),
            version_id: version.id,
            tags: version.tags.clone(),
            kind: ObjectKind::Index { children },
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self.kind, ObjectKind::Index { .. })
    }

    /// Child digests of an index, empty for an image.
    pub fn children(&self) -> &[Digest] {
        match &self.kind {
            ObjectKind::Image => &[],
            ObjectKind::Index { children } => children,
        }
    }
}
