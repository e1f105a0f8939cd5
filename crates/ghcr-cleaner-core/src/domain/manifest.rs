//! Registry manifests: media types and image index parsing.

use serde::{Deserialize, Serialize};

use crate::domain::digest::Digest;
use crate::error::{CleanerError, CleanerResult};

/// Manifest media types a cleanup run knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    DockerManifestSchema2,
    DockerManifestList,
    OciManifest,
    OciIndex,
}

impl MediaType {
    pub const DOCKER_MANIFEST_SCHEMA2: &'static str =
        "application/vnd.docker.distribution.manifest.v2+json";
    pub const DOCKER_MANIFEST_LIST: &'static str =
        "application/vnd.docker.distribution.manifest.list.v2+json";
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// Every media type accepted when fetching a manifest.
    pub const ACCEPTED: [&'static str; 4] = [
        Self::DOCKER_MANIFEST_SCHEMA2,
        Self::DOCKER_MANIFEST_LIST,
        Self::OCI_MANIFEST,
        Self::OCI_INDEX,
    ];

    /// Parse a media type, ignoring any `; param=...` suffix.
    pub fn parse(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        match essence {
            Self::DOCKER_MANIFEST_SCHEMA2 => Some(MediaType::DockerManifestSchema2),
            Self::DOCKER_MANIFEST_LIST => Some(MediaType::DockerManifestList),
            Self::OCI_MANIFEST => Some(MediaType::OciManifest),
            Self::OCI_INDEX => Some(MediaType::OciIndex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::DockerManifestSchema2 => Self::DOCKER_MANIFEST_SCHEMA2,
            MediaType::DockerManifestList => Self::DOCKER_MANIFEST_LIST,
            MediaType::OciManifest => Self::OCI_MANIFEST,
            MediaType::OciIndex => Self::OCI_INDEX,
        }
    }

    /// True for manifest lists / image indices.
    pub fn is_index(&self) -> bool {
        matches!(self, MediaType::DockerManifestList | MediaType::OciIndex)
    }
}

/// Raw manifest as returned by the registry.
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    /// `Content-Type` reported by the registry, if any
    pub media_type: Option<String>,
    /// Manifest body bytes
    pub body: Vec<u8>,
}

#[derive(Deserialize)]
struct MediaTypeProbe {
    #[serde(rename = "mediaType")]
    media_type: Option<String>,
}

impl FetchedManifest {
    pub fn new(media_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            media_type: Some(media_type.into()),
            body,
        }
    }

    /// Media type string: the reported content type, falling back to the
    /// body's own `mediaType` field.
    pub fn raw_media_type(&self) -> Option<String> {
        self.media_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| {
                serde_json::from_slice::<MediaTypeProbe>(&self.body)
                    .ok()
                    .and_then(|probe| probe.media_type)
            })
    }

    /// Resolved media type, `None` when unknown or unsupported.
    pub fn resolve_media_type(&self) -> Option<MediaType> {
        self.raw_media_type().as_deref().and_then(MediaType::parse)
    }
}

/// One entry of an image index's manifest list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Image index / manifest list body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub manifests: Vec<IndexDescriptor>,
}

impl IndexManifest {
    /// Parse an index body. A body that is not a manifest list is a
    /// structural error for the run.
    pub fn parse(digest: &Digest, body: &[u8]) -> CleanerResult<Self> {
        serde_json::from_slice(body).map_err(|e| CleanerError::MalformedManifest {
            digest: digest.to_string(),
            reason: e.to_string(),
        })
    }

    /// Child digests in manifest-list order.
    pub fn child_digests(&self, digest: &Digest) -> CleanerResult<Vec<Digest>> {
        self.manifests
            .iter()
            .map(|m| {
                m.digest
                    .parse::<Digest>()
                    .map_err(|_| CleanerError::MalformedManifest {
                        digest: digest.to_string(),
                        reason: format!("invalid child digest '{}'", m.digest),
                    })
            })
            .collect()
    }

    /// Build an index body referencing `children` (used by fakes and tests).
    pub fn for_children(media_type: MediaType, children: &[Digest]) -> Self {
        IndexManifest {
            schema_version: Some(2),
            media_type: Some(media_type.as_str().to_string()),
            manifests: children
                .iter()
                .map(|c| IndexDescriptor {
                    digest: c.to_string(),
                    media_type: Some(MediaType::OCI_MANIFEST.to_string()),
                    size: None,
                })
                .collect(),
        }
    }
}
