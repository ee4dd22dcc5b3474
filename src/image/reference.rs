//! Fully qualified image references and destination path mapping

use crate::config::TargetEnvironment;
use crate::error::{ReplicationError, Result};
use std::fmt;
use std::str::FromStr;

pub const LATEST_TAG: &str = "latest";

/// `host/namespace/repository:tag`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub registry: String,
    pub namespace: String,
    /// One or more path segments below the namespace
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(
        registry: impl Into<String>,
        namespace: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Result<Self> {
        let reference = Self {
            registry: registry.into(),
            namespace: namespace.into(),
            repository: repository.into(),
            tag: tag.into(),
        };
        reference.validate()?;
        Ok(reference)
    }

    /// Parse `host/namespace/repo[/more]:tag`; the tag is mandatory
    pub fn parse(image: &str) -> Result<Self> {
        let image = image.trim();
        if image.contains('@') {
            return Err(ReplicationError::Validation(format!(
                "Digest references are not supported: {}",
                image
            )));
        }

        let segments: Vec<&str> = image.split('/').collect();
        if segments.len() < 3 {
            return Err(ReplicationError::Validation(format!(
                "Image must look like host/namespace/repository:tag: {}",
                image
            )));
        }

        let last = segments[segments.len() - 1];
        let (name, tag) = last.rsplit_once(':').ok_or_else(|| {
            ReplicationError::Validation(format!("Image has no tag: {}", image))
        })?;

        let mut repository: Vec<&str> = segments[2..segments.len() - 1].to_vec();
        repository.push(name);

        Self::new(segments[0], segments[1], repository.join("/"), tag)
    }

    fn validate(&self) -> Result<()> {
        if self.registry.is_empty() || self.namespace.is_empty() {
            return Err(ReplicationError::Validation(format!(
                "Image reference needs a registry host and namespace: {}",
                self
            )));
        }
        if self.repository.is_empty() || self.repository.split('/').any(str::is_empty) {
            return Err(ReplicationError::Validation(format!(
                "Image reference has an empty repository segment: {}",
                self
            )));
        }
        if self.tag.is_empty() {
            return Err(ReplicationError::Validation(format!(
                "Image reference has an empty tag: {}",
                self
            )));
        }
        Ok(())
    }

    /// First two path segments, compared against the source allow-list
    pub fn source_prefix(&self) -> String {
        format!("{}/{}", self.registry, self.namespace)
    }

    /// Last repository segment
    pub fn image_name(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or(self.repository.as_str())
    }

    /// Same repository under a different tag
    pub fn with_tag(&self, tag: &str) -> Result<Self> {
        Self::new(
            self.registry.clone(),
            self.namespace.clone(),
            self.repository.clone(),
            tag,
        )
    }

    pub fn is_allowed(&self, allowed_sources: &[String]) -> bool {
        let prefix = self.source_prefix();
        allowed_sources.iter().any(|allowed| allowed.trim_end_matches('/') == prefix)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}:{}",
            self.registry, self.namespace, self.repository, self.tag
        )
    }
}

impl FromStr for ImageReference {
    type Err = ReplicationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Where one source image lands in one target environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorDestination {
    pub versioned: ImageReference,
    pub latest: ImageReference,
    /// `project/image`, as passed to the repository creation API
    pub repository_path: String,
}

impl MirrorDestination {
    /// `source-host/project/.../image:tag` maps to
    /// `target-host/target-namespace/project/image:tag` plus a `latest` alias
    pub fn resolve(source: &ImageReference, target: &TargetEnvironment) -> Result<Self> {
        let repository_path = format!("{}/{}", source.namespace, source.image_name());
        let versioned = ImageReference::new(
            target.url.clone(),
            target.namespace.clone(),
            repository_path.clone(),
            source.tag.clone(),
        )?;
        let latest = versioned.with_tag(LATEST_TAG)?;

        Ok(Self {
            versioned,
            latest,
            repository_path,
        })
    }
}

/// Source and destination of one discovered (repository, tag) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPair {
    pub source: ImageReference,
    pub destination: ImageReference,
}

impl SyncPair {
    pub fn resolve(
        source: &TargetEnvironment,
        destination: &TargetEnvironment,
        repository: &str,
        tag: &str,
    ) -> Result<Self> {
        Ok(Self {
            source: ImageReference::new(
                source.url.clone(),
                source.namespace.clone(),
                repository,
                tag,
            )?,
            destination: ImageReference::new(
                destination.url.clone(),
                destination.namespace.clone(),
                repository,
                tag,
            )?,
        })
    }
}
