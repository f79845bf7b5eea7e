// ABOUTME: Artifact reference carried by a deployment: an image or a storage object.
// ABOUTME: Enforces that exactly one of the two forms is configured.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::image_ref::{ImageRef, ParseImageRefError};

/// Location of a packaged artifact in an object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub version: String,
}

/// What a deployment ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ArtifactEntry", into = "ArtifactEntry")]
pub enum ArtifactReference {
    /// Container image reference, kept as written and parsed on demand.
    Image(String),
    /// Archive in a storage bucket.
    Storage(StorageObject),
}

impl ArtifactReference {
    pub fn image(reference: impl Into<String>) -> Self {
        ArtifactReference::Image(reference.into())
    }

    /// Name and raw tag used for revision naming.
    ///
    /// Storage artifacts use the last path segment of the key as the name
    /// and the object version as the tag.
    pub fn name_and_tag(&self) -> Result<(String, String), ParseImageRefError> {
        match self {
            ArtifactReference::Image(reference) => {
                let image = ImageRef::parse(reference)?;
                Ok((image.name().to_string(), image.tag().to_string()))
            }
            ArtifactReference::Storage(object) => {
                let name = object
                    .key
                    .rsplit_once('/')
                    .map_or(object.key.as_str(), |(_, last)| last);
                if name.is_empty() {
                    return Err(ParseImageRefError::EmptyName(object.key.clone()));
                }
                Ok((name.to_string(), object.version.clone()))
            }
        }
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactReference::Image(reference) => f.write_str(reference),
            ArtifactReference::Storage(object) => {
                write!(f, "s3://{}/{}", object.bucket, object.key)?;
                if !object.version.is_empty() {
                    write!(f, "?versionId={}", object.version)?;
                }
                Ok(())
            }
        }
    }
}

/// Wire form: `{image: ...}` or `{storage: {...}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ArtifactEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    storage: Option<StorageObject>,
}

impl TryFrom<ArtifactEntry> for ArtifactReference {
    type Error = String;

    fn try_from(entry: ArtifactEntry) -> Result<Self, Self::Error> {
        match (entry.image, entry.storage) {
            (Some(image), None) => Ok(ArtifactReference::Image(image)),
            (None, Some(storage)) => Ok(ArtifactReference::Storage(storage)),
            (Some(_), Some(_)) => {
                Err("artifact must set only one of image or storage".to_string())
            }
            (None, None) => Err("artifact must set one of image or storage".to_string()),
        }
    }
}

impl From<ArtifactReference> for ArtifactEntry {
    fn from(artifact: ArtifactReference) -> Self {
        match artifact {
            ArtifactReference::Image(image) => ArtifactEntry {
                image: Some(image),
                storage: None,
            },
            ArtifactReference::Storage(storage) => ArtifactEntry {
                image: None,
                storage: Some(storage),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_name_comes_from_key() {
        let artifact = ArtifactReference::Storage(StorageObject {
            bucket: "artifacts".to_string(),
            key: "functions/billing.zip".to_string(),
            version: "3".to_string(),
        });
        let (name, tag) = artifact.name_and_tag().unwrap();
        assert_eq!(name, "billing.zip");
        assert_eq!(tag, "3");
    }

    #[test]
    fn exactly_one_form_is_required() {
        let both: Result<ArtifactReference, _> =
            serde_yaml::from_str("image: a:1\nstorage: {bucket: b, key: k}\n");
        assert!(both.is_err());

        let neither: Result<ArtifactReference, _> = serde_yaml::from_str("{}");
        assert!(neither.is_err());

        let image: ArtifactReference = serde_yaml::from_str("image: repo/app:1.0").unwrap();
        assert_eq!(image, ArtifactReference::image("repo/app:1.0"));
    }
}
