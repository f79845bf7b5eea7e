// ABOUTME: Container image reference parsing for revision naming.
// ABOUTME: Extracts the artifact name and optional tag from registry/name:tag.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image name could not be empty: {0:?}")]
    EmptyName(String),
}

/// An image reference split into the parts revision naming needs.
///
/// The reference is split on `:` and a tag is only recognized when exactly
/// one `:` is present: `host:5000/app:v1` has no tag, while `host:5000/app`
/// has the tag `5000/app`. The name is the last `/` segment before any `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    reference: String,
    name: String,
    tag: String,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let parts: Vec<&str> = input.split(':').collect();
        let tag = if parts.len() == 2 { parts[1] } else { "" };

        let path = parts[0];
        let name = path.rsplit_once('/').map_or(path, |(_, last)| last);
        if name.is_empty() {
            return Err(ParseImageRefError::EmptyName(input.to_string()));
        }

        Ok(Self {
            reference: input.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag, empty when the reference carries none.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}

/// Extract the tag of an image reference without building a revision.
pub fn find_image_tag(reference: &str) -> Result<String, ParseImageRefError> {
    ImageRef::parse(reference).map(|image| image.tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_port_is_not_a_tag() {
        let image = ImageRef::parse("localhost:5000/app:v1").unwrap();
        assert_eq!(image.tag(), "");
        assert_eq!(image.name(), "localhost");
    }

    #[test]
    fn trailing_slash_has_empty_name() {
        assert_eq!(
            ImageRef::parse("registry/:v1"),
            Err(ParseImageRefError::EmptyName("registry/:v1".to_string()))
        );
    }
}
