//! Project domain model.
//!
//! # Responsibility
//! - Define the portfolio project record and its id-less field set.
//! - Validate required fields before any gateway write.
//! - Normalize comma-separated tag input from admin forms.
//!
//! # Invariants
//! - `id` is assigned by the gateway, never by callers.
//! - Valid records have non-empty `title`, `description` and `image`.
//! - Tag order is display order; normalization keeps first occurrence.

use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable project identifier assigned by the gateway.
///
/// Gateways may hand out numeric sequences or string tokens; both are kept
/// as their decimal/text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ProjectId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(value) => Self::from(value),
            RawId::Text(value) => Self(value),
        })
    }
}

/// Project fields without identity, as submitted by create/update callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFields {
    pub title: String,
    pub description: String,
    /// Remote blob URL or placeholder URL.
    pub image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    /// Promotional placement on the home page.
    #[serde(default)]
    pub featured: bool,
}

impl ProjectFields {
    /// Checks the fields every persisted project must carry.
    ///
    /// `image` is checked first so a missing upload is reported even when
    /// other fields are also blank.
    pub fn validate(&self) -> Result<(), ProjectValidationError> {
        if self.image.trim().is_empty() {
            return Err(ProjectValidationError::MissingImage);
        }
        if self.title.trim().is_empty() {
            return Err(ProjectValidationError::MissingTitle);
        }
        if self.description.trim().is_empty() {
            return Err(ProjectValidationError::MissingDescription);
        }
        if let Some(index) = self.tags.iter().position(|tag| tag.trim().is_empty()) {
            return Err(ProjectValidationError::BlankTag { index });
        }
        Ok(())
    }

    /// Attaches a gateway-assigned id.
    pub fn with_id(self, id: ProjectId) -> Project {
        Project {
            id,
            title: self.title,
            description: self.description,
            image: self.image,
            tags: self.tags,
            live_url: self.live_url,
            github_url: self.github_url,
            featured: self.featured,
        }
    }
}

/// Portfolio project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

impl Project {
    /// Returns a copy of the mutable fields.
    pub fn fields(&self) -> ProjectFields {
        ProjectFields {
            title: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            tags: self.tags.clone(),
            live_url: self.live_url.clone(),
            github_url: self.github_url.clone(),
            featured: self.featured,
        }
    }

    /// Returns whether this project shares at least one tag with `other`.
    pub fn shares_tag_with(&self, other: &Project) -> bool {
        self.tags.iter().any(|tag| other.tags.contains(tag))
    }
}

/// Validation failure for project writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectValidationError {
    MissingImage,
    MissingTitle,
    MissingDescription,
    BlankTag { index: usize },
}

impl ProjectValidationError {
    /// Field name reported to form layers.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingImage => "image",
            Self::MissingTitle => "title",
            Self::MissingDescription => "description",
            Self::BlankTag { .. } => "tags",
        }
    }
}

impl Display for ProjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingImage => write!(f, "project image is required"),
            Self::MissingTitle => write!(f, "project title is required"),
            Self::MissingDescription => write!(f, "project description is required"),
            Self::BlankTag { index } => write!(f, "tag at position {index} is blank"),
        }
    }
}

impl Error for ProjectValidationError {}

/// Parses comma-separated tag input into an ordered, de-duplicated list.
///
/// Entries are trimmed and blank entries dropped. Case is preserved and the
/// first occurrence of a duplicate wins.
pub fn parse_tag_input(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in input.split(',') {
        let tag = raw.trim();
        if tag.is_empty() || tags.iter().any(|existing| existing == tag) {
            continue;
        }
        tags.push(tag.to_string());
    }
    tags
}
