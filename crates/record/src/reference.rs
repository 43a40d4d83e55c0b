use crate::record::RecordType;
use crate::uri::normalize_uri;
use serde::{Deserialize, Serialize};

/// A byte range inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Normalized document URI
    pub uri: String,

    /// Start byte offset
    pub start: u32,

    /// End byte offset
    pub end: u32,
}

impl Location {
    /// Create a location, normalizing `path` to a `file://` URI.
    pub fn new(path: &str, start: u32, end: u32) -> Self {
        Self {
            uri: normalize_uri(path),
            start,
            end,
        }
    }
}

/// A symbol usage recorded in a file's outbound reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReference {
    /// Kind of the referenced record
    pub record_type: RecordType,

    /// Identifier of the referenced record
    pub identifier: String,

    pub start: u32,
    pub end: u32,

    /// Resolved containing type (class of a member), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<String>,

    #[serde(default)]
    pub flags: u32,
}

impl RecordReference {
    /// Reference instantiates the referenced class (`new Foo`).
    pub const FLAG_NEW_OBJECT: u32 = 1;

    pub fn new(
        record_type: RecordType,
        identifier: impl Into<String>,
        start: u32,
        end: u32,
    ) -> Self {
        Self {
            record_type,
            identifier: identifier.into(),
            start,
            end,
            container_type: None,
            flags: 0,
        }
    }

    /// Builder: set the resolved container type
    #[must_use]
    pub fn with_container_type(mut self, container_type: impl Into<String>) -> Self {
        self.container_type = Some(container_type.into());
        self
    }

    /// Builder: set flags
    #[must_use]
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub const fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }

    #[must_use]
    pub fn points_to(&self, record_type: RecordType, identifier: &str) -> bool {
        self.record_type == record_type && self.identifier == identifier
    }
}

/// Certainty of a resolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Container type matches the requested one
    Surely,
    /// Container type could not be determined
    Maybe,
    /// Container type is known and differs
    Not,
}

/// A reference location paired with the certainty that it is a real match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfidence {
    pub location: Location,
    pub confidence: Confidence,
}

impl LocationConfidence {
    #[must_use]
    pub const fn surely(location: Location) -> Self {
        Self {
            location,
            confidence: Confidence::Surely,
        }
    }

    #[must_use]
    pub const fn maybe(location: Location) -> Self {
        Self {
            location,
            confidence: Confidence::Maybe,
        }
    }

    #[must_use]
    pub const fn not(location: Location) -> Self {
        Self {
            location,
            confidence: Confidence::Not,
        }
    }

    #[must_use]
    pub fn is_surely(&self) -> bool {
        self.confidence == Confidence::Surely
    }
}
