use serde::{Deserialize, Serialize};
use symbol_record::{short_name, ClassType, Record, RecordKey, RecordType};

/// Row of the search projection: just enough to match [`crate::Criteria`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchEntry {
    pub record_type: RecordType,
    pub identifier: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub class_type: Option<ClassType>,

    #[serde(default)]
    pub flags: u32,
}

impl SearchEntry {
    /// Project `record`, or `None` if it does not belong in the search index.
    ///
    /// Only classes, functions and constants are searchable, and classes only
    /// once their type is known.
    #[must_use]
    pub fn from_record(record: &Record) -> Option<Self> {
        if !record.record_type().is_searchable() || record.is_speculative() {
            return None;
        }

        let class_type = match record {
            Record::Class(class) => class.class_type,
            _ => None,
        };

        Some(Self {
            record_type: record.record_type(),
            identifier: record.identifier(),
            class_type,
            flags: record.flags(),
        })
    }

    #[must_use]
    pub fn short_name(&self) -> &str {
        short_name(&self.identifier)
    }

    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.record_type, self.identifier.clone())
    }

    /// Value of the `type` column; empty for non-class entries.
    #[must_use]
    pub fn type_column(&self) -> &'static str {
        self.class_type.map_or("", ClassType::as_str)
    }
}
