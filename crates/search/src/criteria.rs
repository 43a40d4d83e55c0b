use crate::entry::SearchEntry;
use serde::{Deserialize, Serialize};
use symbol_record::{ClassType, Record, RecordType};

/// Composable predicate over search entries.
///
/// Backends translate a criteria into a native filter that may match more than
/// asked for; [`Criteria::matches`] is the exact check applied to every
/// candidate before it is yielded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criteria {
    ExactShortName(String),
    ShortNameBeginsWith(String),
    FqnBeginsWith(String),
    IsClass,
    IsFunction,
    IsConstant,
    IsClassType(ClassType),
    And(Vec<Criteria>),
}

impl Criteria {
    pub fn exact_short_name(name: impl Into<String>) -> Self {
        Self::ExactShortName(name.into())
    }

    pub fn short_name_begins_with(prefix: impl Into<String>) -> Self {
        Self::ShortNameBeginsWith(prefix.into())
    }

    pub fn fqn_begins_with(prefix: impl Into<String>) -> Self {
        Self::FqnBeginsWith(prefix.into())
    }

    pub fn and(criteria: impl IntoIterator<Item = Criteria>) -> Self {
        Self::And(criteria.into_iter().collect())
    }

    #[must_use]
    pub fn matches(&self, entry: &SearchEntry) -> bool {
        match self {
            Self::ExactShortName(name) => entry.short_name() == name,
            Self::ShortNameBeginsWith(prefix) => entry.short_name().starts_with(prefix.as_str()),
            Self::FqnBeginsWith(prefix) => entry.identifier.starts_with(prefix.as_str()),
            Self::IsClass => entry.record_type == RecordType::Class,
            Self::IsFunction => entry.record_type == RecordType::Function,
            Self::IsConstant => entry.record_type == RecordType::Constant,
            Self::IsClassType(class_type) => {
                entry.record_type == RecordType::Class && entry.class_type == Some(*class_type)
            }
            Self::And(criteria) => criteria.iter().all(|criteria| criteria.matches(entry)),
        }
    }

    /// Exact check against a full record; unsearchable records never match.
    #[must_use]
    pub fn matches_record(&self, record: &Record) -> bool {
        SearchEntry::from_record(record).is_some_and(|entry| self.matches(&entry))
    }

    /// Record types this criteria can possibly match, `None` meaning any.
    #[must_use]
    pub fn record_types(&self) -> Option<Vec<RecordType>> {
        match self {
            Self::IsClass | Self::IsClassType(_) => Some(vec![RecordType::Class]),
            Self::IsFunction => Some(vec![RecordType::Function]),
            Self::IsConstant => Some(vec![RecordType::Constant]),
            Self::ExactShortName(_) | Self::ShortNameBeginsWith(_) | Self::FqnBeginsWith(_) => {
                None
            }
            Self::And(criteria) => {
                criteria
                    .iter()
                    .filter_map(Self::record_types)
                    .fold(None, |acc: Option<Vec<RecordType>>, types| match acc {
                        None => Some(types),
                        Some(acc) => Some(acc.into_iter().filter(|t| types.contains(t)).collect()),
                    })
            }
        }
    }
}
