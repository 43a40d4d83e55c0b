use crate::criteria::Criteria;
use crate::entry::SearchEntry;
use crate::error::{Result, SearchError};
use rusqlite::types::Value;
use symbol_record::{RecordType, NAMESPACE_SEPARATOR};

/// Translates [`Criteria`] into a backend-native filter.
///
/// Filters may over-approximate: callers re-check every candidate with
/// [`Criteria::matches`].
pub trait FilterTranslator {
    type Filter;

    fn translate(&self, criteria: &Criteria) -> Result<Self::Filter>;
}

/// A SQL condition over the `search_index` table with positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub condition: String,
    pub params: Vec<Value>,
}

pub struct SqlTranslator;

impl SqlTranslator {
    const BACKEND: &'static str = "sqlite";

    fn text(&self, value: &str) -> Result<Value> {
        // GLOB and bound text stop at the first NUL byte.
        if value.contains('\0') {
            return Err(SearchError::UnsupportedCriteria {
                backend: Self::BACKEND,
                reason: format!("NUL byte in {value:?}"),
            });
        }
        Ok(Value::Text(value.to_string()))
    }

    fn glob(&self, pattern: String) -> Result<Value> {
        self.text(&pattern)
    }
}

impl FilterTranslator for SqlTranslator {
    type Filter = SqlFilter;

    fn translate(&self, criteria: &Criteria) -> Result<SqlFilter> {
        let filter = match criteria {
            Criteria::ExactShortName(name) => SqlFilter {
                condition: "identifier = ? OR identifier GLOB ?".to_string(),
                params: vec![
                    self.text(name)?,
                    self.glob(format!("*{NAMESPACE_SEPARATOR}{}", escape_glob(name)))?,
                ],
            },
            Criteria::ShortNameBeginsWith(prefix) => SqlFilter {
                condition: "identifier GLOB ?".to_string(),
                params: vec![self.glob(format!("*{}*", escape_glob(prefix)))?],
            },
            Criteria::FqnBeginsWith(prefix) => SqlFilter {
                condition: "identifier GLOB ?".to_string(),
                params: vec![self.glob(format!("{}*", escape_glob(prefix)))?],
            },
            Criteria::IsClass => record_type_filter(RecordType::Class),
            Criteria::IsFunction => record_type_filter(RecordType::Function),
            Criteria::IsConstant => record_type_filter(RecordType::Constant),
            Criteria::IsClassType(class_type) => SqlFilter {
                condition: "record_type = ? AND type = ?".to_string(),
                params: vec![
                    Value::Text(RecordType::Class.as_str().to_string()),
                    Value::Text(class_type.as_str().to_string()),
                ],
            },
            Criteria::And(criteria) if criteria.is_empty() => SqlFilter {
                condition: "1 = 1".to_string(),
                params: Vec::new(),
            },
            Criteria::And(criteria) => {
                let mut parts = Vec::with_capacity(criteria.len());
                let mut params = Vec::new();
                for criteria in criteria {
                    let filter = self.translate(criteria)?;
                    parts.push(format!("({})", filter.condition));
                    params.extend(filter.params);
                }
                SqlFilter {
                    condition: parts.join(" AND "),
                    params,
                }
            }
        };
        Ok(filter)
    }
}

fn record_type_filter(record_type: RecordType) -> SqlFilter {
    SqlFilter {
        condition: "record_type = ?".to_string(),
        params: vec![Value::Text(record_type.as_str().to_string())],
    }
}

/// Escape GLOB metacharacters so `value` matches literally.
#[must_use]
pub fn escape_glob(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => out.push_str("[*]"),
            '?' => out.push_str("[?]"),
            '[' => out.push_str("[[]"),
            _ => out.push(ch),
        }
    }
    out
}

/// Record-type prefilter used by the in-memory file index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTypeFilter {
    record_types: Option<Vec<RecordType>>,
}

impl RecordTypeFilter {
    #[must_use]
    pub fn admits(&self, entry: &SearchEntry) -> bool {
        self.record_types
            .as_ref()
            .map_or(true, |types| types.contains(&entry.record_type))
    }
}

pub struct RecordTypeTranslator;

impl FilterTranslator for RecordTypeTranslator {
    type Filter = RecordTypeFilter;

    fn translate(&self, criteria: &Criteria) -> Result<RecordTypeFilter> {
        Ok(RecordTypeFilter {
            record_types: criteria.record_types(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use symbol_record::ClassType;

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn exact_short_name_matches_bare_or_namespaced() {
        let filter = SqlTranslator
            .translate(&Criteria::exact_short_name("Foo"))
            .unwrap();
        assert_eq!(filter.condition, "identifier = ? OR identifier GLOB ?");
        assert_eq!(filter.params, vec![text("Foo"), text("*\\Foo")]);
    }

    #[test]
    fn and_parenthesizes_parts() {
        let filter = SqlTranslator
            .translate(&Criteria::and([
                Criteria::IsClassType(ClassType::Enum),
                Criteria::fqn_begins_with("App\\"),
            ]))
            .unwrap();
        assert_eq!(
            filter.condition,
            "(record_type = ? AND type = ?) AND (identifier GLOB ?)"
        );
        assert_eq!(
            filter.params,
            vec![text("class"), text("enum"), text("App\\*")]
        );
    }

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("a*b?c[d]"), "a[*]b[?]c[[]d]");
        let filter = SqlTranslator
            .translate(&Criteria::short_name_begins_with("F*"))
            .unwrap();
        assert_eq!(filter.params, vec![text("*F[*]*")]);
    }

    #[test]
    fn nul_byte_is_rejected() {
        let err = SqlTranslator
            .translate(&Criteria::and([
                Criteria::IsClass,
                Criteria::exact_short_name("Fo\0o"),
            ]))
            .unwrap_err();
        assert!(matches!(err, SearchError::UnsupportedCriteria { .. }));
    }

    #[test]
    fn record_type_prefilter() {
        let filter = RecordTypeTranslator
            .translate(&Criteria::IsConstant)
            .unwrap();
        let constant = SearchEntry {
            record_type: RecordType::Constant,
            identifier: "X".to_string(),
            class_type: None,
            flags: 0,
        };
        assert!(filter.admits(&constant));
        assert!(!filter.admits(&SearchEntry {
            record_type: RecordType::Function,
            ..constant.clone()
        }));
    }
}
