use crate::error::ParseError;
use crate::reference::{Location, RecordReference};
use crate::uri::normalize_uri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Separator between namespace segments of a fully qualified name.
pub const NAMESPACE_SEPARATOR: char = '\\';

/// Last segment of a fully qualified name (`App\Foo` -> `Foo`).
#[must_use]
pub fn short_name(fqn: &str) -> &str {
    fqn.rsplit(NAMESPACE_SEPARATOR).next().unwrap_or(fqn)
}

/// Discriminator of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Class,
    Function,
    Constant,
    Member,
    File,
}

impl RecordType {
    pub const ALL: [Self; 5] = [
        Self::Class,
        Self::Function,
        Self::Constant,
        Self::Member,
        Self::File,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Function => "function",
            Self::Constant => "constant",
            Self::Member => "member",
            Self::File => "file",
        }
    }

    /// Whether records of this type are projected into the search index.
    #[must_use]
    pub const fn is_searchable(self) -> bool {
        matches!(self, Self::Class | Self::Function | Self::Constant)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ParseError::new("record type", s))
    }
}

/// Storage address of a record: `record_type` + identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    record_type: RecordType,
    identifier: String,
}

impl RecordKey {
    pub fn new(record_type: RecordType, identifier: impl Into<String>) -> Self {
        Self {
            record_type,
            identifier: identifier.into(),
        }
    }

    pub fn class(fqn: impl Into<String>) -> Self {
        Self::new(RecordType::Class, fqn)
    }

    pub fn function(fqn: impl Into<String>) -> Self {
        Self::new(RecordType::Function, fqn)
    }

    pub fn constant(fqn: impl Into<String>) -> Self {
        Self::new(RecordType::Constant, fqn)
    }

    pub fn member(member_type: MemberType, member_name: &str) -> Self {
        Self::new(
            RecordType::Member,
            MemberRecord::identifier_for(member_type, member_name),
        )
    }

    /// Key of a file record; `path` is normalized to a URI.
    pub fn file(path: &str) -> Self {
        Self::new(RecordType::File, normalize_uri(path))
    }

    #[must_use]
    pub const fn record_type(&self) -> RecordType {
        self.record_type
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Flat string form used by write buffers and content-addressed paths.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.record_type.as_str(), self.identifier)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_type, self.identifier)
    }
}

/// Records that carry a definition location.
pub trait HasPath {
    fn location(&self) -> Option<&Location>;

    fn set_location(&mut self, location: Location);

    fn file_path(&self) -> Option<&str> {
        self.location().map(|location| location.uri.as_str())
    }
}

/// Records identified by a fully qualified name.
pub trait HasFqn {
    fn fqn(&self) -> &str;

    fn short_name(&self) -> &str {
        short_name(self.fqn())
    }
}

pub trait HasFlags {
    fn flags(&self) -> u32;

    fn set_flags(&mut self, flags: u32);

    fn has_flag(&self, flag: u32) -> bool {
        self.flags() & flag == flag
    }
}

/// Records that keep the set of files mentioning them.
pub trait HasFileReferences {
    fn references(&self) -> &BTreeSet<String>;

    fn add_reference(&mut self, file_uri: &str);

    fn remove_reference(&mut self, file_uri: &str) -> bool;
}

/// Declared kind of a class-like symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    Class,
    Interface,
    Trait,
    Enum,
}

impl ClassType {
    pub const ALL: [Self; 4] = [Self::Class, Self::Interface, Self::Trait, Self::Enum];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Enum => "enum",
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ParseError::new("class type", s))
    }
}

/// A class, interface, trait or enum declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub fqn: String,

    /// Unresolved until the declaration has been parsed
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub class_type: Option<ClassType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default)]
    pub flags: u32,
}

impl ClassRecord {
    /// Class is usable as an attribute.
    pub const FLAG_ATTRIBUTE: u32 = 1;

    pub fn from_name(fqn: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            class_type: None,
            location: None,
            flags: 0,
        }
    }

    #[must_use]
    pub fn with_type(mut self, class_type: ClassType) -> Self {
        self.class_type = Some(class_type);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }
}

impl HasPath for ClassRecord {
    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }
}

impl HasFqn for ClassRecord {
    fn fqn(&self) -> &str {
        &self.fqn
    }
}

impl HasFlags for ClassRecord {
    fn flags(&self) -> u32 {
        self.flags
    }

    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
}

/// A free function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub fqn: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl FunctionRecord {
    pub fn from_name(fqn: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl HasPath for FunctionRecord {
    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }
}

impl HasFqn for FunctionRecord {
    fn fqn(&self) -> &str {
        &self.fqn
    }
}

/// A global constant declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantRecord {
    pub fqn: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ConstantRecord {
    pub fn from_name(fqn: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl HasPath for ConstantRecord {
    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }
}

impl HasFqn for ConstantRecord {
    fn fqn(&self) -> &str {
        &self.fqn
    }
}

/// Kind of class member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Method,
    Property,
    Constant,
}

impl MemberType {
    pub const ALL: [Self; 3] = [Self::Method, Self::Property, Self::Constant];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Property => "property",
            Self::Constant => "constant",
        }
    }
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ParseError::new("member type", s))
    }
}

/// A class member (method, property, class constant) and the files that use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub member_type: MemberType,
    pub member_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<String>,

    /// URIs of files referencing this member
    #[serde(default)]
    pub references: BTreeSet<String>,
}

impl MemberRecord {
    const ID_SEPARATOR: char = '#';

    pub fn new(member_type: MemberType, member_name: impl Into<String>) -> Self {
        Self {
            member_type,
            member_name: member_name.into(),
            container_type: None,
            references: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_container_type(mut self, container_type: impl Into<String>) -> Self {
        self.container_type = Some(container_type.into());
        self
    }

    #[must_use]
    pub fn identifier_for(member_type: MemberType, member_name: &str) -> String {
        format!("{}{}{member_name}", member_type.as_str(), Self::ID_SEPARATOR)
    }

    #[must_use]
    pub fn identifier(&self) -> String {
        Self::identifier_for(self.member_type, &self.member_name)
    }

    /// Whether `identifier` has the `member_type#member_name` shape.
    #[must_use]
    pub fn is_identifier(identifier: &str) -> bool {
        Self::from_identifier(identifier).is_ok()
    }

    pub fn from_identifier(identifier: &str) -> Result<Self, ParseError> {
        let (member_type, member_name) = identifier
            .split_once(Self::ID_SEPARATOR)
            .ok_or_else(|| ParseError::new("member identifier", identifier))?;
        if member_name.is_empty() {
            return Err(ParseError::new("member identifier", identifier));
        }
        Ok(Self::new(member_type.parse()?, member_name))
    }
}

impl HasFileReferences for MemberRecord {
    fn references(&self) -> &BTreeSet<String> {
        &self.references
    }

    fn add_reference(&mut self, file_uri: &str) {
        self.references.insert(normalize_uri(file_uri));
    }

    fn remove_reference(&mut self, file_uri: &str) -> bool {
        self.references.remove(&normalize_uri(file_uri))
    }
}

/// Per-file bookkeeping: when it was indexed and what it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Normalized URI
    pub path: String,

    /// Unix milliseconds of the last successful indexing of this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_indexed: Option<i64>,

    #[serde(default)]
    pub references: Vec<RecordReference>,
}

impl FileRecord {
    pub fn from_path(path: &str) -> Self {
        Self {
            path: normalize_uri(path),
            last_indexed: None,
            references: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_last_indexed(mut self, timestamp: i64) -> Self {
        self.last_indexed = Some(timestamp);
        self
    }

    pub fn add_reference(&mut self, reference: RecordReference) {
        self.references.push(reference);
    }

    /// References in this file pointing at the given record.
    pub fn references_to<'a>(
        &'a self,
        record_type: RecordType,
        identifier: &'a str,
    ) -> impl Iterator<Item = &'a RecordReference> + 'a {
        self.references
            .iter()
            .filter(move |reference| reference.points_to(record_type, identifier))
    }
}

/// One indexed fact about a symbol or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum Record {
    Class(ClassRecord),
    Function(FunctionRecord),
    Constant(ConstantRecord),
    Member(MemberRecord),
    File(FileRecord),
}

impl Record {
    /// Bare record for `record_type` + `identifier`, with every optional field unset.
    pub fn prototype(record_type: RecordType, identifier: &str) -> Result<Self, ParseError> {
        Ok(match record_type {
            RecordType::Class => Self::Class(ClassRecord::from_name(identifier)),
            RecordType::Function => Self::Function(FunctionRecord::from_name(identifier)),
            RecordType::Constant => Self::Constant(ConstantRecord::from_name(identifier)),
            RecordType::Member => Self::Member(MemberRecord::from_identifier(identifier)?),
            RecordType::File => Self::File(FileRecord::from_path(identifier)),
        })
    }

    #[must_use]
    pub const fn record_type(&self) -> RecordType {
        match self {
            Self::Class(_) => RecordType::Class,
            Self::Function(_) => RecordType::Function,
            Self::Constant(_) => RecordType::Constant,
            Self::Member(_) => RecordType::Member,
            Self::File(_) => RecordType::File,
        }
    }

    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            Self::Class(record) => record.fqn.clone(),
            Self::Function(record) => record.fqn.clone(),
            Self::Constant(record) => record.fqn.clone(),
            Self::Member(record) => record.identifier(),
            Self::File(record) => record.path.clone(),
        }
    }

    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.record_type(), self.identifier())
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&dyn HasPath> {
        match self {
            Self::Class(record) => Some(record),
            Self::Function(record) => Some(record),
            Self::Constant(record) => Some(record),
            Self::Member(_) | Self::File(_) => None,
        }
    }

    #[must_use]
    pub fn as_fqn(&self) -> Option<&dyn HasFqn> {
        match self {
            Self::Class(record) => Some(record),
            Self::Function(record) => Some(record),
            Self::Constant(record) => Some(record),
            Self::Member(_) | Self::File(_) => None,
        }
    }

    #[must_use]
    pub fn as_flags(&self) -> Option<&dyn HasFlags> {
        match self {
            Self::Class(record) => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_file_references(&self) -> Option<&dyn HasFileReferences> {
        match self {
            Self::Member(record) => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        self.as_path().and_then(|record| record.location())
    }

    #[must_use]
    pub fn short_name(&self) -> Option<&str> {
        self.as_fqn().map(|record| record.short_name())
    }

    #[must_use]
    pub fn flags(&self) -> u32 {
        self.as_flags().map_or(0, |record| record.flags())
    }

    /// Referenced but not (yet) known to be defined: a definition-carrying
    /// record without a location.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.as_path().is_some_and(|record| record.location().is_none())
    }

    /// Class records without a resolved type are speculative and must not be persisted.
    #[must_use]
    pub fn is_speculative(&self) -> bool {
        matches!(self, Self::Class(record) if record.class_type.is_none())
    }
}

impl From<ClassRecord> for Record {
    fn from(record: ClassRecord) -> Self {
        Self::Class(record)
    }
}

impl From<FunctionRecord> for Record {
    fn from(record: FunctionRecord) -> Self {
        Self::Function(record)
    }
}

impl From<ConstantRecord> for Record {
    fn from(record: ConstantRecord) -> Self {
        Self::Constant(record)
    }
}

impl From<MemberRecord> for Record {
    fn from(record: MemberRecord) -> Self {
        Self::Member(record)
    }
}

impl From<FileRecord> for Record {
    fn from(record: FileRecord) -> Self {
        Self::File(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn member_identifier_roundtrip() {
        let member = MemberRecord::new(MemberType::Method, "foobar");
        assert_eq!(member.identifier(), "method#foobar");

        let parsed = MemberRecord::from_identifier("method#foobar").unwrap();
        assert_eq!(parsed.member_type, MemberType::Method);
        assert_eq!(parsed.member_name, "foobar");
    }

    #[test]
    fn malformed_member_identifiers_are_rejected() {
        assert!(!MemberRecord::is_identifier("foobar"));
        assert!(!MemberRecord::is_identifier("method#"));
        assert!(!MemberRecord::is_identifier("closure#foo"));
        assert!(MemberRecord::is_identifier("property#bar"));
    }

    #[test]
    fn short_name_takes_last_segment() {
        assert_eq!(short_name("App\\Domain\\Foo"), "Foo");
        assert_eq!(short_name("strlen"), "strlen");
    }

    #[test]
    fn placeholder_until_located() {
        let mut record = Record::from(FunctionRecord::from_name("App\\helper"));
        assert!(record.is_placeholder());

        if let Record::Function(function) = &mut record {
            function.set_location(Location::new("/src/helpers.php", 3, 40));
        }
        assert!(!record.is_placeholder());
        assert!(!Record::from(FileRecord::from_path("/a.php")).is_placeholder());
    }

    #[test]
    fn untyped_class_is_speculative() {
        assert!(Record::from(ClassRecord::from_name("Foo")).is_speculative());
        assert!(!Record::from(ClassRecord::from_name("Foo").with_type(ClassType::Trait))
            .is_speculative());
    }

    #[test]
    fn key_matches_prototype_key() {
        let record = Record::from(MemberRecord::new(MemberType::Property, "name"));
        let prototype = Record::prototype(RecordType::Member, "property#name").unwrap();

        assert_eq!(record.key(), prototype.key());
        assert_eq!(record.key().storage_key(), "memberproperty#name");
        assert_eq!(RecordKey::file("/a.php").identifier(), "file:///a.php");
    }

    #[test]
    fn record_serializes_with_discriminator() {
        let record = Record::from(
            ClassRecord::from_name("App\\Foo")
                .with_type(ClassType::Interface)
                .with_flags(ClassRecord::FLAG_ATTRIBUTE),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["record_type"], "class");
        assert_eq!(json["type"], "interface");

        let decoded: Record = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn file_references_filter_by_target() {
        let mut file = FileRecord::from_path("/src/a.php");
        file.add_reference(RecordReference::new(RecordType::Member, "method#run", 1, 4));
        file.add_reference(RecordReference::new(RecordType::Class, "App\\Foo", 8, 11));
        file.add_reference(RecordReference::new(RecordType::Member, "method#run", 20, 23));

        let hits: Vec<u32> = file
            .references_to(RecordType::Member, "method#run")
            .map(|reference| reference.start)
            .collect();
        assert_eq!(hits, vec![1, 20]);
    }
}
