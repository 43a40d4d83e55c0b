//! # Symbol Record
//!
//! Typed facts stored by the symbol index: one record per declared symbol
//! (class, function, constant, class member) and one per indexed file.
//!
//! ## Model
//!
//! ```text
//! Record (tagged by record_type)
//!     │
//!     ├──> Class     fqn, type, location, flags
//!     ├──> Function  fqn, location
//!     ├──> Constant  fqn, location
//!     ├──> Member    member_type#member_name, container_type, back-references
//!     └──> File      uri, last_indexed, outbound references
//! ```
//!
//! A record is addressed by its [`RecordKey`] (`record_type` + identifier).
//! Class, function and constant records whose location is still unknown are
//! *placeholders*: the symbol is known to be referenced, not yet defined.
//!
//! ## Example
//!
//! ```rust
//! use symbol_record::{ClassRecord, ClassType, Location, Record, RecordKey};
//!
//! let class = ClassRecord::from_name("App\\Foo")
//!     .with_type(ClassType::Class)
//!     .with_location(Location::new("/src/Foo.php", 10, 30));
//! let record = Record::from(class);
//!
//! assert_eq!(record.key(), RecordKey::class("App\\Foo"));
//! assert_eq!(record.short_name(), Some("Foo"));
//! assert!(!record.is_placeholder());
//! ```

mod error;
mod record;
mod reference;
mod uri;

pub use error::ParseError;
pub use record::{
    short_name, ClassRecord, ClassType, ConstantRecord, FileRecord, FunctionRecord, HasFileReferences,
    HasFlags, HasFqn, HasPath, MemberRecord, MemberType, Record, RecordKey, RecordType,
    NAMESPACE_SEPARATOR,
};
pub use reference::{Confidence, Location, LocationConfidence, RecordReference};
pub use uri::{normalize_uri, uri_to_path};
