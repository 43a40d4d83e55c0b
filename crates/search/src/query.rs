use crate::error::Result;
use symbol_record::{
    ClassRecord, ConstantRecord, FileRecord, FunctionRecord, Location, LocationConfidence,
    MemberRecord, MemberType, Record, RecordKey, RecordReference, RecordType,
};
use symbol_store::RecordStore;

/// Best-effort resolution of a member reference's container type.
pub trait ReferenceEnhancer {
    fn enhance(&self, file: &FileRecord, reference: RecordReference) -> RecordReference;
}

/// Enhancer that leaves references untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReferenceEnhancer;

impl ReferenceEnhancer for NullReferenceEnhancer {
    fn enhance(&self, _file: &FileRecord, reference: RecordReference) -> RecordReference {
        reference
    }
}

/// Read-side facade over a record store.
///
/// Readers may run while an indexing pass is writing: missing or placeholder
/// records are normal and read as `None`, never as errors.
pub struct QueryClient<'a> {
    store: &'a dyn RecordStore,
    enhancer: &'a dyn ReferenceEnhancer,
}

impl<'a> QueryClient<'a> {
    pub fn new(store: &'a dyn RecordStore, enhancer: &'a dyn ReferenceEnhancer) -> Self {
        Self { store, enhancer }
    }

    pub fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        Ok(self.store.get(key)?)
    }

    pub fn class(&self, fqn: &str) -> Result<Option<ClassRecord>> {
        Ok(match self.get(&RecordKey::class(fqn))? {
            Some(Record::Class(record)) => Some(record),
            _ => None,
        })
    }

    pub fn function(&self, fqn: &str) -> Result<Option<FunctionRecord>> {
        Ok(match self.get(&RecordKey::function(fqn))? {
            Some(Record::Function(record)) => Some(record),
            _ => None,
        })
    }

    pub fn constant(&self, fqn: &str) -> Result<Option<ConstantRecord>> {
        Ok(match self.get(&RecordKey::constant(fqn))? {
            Some(Record::Constant(record)) => Some(record),
            _ => None,
        })
    }

    pub fn file(&self, path: &str) -> Result<Option<FileRecord>> {
        Ok(match self.get(&RecordKey::file(path))? {
            Some(Record::File(record)) => Some(record),
            _ => None,
        })
    }

    pub fn member(&self, member_type: MemberType, member_name: &str) -> Result<Option<MemberRecord>> {
        Ok(match self.get(&RecordKey::member(member_type, member_name))? {
            Some(Record::Member(record)) => Some(record),
            _ => None,
        })
    }

    /// Member by `member_type#member_name`; malformed identifiers read as `None`.
    pub fn member_by_identifier(&self, identifier: &str) -> Result<Option<MemberRecord>> {
        match MemberRecord::from_identifier(identifier) {
            Ok(prototype) => self.member(prototype.member_type, &prototype.member_name),
            Err(_) => Ok(None),
        }
    }

    /// Where the record is defined. Placeholders have no definition yet.
    pub fn definition(&self, key: &RecordKey) -> Result<Option<Location>> {
        Ok(self
            .get(key)?
            .filter(|record| !record.is_placeholder())
            .and_then(|record| record.location().cloned()))
    }

    /// Locations referencing a member, each with the certainty that the
    /// reference is to a member of `container_type`.
    ///
    /// Files are loaded one at a time as the sequence is consumed.
    pub fn references_to(
        &self,
        member_type: MemberType,
        member_name: &str,
        container_type: Option<&str>,
    ) -> Result<MemberReferences<'a>> {
        let files = match self.member(member_type, member_name)? {
            Some(member) => member.references.into_iter().collect(),
            None => Vec::new(),
        };

        Ok(MemberReferences {
            store: self.store,
            enhancer: self.enhancer,
            identifier: MemberRecord::identifier_for(member_type, member_name),
            container_type: container_type.map(str::to_string),
            files: files.into_iter(),
            pending: Vec::new().into_iter(),
        })
    }
}

/// Lazy sequence produced by [`QueryClient::references_to`].
pub struct MemberReferences<'a> {
    store: &'a dyn RecordStore,
    enhancer: &'a dyn ReferenceEnhancer,
    identifier: String,
    container_type: Option<String>,
    files: std::vec::IntoIter<String>,
    pending: std::vec::IntoIter<LocationConfidence>,
}

impl MemberReferences<'_> {
    fn resolve(&self, file: &FileRecord) -> Vec<LocationConfidence> {
        file.references_to(RecordType::Member, &self.identifier)
            .cloned()
            .map(|reference| {
                let reference = if self.container_type.is_some() && reference.container_type.is_none()
                {
                    self.enhancer.enhance(file, reference)
                } else {
                    reference
                };
                let location = Location {
                    uri: file.path.clone(),
                    start: reference.start,
                    end: reference.end,
                };

                match (&reference.container_type, &self.container_type) {
                    (None, _) => LocationConfidence::maybe(location),
                    (Some(actual), Some(wanted)) if actual != wanted => {
                        LocationConfidence::not(location)
                    }
                    _ => LocationConfidence::surely(location),
                }
            })
            .collect()
    }
}

impl Iterator for MemberReferences<'_> {
    type Item = Result<LocationConfidence>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.pending.next() {
                return Some(Ok(found));
            }

            let uri = self.files.next()?;
            match self.store.get(&RecordKey::file(&uri)) {
                Ok(Some(Record::File(file))) => self.pending = self.resolve(&file).into_iter(),
                Ok(_) => log::debug!("Referencing file {uri} is no longer indexed"),
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use symbol_record::{ClassType, Confidence};
    use symbol_store::FileRecordStore;
    use tempfile::TempDir;

    struct FixedEnhancer(&'static str);

    impl ReferenceEnhancer for FixedEnhancer {
        fn enhance(&self, _file: &FileRecord, reference: RecordReference) -> RecordReference {
            reference.with_container_type(self.0)
        }
    }

    fn seeded_store() -> (FileRecordStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut store = FileRecordStore::open(dir.path()).unwrap();

        let mut member = MemberRecord::new(MemberType::Method, "save");
        member.references.insert("file:///src/a.php".to_string());
        member.references.insert("file:///src/gone.php".to_string());
        store.write(Record::from(member)).unwrap();

        let mut file = FileRecord::from_path("/src/a.php").with_last_indexed(1);
        file.add_reference(
            RecordReference::new(RecordType::Member, "method#save", 10, 14)
                .with_container_type("App\\Repo"),
        );
        file.add_reference(
            RecordReference::new(RecordType::Member, "method#save", 30, 34)
                .with_container_type("App\\Other"),
        );
        file.add_reference(RecordReference::new(RecordType::Member, "method#save", 50, 54));
        file.add_reference(RecordReference::new(RecordType::Member, "method#load", 70, 74));
        store.write(Record::from(file)).unwrap();

        store
            .write(Record::from(
                ClassRecord::from_name("App\\Repo").with_type(ClassType::Class),
            ))
            .unwrap();

        (store, dir)
    }

    fn confidences(references: MemberReferences<'_>) -> Vec<(u32, Confidence)> {
        references
            .map(|found| {
                let found = found.unwrap();
                (found.location.start, found.confidence)
            })
            .collect()
    }

    #[test]
    fn references_are_graded_against_container() {
        let (store, _dir) = seeded_store();
        let client = QueryClient::new(&store, &NullReferenceEnhancer);

        let found = client
            .references_to(MemberType::Method, "save", Some("App\\Repo"))
            .unwrap();
        assert_eq!(
            confidences(found),
            vec![
                (10, Confidence::Surely),
                (30, Confidence::Not),
                (50, Confidence::Maybe),
            ]
        );
    }

    #[test]
    fn without_container_known_types_are_sure() {
        let (store, _dir) = seeded_store();
        let enhancer = FixedEnhancer("App\\Repo");
        let client = QueryClient::new(&store, &enhancer);

        let found = client
            .references_to(MemberType::Method, "save", None)
            .unwrap();
        assert_eq!(
            confidences(found),
            vec![
                (10, Confidence::Surely),
                (30, Confidence::Surely),
                (50, Confidence::Maybe),
            ]
        );
    }

    #[test]
    fn enhancer_resolves_unknown_containers() {
        let (store, _dir) = seeded_store();
        let enhancer = FixedEnhancer("App\\Repo");
        let client = QueryClient::new(&store, &enhancer);

        let found = client
            .references_to(MemberType::Method, "save", Some("App\\Repo"))
            .unwrap();
        assert_eq!(
            confidences(found),
            vec![
                (10, Confidence::Surely),
                (30, Confidence::Not),
                (50, Confidence::Surely),
            ]
        );
    }

    #[test]
    fn unknown_member_has_no_references() {
        let (store, _dir) = seeded_store();
        let client = QueryClient::new(&store, &NullReferenceEnhancer);
        assert_eq!(
            client
                .references_to(MemberType::Property, "save", None)
                .unwrap()
                .count(),
            0
        );
        assert_eq!(client.member_by_identifier("save").unwrap(), None);
        assert!(client
            .member_by_identifier("method#save")
            .unwrap()
            .is_some());
    }

    #[test]
    fn placeholder_has_no_definition() {
        let dir = TempDir::new().unwrap();
        let mut store = FileRecordStore::open(dir.path()).unwrap();
        store
            .write(Record::from(FunctionRecord::from_name("App\\later")))
            .unwrap();
        store
            .write(Record::from(
                FunctionRecord::from_name("App\\now").with_location(Location::new("/f.php", 4, 9)),
            ))
            .unwrap();

        let client = QueryClient::new(&store, &NullReferenceEnhancer);
        assert!(client.function("App\\later").unwrap().is_some());
        assert_eq!(
            client.definition(&RecordKey::function("App\\later")).unwrap(),
            None
        );
        assert_eq!(
            client.definition(&RecordKey::function("App\\now")).unwrap(),
            Some(Location::new("/f.php", 4, 9))
        );
    }
}
