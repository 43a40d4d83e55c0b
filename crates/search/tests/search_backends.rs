use pretty_assertions::assert_eq;
use proptest::prelude::*;
use symbol_record::{ClassRecord, ClassType, ConstantRecord, FunctionRecord, Location, Record};
use symbol_search::{open_search_index, Criteria, SearchEntry, SearchIndex};
use symbol_store::Backend;
use tempfile::TempDir;

const BACKENDS: [Backend; 2] = [Backend::File, Backend::Sqlite];

fn open(backend: Backend) -> (Box<dyn SearchIndex>, TempDir) {
    let temp = TempDir::new().expect("tempdir");
    let index = open_search_index(backend, temp.path(), 1_000).expect("open search index");
    (index, temp)
}

fn identifiers(index: &mut dyn SearchIndex, criteria: &Criteria) -> Vec<String> {
    let mut found: Vec<String> = index
        .search(criteria)
        .expect("search")
        .map(|entry| entry.expect("entry").identifier)
        .collect();
    found.sort();
    found
}

fn class(fqn: &str, class_type: ClassType) -> Record {
    Record::from(
        ClassRecord::from_name(fqn)
            .with_type(class_type)
            .with_location(Location::new("/src/a.php", 0, 1)),
    )
}

#[test]
fn class_short_name_scenario() {
    for backend in BACKENDS {
        let (mut index, _temp) = open(backend);
        index
            .write(&Record::from(
                ClassRecord::from_name("App\\Foo")
                    .with_type(ClassType::Class)
                    .with_location(Location::new("/src/Foo.php", 10, 30))
                    .with_flags(ClassRecord::FLAG_ATTRIBUTE),
            ))
            .expect("write");
        index
            .write(&Record::from(FunctionRecord::from_name("App\\Foo")))
            .expect("write");

        let criteria = Criteria::and([Criteria::IsClass, Criteria::exact_short_name("Foo")]);
        let hits: Vec<SearchEntry> = index
            .search(&criteria)
            .expect("search")
            .map(|entry| entry.expect("entry"))
            .collect();
        assert_eq!(hits.len(), 1, "backend {}", backend.as_str());
        assert_eq!(hits[0].identifier, "App\\Foo");
        assert_eq!(hits[0].class_type, Some(ClassType::Class));
        assert_eq!(hits[0].flags, ClassRecord::FLAG_ATTRIBUTE);
    }
}

#[test]
fn search_sees_unflushed_writes() {
    for backend in BACKENDS {
        let (mut index, _temp) = open(backend);
        index
            .write(&Record::from(ConstantRecord::from_name("App\\VERSION")))
            .expect("write");
        assert_eq!(
            identifiers(index.as_mut(), &Criteria::IsConstant),
            vec!["App\\VERSION".to_string()]
        );
    }
}

#[test]
fn reset_only_clears_classes() {
    for backend in BACKENDS {
        let (mut index, _temp) = open(backend);
        index.write(&class("App\\Foo", ClassType::Class)).expect("write");
        index
            .write(&Record::from(FunctionRecord::from_name("App\\foo")))
            .expect("write");
        index
            .write(&Record::from(ConstantRecord::from_name("App\\FOO")))
            .expect("write");

        index.reset().expect("reset");

        let everything = Criteria::fqn_begins_with("App\\");
        assert_eq!(
            identifiers(index.as_mut(), &everything),
            vec!["App\\FOO".to_string(), "App\\foo".to_string()],
            "backend {}",
            backend.as_str()
        );
    }
}

#[test]
fn rewrite_updates_class_type() {
    for backend in BACKENDS {
        let (mut index, _temp) = open(backend);
        index.write(&class("App\\Foo", ClassType::Class)).expect("write");
        index.flush().expect("flush");
        index
            .write(&class("App\\Foo", ClassType::Interface))
            .expect("write");

        assert_eq!(
            identifiers(index.as_mut(), &Criteria::IsClassType(ClassType::Interface)),
            vec!["App\\Foo".to_string()]
        );
        assert!(identifiers(index.as_mut(), &Criteria::IsClassType(ClassType::Class)).is_empty());
    }
}

#[test]
fn remove_requires_exact_triple() {
    for backend in BACKENDS {
        let (mut index, _temp) = open(backend);
        index.write(&class("App\\Foo", ClassType::Class)).expect("write");

        index.remove(&class("App\\Foo", ClassType::Enum)).expect("remove");
        assert_eq!(identifiers(index.as_mut(), &Criteria::IsClass).len(), 1);

        index.remove(&class("App\\Foo", ClassType::Class)).expect("remove");
        assert!(identifiers(index.as_mut(), &Criteria::IsClass).is_empty());
    }
}

#[test]
fn deferred_flush_reports_full_batches() {
    for backend in BACKENDS {
        let temp = TempDir::new().expect("tempdir");
        let mut index = open_search_index(backend, temp.path(), 2).expect("open search index");
        index.set_auto_flush(false);

        index
            .write(&Record::from(FunctionRecord::from_name("App\\a")))
            .expect("write");
        assert!(!index.is_full(), "backend {}", backend.as_str());
        index
            .write(&Record::from(FunctionRecord::from_name("App\\b")))
            .expect("write");
        index
            .write(&Record::from(FunctionRecord::from_name("App\\c")))
            .expect("write");
        assert!(index.is_full());

        index.flush().expect("flush");
        assert!(!index.is_full());
        assert_eq!(
            identifiers(index.as_mut(), &Criteria::IsFunction),
            vec!["App\\a".to_string(), "App\\b".to_string(), "App\\c".to_string()]
        );
    }
}

fn segment() -> impl Strategy<Value = String> {
    "[AaBb*?\\[]{1,3}"
}

fn fqn() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..3).prop_map(|segments| segments.join("\\"))
}

fn record() -> impl Strategy<Value = Record> {
    (fqn(), 0..3u8).prop_map(|(fqn, kind)| match kind {
        0 => class(&fqn, ClassType::Class),
        1 => Record::from(FunctionRecord::from_name(fqn)),
        _ => Record::from(ConstantRecord::from_name(fqn)),
    })
}

fn criteria() -> impl Strategy<Value = Criteria> {
    let leaf = prop_oneof![
        segment().prop_map(Criteria::ExactShortName),
        segment().prop_map(Criteria::ShortNameBeginsWith),
        fqn().prop_map(Criteria::FqnBeginsWith),
        Just(Criteria::IsClass),
        Just(Criteria::IsFunction),
        Just(Criteria::IsConstant),
        Just(Criteria::IsClassType(ClassType::Class)),
    ];
    leaf.prop_recursive(2, 6, 3, |inner| {
        prop::collection::vec(inner, 0..3).prop_map(Criteria::And)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn search_yields_exactly_the_matching_entries(
        records in prop::collection::vec(record(), 0..12),
        criteria in criteria(),
    ) {
        let mut expected: Vec<(String, String)> = records
            .iter()
            .filter_map(SearchEntry::from_record)
            .filter(|entry| criteria.matches(entry))
            .map(|entry| (entry.record_type.to_string(), entry.identifier))
            .collect();
        expected.sort();
        expected.dedup();

        for backend in BACKENDS {
            let (mut index, _temp) = open(backend);
            for record in &records {
                index.write(record).expect("write");
            }

            let mut found: Vec<(String, String)> = index
                .search(&criteria)
                .expect("search")
                .map(|entry| {
                    let entry = entry.expect("entry");
                    (entry.record_type.to_string(), entry.identifier)
                })
                .collect();
            found.sort();

            for hit in &found {
                prop_assert!(expected.contains(hit), "false positive {hit:?}");
            }
            prop_assert_eq!(&found, &expected, "backend {}", backend.as_str());
        }
    }
}
