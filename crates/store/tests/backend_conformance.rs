use pretty_assertions::assert_eq;
use symbol_record::{
    ClassRecord, ClassType, ConstantRecord, FileRecord, FunctionRecord, Location, MemberRecord,
    MemberType, Record, RecordKey, RecordReference, RecordType,
};
use symbol_store::{open_store, Backend, RecordStore};
use tempfile::TempDir;

const BACKENDS: [Backend; 2] = [Backend::File, Backend::Sqlite];

fn open(backend: Backend) -> (Box<dyn RecordStore>, TempDir) {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(backend, temp.path()).expect("open store");
    (store, temp)
}

fn sample_records() -> Vec<Record> {
    let mut member = MemberRecord::new(MemberType::Method, "handle").with_container_type("App\\Foo");
    member.references.insert("file:///src/Bar.php".to_string());
    member.references.insert("file:///src/Baz.php".to_string());

    let mut file = FileRecord::from_path("/src/Bar.php").with_last_indexed(1_700_000_000);
    file.add_reference(
        RecordReference::new(RecordType::Member, "method#handle", 40, 46)
            .with_container_type("App\\Foo"),
    );
    file.add_reference(
        RecordReference::new(RecordType::Class, "App\\Foo", 12, 15)
            .with_flags(RecordReference::FLAG_NEW_OBJECT),
    );

    vec![
        Record::from(
            ClassRecord::from_name("App\\Foo")
                .with_type(ClassType::Class)
                .with_location(Location::new("/src/Foo.php", 10, 30))
                .with_flags(ClassRecord::FLAG_ATTRIBUTE),
        ),
        Record::from(
            FunctionRecord::from_name("App\\helper")
                .with_location(Location::new("/src/helpers.php", 5, 80)),
        ),
        Record::from(FunctionRecord::from_name("App\\unresolved")),
        Record::from(
            ConstantRecord::from_name("App\\VERSION")
                .with_location(Location::new("/src/consts.php", 0, 20)),
        ),
        Record::from(member),
        Record::from(file),
    ]
}

#[test]
fn every_variant_round_trips() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        for record in sample_records() {
            store.write(record.clone()).expect("write");
            let stored = store.get(&record.key()).expect("get");
            assert_eq!(stored, Some(record), "backend {}", backend.as_str());
        }
    }
}

#[test]
fn batch_write_matches_single_writes() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        let records = sample_records();
        store.write_batch(records.clone()).expect("write batch");
        for record in records {
            assert!(store.has(&record.key()).expect("has"));
        }
    }
}

#[test]
fn class_scenario_with_reset() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        let key = RecordKey::class("App\\Foo");
        store
            .write(Record::from(
                ClassRecord::from_name("App\\Foo")
                    .with_type(ClassType::Class)
                    .with_location(Location::new("/src/Foo.php", 10, 30))
                    .with_flags(ClassRecord::FLAG_ATTRIBUTE),
            ))
            .expect("write");
        assert!(store.has(&key).expect("has"));

        store.reset().expect("reset");
        assert!(!store.has(&key).expect("has after reset"));
    }
}

#[test]
fn unresolved_class_is_rejected() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        store
            .write(Record::from(ClassRecord::from_name("App\\Maybe")))
            .expect("write");
        assert!(!store.has(&RecordKey::class("App\\Maybe")).expect("has"));
    }
}

#[test]
fn freshness_is_monotonic_in_mtime() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        let stamp = 1_700_000_000;
        store
            .write(Record::from(
                FileRecord::from_path("/src/Foo.php").with_last_indexed(stamp),
            ))
            .expect("write");

        assert!(store.is_fresh("/src/Foo.php", stamp - 10).expect("fresh"));
        assert!(store.is_fresh("/src/Foo.php", stamp).expect("fresh"));
        assert!(!store.is_fresh("/src/Foo.php", stamp + 1).expect("stale"));
        assert!(!store.is_fresh("/src/Other.php", 0).expect("unknown"));
    }
}

#[test]
fn remove_deletes_single_record() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        let records = sample_records();
        store.write_batch(records.clone()).expect("write batch");

        let member_key = RecordKey::member(MemberType::Method, "handle");
        store.remove(&member_key).expect("remove member");
        store.remove(&RecordKey::file("/src/Bar.php")).expect("remove file");

        assert!(!store.has(&member_key).expect("has member"));
        assert!(!store.has(&RecordKey::file("/src/Bar.php")).expect("has file"));
        assert!(store.has(&RecordKey::class("App\\Foo")).expect("has class"));
    }
}

#[test]
fn sweep_drops_records_of_rejected_files() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        store.write_batch(sample_records()).expect("write batch");

        let mut removed = store
            .sweep(&mut |uri| uri != "file:///src/Foo.php" && uri != "file:///src/Bar.php")
            .expect("sweep");
        removed.sort_by_key(Record::key);

        let keys: Vec<RecordKey> = removed.iter().map(Record::key).collect();
        assert_eq!(
            keys,
            vec![RecordKey::class("App\\Foo"), RecordKey::file("/src/Bar.php")],
            "backend {}",
            backend.as_str()
        );
        assert!(store.has(&RecordKey::function("App\\helper")).expect("has"));
        assert!(store.has(&RecordKey::function("App\\unresolved")).expect("has"));
    }
}

#[test]
fn build_time_is_recorded() {
    for backend in BACKENDS {
        let (mut store, _temp) = open(backend);
        assert!(!store.exists().expect("exists"));
        store.mark_updated(1_700_000_123).expect("mark");
        assert_eq!(store.last_update().expect("last update"), 1_700_000_123);
        assert!(store.exists().expect("exists"));
    }
}
