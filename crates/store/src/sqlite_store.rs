use crate::error::Result;
use crate::schema::{ensure_tables, open_connection, recreate_tables, Table};
use crate::store::RecordStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use symbol_record::{
    normalize_uri, ClassRecord, ConstantRecord, FileRecord, FunctionRecord, Location,
    MemberRecord, Record, RecordKey, RecordReference, RecordType,
};

const LAST_UPDATE: &str = "last_update";

const TABLES: &[Table] = &[
    Table {
        name: "class_index",
        sql: r#"
            CREATE TABLE class_index (
                id        INTEGER PRIMARY KEY,
                type      TEXT    NOT NULL,
                fqn       TEXT    NOT NULL,
                "start"   INTEGER,
                "end"     INTEGER,
                file_path TEXT,
                flags     INTEGER NOT NULL DEFAULT 0,
                UNIQUE (type, fqn)
            );
            CREATE INDEX idx_class_index_fqn ON class_index(fqn);
            CREATE INDEX idx_class_index_file_path ON class_index(file_path);
        "#,
    },
    Table {
        name: "function_index",
        sql: r#"
            CREATE TABLE function_index (
                id        INTEGER PRIMARY KEY,
                fqn       TEXT    NOT NULL UNIQUE,
                "start"   INTEGER,
                "end"     INTEGER,
                file_path TEXT
            );
            CREATE INDEX idx_function_index_file_path ON function_index(file_path);
        "#,
    },
    Table {
        name: "constant_index",
        sql: r#"
            CREATE TABLE constant_index (
                id        INTEGER PRIMARY KEY,
                fqn       TEXT    NOT NULL UNIQUE,
                "start"   INTEGER,
                "end"     INTEGER,
                file_path TEXT
            );
            CREATE INDEX idx_constant_index_file_path ON constant_index(file_path);
        "#,
    },
    Table {
        name: "member_index",
        sql: "
            CREATE TABLE member_index (
                id             INTEGER PRIMARY KEY,
                type           TEXT NOT NULL,
                member_name    TEXT NOT NULL,
                container_type TEXT,
                UNIQUE (type, member_name)
            );
        ",
    },
    Table {
        name: "member_reference_index",
        sql: "
            CREATE TABLE member_reference_index (
                member_id INTEGER NOT NULL REFERENCES member_index(id) ON DELETE CASCADE,
                file_path TEXT    NOT NULL,
                PRIMARY KEY (member_id, file_path)
            );
        ",
    },
    Table {
        name: "file_index",
        sql: "
            CREATE TABLE file_index (
                id         INTEGER PRIMARY KEY,
                file_path  TEXT NOT NULL UNIQUE,
                updated_at INTEGER
            );
        ",
    },
    Table {
        name: "file_reference_index",
        sql: r#"
            CREATE TABLE file_reference_index (
                file_id        INTEGER NOT NULL REFERENCES file_index(id) ON DELETE CASCADE,
                position       INTEGER NOT NULL,
                record_type    TEXT    NOT NULL,
                identifier     TEXT    NOT NULL,
                "start"        INTEGER NOT NULL,
                "end"          INTEGER NOT NULL,
                container_type TEXT,
                flags          INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (file_id, position)
            );
        "#,
    },
    Table {
        name: "index_meta",
        sql: "
            CREATE TABLE index_meta (
                name  TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
        ",
    },
];

/// Record store backed by one SQLite table per record variant.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_connection(path)?;
        ensure_tables(&conn, TABLES)?;
        Ok(Self { conn })
    }
}

impl RecordStore for SqliteRecordStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        get_record(&self.conn, key)
    }

    fn write(&mut self, record: Record) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_record(&tx, &record)?;
        tx.commit()?;
        Ok(())
    }

    fn write_batch(&mut self, records: Vec<Record>) -> Result<()> {
        let tx = self.conn.transaction()?;
        for record in &records {
            write_record(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, key: &RecordKey) -> Result<()> {
        let tx = self.conn.transaction()?;
        remove_record(&tx, key)?;
        tx.commit()?;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        recreate_tables(&self.conn, TABLES)?;
        log::info!("Reset SQLite index");
        Ok(())
    }

    fn is_fresh(&self, path: &str, mtime: i64) -> Result<bool> {
        let updated_at: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT updated_at FROM file_index WHERE file_path = ?1",
                [normalize_uri(path)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated_at.flatten().is_some_and(|stamp| mtime <= stamp))
    }

    fn last_update(&self) -> Result<i64> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM index_meta WHERE name = ?1",
                [LAST_UPDATE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0))
    }

    fn mark_updated(&mut self, timestamp: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO index_meta (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![LAST_UPDATE, timestamp],
        )?;
        Ok(())
    }

    fn sweep(&mut self, keep: &mut dyn FnMut(&str) -> bool) -> Result<Vec<Record>> {
        let mut candidates = Vec::new();
        for (record_type, table, column) in [
            (RecordType::File, "file_index", "file_path"),
            (RecordType::Class, "class_index", "fqn"),
            (RecordType::Function, "function_index", "fqn"),
            (RecordType::Constant, "constant_index", "fqn"),
        ] {
            let sql = format!(
                "SELECT DISTINCT {column}, file_path FROM {table} WHERE file_path IS NOT NULL"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (identifier, file_path) = row?;
                candidates.push((RecordKey::new(record_type, identifier), file_path));
            }
        }

        let mut verdicts: HashMap<String, bool> = HashMap::new();
        let mut removed = Vec::new();
        let tx = self.conn.transaction()?;
        for (key, file_path) in candidates {
            let keep_it = *verdicts
                .entry(file_path)
                .or_insert_with_key(|file_path| keep(file_path));
            if keep_it {
                continue;
            }
            if let Some(record) = get_record(&tx, &key)? {
                removed.push(record);
            }
            remove_record(&tx, &key)?;
        }
        tx.commit()?;

        Ok(removed)
    }
}

fn get_record(conn: &Connection, key: &RecordKey) -> Result<Option<Record>> {
    let identifier = key.identifier();
    Ok(match key.record_type() {
        RecordType::Class => get_class(conn, identifier)?,
        RecordType::Function => get_located(conn, "function_index", identifier)?.map(|location| {
            Record::from(FunctionRecord {
                fqn: identifier.to_string(),
                location,
            })
        }),
        RecordType::Constant => get_located(conn, "constant_index", identifier)?.map(|location| {
            Record::from(ConstantRecord {
                fqn: identifier.to_string(),
                location,
            })
        }),
        RecordType::Member => get_member(conn, identifier)?,
        RecordType::File => get_file(conn, &normalize_uri(identifier))?,
    })
}

fn location_from(
    start: Option<u32>,
    end: Option<u32>,
    file_path: Option<String>,
) -> Option<Location> {
    Some(Location {
        uri: file_path?,
        start: start?,
        end: end?,
    })
}

fn location_columns(location: Option<&Location>) -> (Option<u32>, Option<u32>, Option<&str>) {
    match location {
        Some(location) => (
            Some(location.start),
            Some(location.end),
            Some(location.uri.as_str()),
        ),
        None => (None, None, None),
    }
}

fn get_class(conn: &Connection, fqn: &str) -> Result<Option<Record>> {
    let row = conn
        .query_row(
            r#"SELECT type, "start", "end", file_path, flags
               FROM class_index WHERE fqn = ?1 ORDER BY id DESC LIMIT 1"#,
            [fqn],
            |row| -> rusqlite::Result<(String, Option<u32>, Option<u32>, Option<String>, u32)> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            },
        )
        .optional()?;
    let Some((class_type, start, end, file_path, flags)) = row else {
        return Ok(None);
    };

    Ok(Some(Record::from(ClassRecord {
        fqn: fqn.to_string(),
        class_type: Some(class_type.parse()?),
        location: location_from(start, end, file_path),
        flags,
    })))
}

/// Location of a function or constant row; outer `None` when there is no row.
fn get_located(conn: &Connection, table: &str, fqn: &str) -> Result<Option<Option<Location>>> {
    let sql = format!(r#"SELECT "start", "end", file_path FROM {table} WHERE fqn = ?1"#);
    let row = conn
        .query_row(
            &sql,
            [fqn],
            |row| -> rusqlite::Result<(Option<u32>, Option<u32>, Option<String>)> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            },
        )
        .optional()?;
    Ok(row.map(|(start, end, file_path)| location_from(start, end, file_path)))
}

fn get_member(conn: &Connection, identifier: &str) -> Result<Option<Record>> {
    let Ok(mut member) = MemberRecord::from_identifier(identifier) else {
        return Ok(None);
    };
    let row = conn
        .query_row(
            "SELECT id, container_type FROM member_index WHERE type = ?1 AND member_name = ?2",
            params![member.member_type.as_str(), member.member_name],
            |row| -> rusqlite::Result<(i64, Option<String>)> { Ok((row.get(0)?, row.get(1)?)) },
        )
        .optional()?;
    let Some((member_id, container_type)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        "SELECT file_path FROM member_reference_index WHERE member_id = ?1 ORDER BY file_path",
    )?;
    let references = stmt
        .query_map([member_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;

    member.container_type = container_type;
    member.references = references;
    Ok(Some(Record::from(member)))
}

fn get_file(conn: &Connection, uri: &str) -> Result<Option<Record>> {
    let row = conn
        .query_row(
            "SELECT id, updated_at FROM file_index WHERE file_path = ?1",
            [uri],
            |row| -> rusqlite::Result<(i64, Option<i64>)> { Ok((row.get(0)?, row.get(1)?)) },
        )
        .optional()?;
    let Some((file_id, last_indexed)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        r#"SELECT record_type, identifier, "start", "end", container_type, flags
           FROM file_reference_index WHERE file_id = ?1 ORDER BY position"#,
    )?;
    let rows = stmt.query_map(
        [file_id],
        |row| -> rusqlite::Result<(String, String, u32, u32, Option<String>, u32)> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        },
    )?;

    let mut references = Vec::new();
    for row in rows {
        let (record_type, identifier, start, end, container_type, flags) = row?;
        references.push(RecordReference {
            record_type: record_type.parse()?,
            identifier,
            start,
            end,
            container_type,
            flags,
        });
    }

    Ok(Some(Record::from(FileRecord {
        path: uri.to_string(),
        last_indexed,
        references,
    })))
}

fn write_record(conn: &Connection, record: &Record) -> Result<()> {
    match record {
        Record::Class(class) => {
            let Some(class_type) = class.class_type else {
                log::debug!("Skipping unresolved class {}", class.fqn);
                return Ok(());
            };
            let (start, end, file_path) = location_columns(class.location.as_ref());
            conn.execute(
                "DELETE FROM class_index WHERE fqn = ?1 AND type <> ?2",
                params![class.fqn, class_type.as_str()],
            )?;
            conn.execute(
                r#"INSERT INTO class_index (type, fqn, "start", "end", file_path, flags)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                   ON CONFLICT(type, fqn) DO UPDATE SET
                       "start" = excluded."start",
                       "end" = excluded."end",
                       file_path = excluded.file_path,
                       flags = excluded.flags"#,
                params![class_type.as_str(), class.fqn, start, end, file_path, class.flags],
            )?;
        }
        Record::Function(function) => {
            upsert_located(conn, "function_index", &function.fqn, function.location.as_ref())?;
        }
        Record::Constant(constant) => {
            upsert_located(conn, "constant_index", &constant.fqn, constant.location.as_ref())?;
        }
        Record::Member(member) => {
            conn.execute(
                "INSERT INTO member_index (type, member_name, container_type) VALUES (?1, ?2, ?3)
                 ON CONFLICT(type, member_name) DO UPDATE SET
                     container_type = excluded.container_type",
                params![
                    member.member_type.as_str(),
                    member.member_name,
                    member.container_type
                ],
            )?;
            let member_id: i64 = conn.query_row(
                "SELECT id FROM member_index WHERE type = ?1 AND member_name = ?2",
                params![member.member_type.as_str(), member.member_name],
                |row| row.get(0),
            )?;
            conn.execute(
                "DELETE FROM member_reference_index WHERE member_id = ?1",
                [member_id],
            )?;
            let mut stmt = conn.prepare_cached(
                "INSERT OR IGNORE INTO member_reference_index (member_id, file_path) VALUES (?1, ?2)",
            )?;
            for file_path in &member.references {
                stmt.execute(params![member_id, file_path])?;
            }
        }
        Record::File(file) => {
            conn.execute(
                "INSERT INTO file_index (file_path, updated_at) VALUES (?1, ?2)
                 ON CONFLICT(file_path) DO UPDATE SET updated_at = excluded.updated_at",
                params![file.path, file.last_indexed],
            )?;
            let file_id: i64 = conn.query_row(
                "SELECT id FROM file_index WHERE file_path = ?1",
                [&file.path],
                |row| row.get(0),
            )?;
            conn.execute(
                "DELETE FROM file_reference_index WHERE file_id = ?1",
                [file_id],
            )?;
            let mut stmt = conn.prepare_cached(
                r#"INSERT INTO file_reference_index
                       (file_id, position, record_type, identifier, "start", "end", container_type, flags)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;
            for (position, reference) in file.references.iter().enumerate() {
                stmt.execute(params![
                    file_id,
                    position as i64,
                    reference.record_type.as_str(),
                    reference.identifier,
                    reference.start,
                    reference.end,
                    reference.container_type,
                    reference.flags,
                ])?;
            }
        }
    }
    Ok(())
}

fn upsert_located(
    conn: &Connection,
    table: &str,
    fqn: &str,
    location: Option<&Location>,
) -> Result<()> {
    let (start, end, file_path) = location_columns(location);
    let sql = format!(
        r#"INSERT INTO {table} (fqn, "start", "end", file_path) VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(fqn) DO UPDATE SET
               "start" = excluded."start",
               "end" = excluded."end",
               file_path = excluded.file_path"#
    );
    conn.execute(&sql, params![fqn, start, end, file_path])?;
    Ok(())
}

fn remove_record(conn: &Connection, key: &RecordKey) -> Result<()> {
    let identifier = key.identifier();
    match key.record_type() {
        RecordType::Class => {
            conn.execute("DELETE FROM class_index WHERE fqn = ?1", [identifier])?;
        }
        RecordType::Function => {
            conn.execute("DELETE FROM function_index WHERE fqn = ?1", [identifier])?;
        }
        RecordType::Constant => {
            conn.execute("DELETE FROM constant_index WHERE fqn = ?1", [identifier])?;
        }
        RecordType::Member => {
            let Ok(member) = MemberRecord::from_identifier(identifier) else {
                return Ok(());
            };
            let member_type = member.member_type.as_str();
            conn.execute(
                "DELETE FROM member_reference_index WHERE member_id IN
                     (SELECT id FROM member_index WHERE type = ?1 AND member_name = ?2)",
                params![member_type, member.member_name],
            )?;
            conn.execute(
                "DELETE FROM member_index WHERE type = ?1 AND member_name = ?2",
                params![member_type, member.member_name],
            )?;
        }
        RecordType::File => {
            let uri = normalize_uri(identifier);
            conn.execute(
                "DELETE FROM file_reference_index WHERE file_id IN
                     (SELECT id FROM file_index WHERE file_path = ?1)",
                [&uri],
            )?;
            conn.execute("DELETE FROM file_index WHERE file_path = ?1", [&uri])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use symbol_record::ClassType;
    use tempfile::TempDir;

    fn open_temp_store() -> (SqliteRecordStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteRecordStore::open(&dir.path().join("index.sqlite")).unwrap();
        (store, dir)
    }

    #[test]
    fn class_round_trip_normalizes_path() {
        let (mut store, _dir) = open_temp_store();
        let record = Record::from(
            ClassRecord::from_name("App\\Foo")
                .with_type(ClassType::Class)
                .with_location(Location::new("/testing.php", 10, 30))
                .with_flags(ClassRecord::FLAG_ATTRIBUTE),
        );
        store.write(record.clone()).unwrap();

        let stored = store.get(&RecordKey::class("App\\Foo")).unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(
            stored.location().map(|location| location.uri.as_str()),
            Some("file:///testing.php")
        );
    }

    #[test]
    fn changing_class_type_keeps_identifier_unique() {
        let (mut store, _dir) = open_temp_store();
        store
            .write(Record::from(
                ClassRecord::from_name("App\\Foo").with_type(ClassType::Class),
            ))
            .unwrap();
        store
            .write(Record::from(
                ClassRecord::from_name("App\\Foo").with_type(ClassType::Interface),
            ))
            .unwrap();

        let rows: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM class_index", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        let Some(Record::Class(class)) = store.get(&RecordKey::class("App\\Foo")).unwrap() else {
            panic!("class record missing");
        };
        assert_eq!(class.class_type, Some(ClassType::Interface));
    }

    #[test]
    fn freshness_requires_newer_stamp() {
        let (mut store, _dir) = open_temp_store();
        assert!(!store.is_fresh("/a.php", 100).unwrap());

        store
            .write(Record::from(
                FileRecord::from_path("/a.php").with_last_indexed(100),
            ))
            .unwrap();
        assert!(store.is_fresh("/a.php", 99).unwrap());
        assert!(store.is_fresh("file:///a.php", 100).unwrap());
        assert!(!store.is_fresh("/a.php", 101).unwrap());
    }

    #[test]
    fn reset_recreates_schema() {
        let (mut store, _dir) = open_temp_store();
        store
            .write(Record::from(FunctionRecord::from_name("strlen")))
            .unwrap();
        store.mark_updated(42).unwrap();

        store.reset().unwrap();

        assert!(!store.has(&RecordKey::function("strlen")).unwrap());
        assert_eq!(store.last_update().unwrap(), 0);
        store
            .write(Record::from(FunctionRecord::from_name("strlen")))
            .unwrap();
        assert!(store.has(&RecordKey::function("strlen")).unwrap());
    }
}
