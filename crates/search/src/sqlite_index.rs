use crate::criteria::Criteria;
use crate::entry::SearchEntry;
use crate::error::Result;
use crate::index::{SearchIndex, SearchResults};
use crate::translate::{FilterTranslator, SqlTranslator};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use symbol_record::{Record, RecordType};
use symbol_store::schema::{ensure_tables, open_connection, Table};

const PAGE_SIZE: usize = 256;

const TABLES: &[Table] = &[Table {
    name: "search_index",
    sql: "
        CREATE TABLE search_index (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            record_type TEXT    NOT NULL,
            identifier  TEXT    NOT NULL,
            type        TEXT    NOT NULL,
            flags       INTEGER NOT NULL DEFAULT 0
        );
        CREATE UNIQUE INDEX search_index_idx ON search_index (record_type, identifier);
        CREATE INDEX search_index_record_type ON search_index (record_type);
        CREATE INDEX search_index_identifier ON search_index (identifier);
    ",
}];

/// Search index stored in the `search_index` table.
pub struct SqliteSearchIndex {
    conn: Connection,
    pending: Vec<SearchEntry>,
    batch_size: usize,
    auto_flush: bool,
}

impl SqliteSearchIndex {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_connection(path)?;
        ensure_tables(&conn, TABLES)?;
        Ok(Self {
            conn,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            auto_flush: true,
        })
    }
}

impl SearchIndex for SqliteSearchIndex {
    fn search<'a>(&'a mut self, criteria: &Criteria) -> Result<SearchResults<'a>> {
        let filter = SqlTranslator.translate(criteria)?;
        self.flush()?;

        let sql = format!(
            "SELECT id, record_type, identifier, type, flags FROM search_index
             WHERE ({}) AND id > ? ORDER BY id LIMIT {PAGE_SIZE}",
            filter.condition
        );
        log::debug!("{sql}");

        Ok(Box::new(Pages {
            conn: &self.conn,
            sql,
            params: filter.params,
            criteria: criteria.clone(),
            last_id: 0,
            page: Vec::new().into_iter(),
            exhausted: false,
        }))
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        let Some(entry) = SearchEntry::from_record(record) else {
            return Ok(());
        };
        self.pending.push(entry);
        if self.auto_flush && self.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    fn set_auto_flush(&mut self, enabled: bool) {
        self.auto_flush = enabled;
    }

    fn is_full(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    fn remove(&mut self, record: &Record) -> Result<()> {
        self.flush()?;
        let class_type = match record {
            Record::Class(class) => class.class_type.map_or("", |class_type| class_type.as_str()),
            _ => "",
        };
        self.conn.execute(
            "DELETE FROM search_index WHERE record_type = ?1 AND identifier = ?2 AND type = ?3",
            params![record.record_type().as_str(), record.identifier(), class_type],
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO search_index (record_type, identifier, type, flags)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(record_type, identifier) DO UPDATE SET
                     type = excluded.type,
                     flags = excluded.flags",
            )?;
            for entry in &self.pending {
                stmt.execute(params![
                    entry.record_type.as_str(),
                    entry.identifier,
                    entry.type_column(),
                    entry.flags,
                ])?;
            }
        }
        tx.commit()?;
        self.pending.clear();
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.pending
            .retain(|entry| entry.record_type != RecordType::Class);
        self.conn.execute(
            "DELETE FROM search_index WHERE record_type = ?1",
            [RecordType::Class.as_str()],
        )?;
        Ok(())
    }
}

/// Keyset-paginated scan re-checking every row against the criteria.
struct Pages<'a> {
    conn: &'a Connection,
    sql: String,
    params: Vec<Value>,
    criteria: Criteria,
    last_id: i64,
    page: std::vec::IntoIter<(i64, SearchEntry)>,
    exhausted: bool,
}

impl Pages<'_> {
    fn fetch(&self) -> Result<Vec<(i64, SearchEntry)>> {
        let mut stmt = self.conn.prepare_cached(&self.sql)?;
        let last_id = Value::Integer(self.last_id);
        let rows = stmt.query_map(
            params_from_iter(self.params.iter().chain(std::iter::once(&last_id))),
            |row| -> rusqlite::Result<(i64, String, String, String, u32)> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            },
        )?;

        let mut page = Vec::with_capacity(PAGE_SIZE);
        for row in rows {
            let (id, record_type, identifier, class_type, flags) = row?;
            let class_type = if class_type.is_empty() {
                None
            } else {
                Some(class_type.parse()?)
            };
            page.push((
                id,
                SearchEntry {
                    record_type: record_type.parse()?,
                    identifier,
                    class_type,
                    flags,
                },
            ));
        }
        Ok(page)
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<SearchEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((id, entry)) = self.page.next() {
                self.last_id = id;
                if self.criteria.matches(&entry) {
                    return Some(Ok(entry));
                }
                continue;
            }

            if self.exhausted {
                return None;
            }

            match self.fetch() {
                Ok(page) => {
                    if page.len() < PAGE_SIZE {
                        self.exhausted = true;
                    }
                    if page.is_empty() {
                        return None;
                    }
                    self.page = page.into_iter();
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
