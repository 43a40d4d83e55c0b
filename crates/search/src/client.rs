use crate::criteria::Criteria;
use crate::error::Result;
use crate::index::SearchIndex;
use symbol_record::Record;
use symbol_store::RecordStore;

/// Searches the projection and resolves every hit to its full record.
pub struct SearchClient<'a> {
    index: &'a mut dyn SearchIndex,
    store: &'a dyn RecordStore,
}

impl<'a> SearchClient<'a> {
    pub fn new(index: &'a mut dyn SearchIndex, store: &'a dyn RecordStore) -> Self {
        Self { index, store }
    }

    /// Hits whose record has disappeared from the store are skipped.
    pub fn search<'s>(
        &'s mut self,
        criteria: &Criteria,
    ) -> Result<impl Iterator<Item = Result<Record>> + 's> {
        let store: &'s dyn RecordStore = self.store;
        let hits = self.index.search(criteria)?;
        Ok(hits.filter_map(move |hit| {
            let entry = match hit {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            match store.get(&entry.key()) {
                Ok(Some(record)) => Some(Ok(record)),
                Ok(None) => {
                    log::debug!("Skipping stale search entry {}", entry.key());
                    None
                }
                Err(err) => Some(Err(err.into())),
            }
        }))
    }
}
