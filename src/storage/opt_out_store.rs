use crate::domain::opt_out::{OptOutRecord, OptOutScope};
use dashmap::DashMap;
use uuid::Uuid;

/// Append-only opt-out ledger keyed by `(phone, scope)`.
#[derive(Debug, Default)]
pub struct OptOutStore {
    records: DashMap<(String, OptOutScope), OptOutRecord>,
}

impl OptOutStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the record unless one already exists for its key. Returns
    /// whether the record was newly inserted, which callers use to keep
    /// keyword processing idempotent under duplicate delivery.
    pub fn insert_if_absent(&self, record: OptOutRecord) -> bool {
        use dashmap::mapref::entry::Entry;

        let key = (record.phone.clone(), record.scope);
        match self.records.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Scope-widening lookup: campaign, then brand, then global. Returns
    /// the narrowest matching record.
    #[must_use]
    pub fn find_match(
        &self,
        phone: &str,
        campaign_id: Option<Uuid>,
        brand_id: Option<Uuid>,
    ) -> Option<OptOutRecord> {
        if let Some(id) = campaign_id
            && let Some(record) = self.records.get(&(phone.to_string(), OptOutScope::Campaign(id)))
        {
            return Some(record.clone());
        }
        if let Some(id) = brand_id
            && let Some(record) = self.records.get(&(phone.to_string(), OptOutScope::Brand(id)))
        {
            return Some(record.clone());
        }
        self.records.get(&(phone.to_string(), OptOutScope::Global)).map(|r| r.clone())
    }

    #[must_use]
    pub fn list_for_number(&self, phone: &str) -> Vec<OptOutRecord> {
        let mut records: Vec<OptOutRecord> =
            self.records.iter().filter(|r| r.key().0 == phone).map(|r| r.clone()).collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::opt_out::OptOutMethod;
    use chrono::Utc;

    fn record(phone: &str, scope: OptOutScope) -> OptOutRecord {
        OptOutRecord {
            phone: phone.to_string(),
            scope,
            method: OptOutMethod::Programmatic,
            origin_message_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = OptOutStore::new();
        let scope = OptOutScope::Campaign(Uuid::new_v4());

        assert!(store.insert_if_absent(record("+15550001111", scope)));
        assert!(!store.insert_if_absent(record("+15550001111", scope)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lookup_widens_from_campaign_to_global() {
        let store = OptOutStore::new();
        let campaign = Uuid::new_v4();
        let brand = Uuid::new_v4();

        assert!(store.find_match("+15550001111", Some(campaign), Some(brand)).is_none());

        store.insert_if_absent(record("+15550001111", OptOutScope::Global));
        let matched = store
            .find_match("+15550001111", Some(campaign), Some(brand))
            .expect("global record applies to any scope");
        assert_eq!(matched.scope, OptOutScope::Global);

        store.insert_if_absent(record("+15550001111", OptOutScope::Campaign(campaign)));
        let matched = store
            .find_match("+15550001111", Some(campaign), Some(brand))
            .expect("campaign record preferred");
        assert_eq!(matched.scope, OptOutScope::Campaign(campaign));
    }

    #[test]
    fn brand_scope_blocks_sibling_campaigns() {
        let store = OptOutStore::new();
        let brand = Uuid::new_v4();
        store.insert_if_absent(record("+15550001111", OptOutScope::Brand(brand)));

        let matched = store
            .find_match("+15550001111", Some(Uuid::new_v4()), Some(brand))
            .expect("brand record blocks any campaign of the brand");
        assert_eq!(matched.scope, OptOutScope::Brand(brand));
        assert!(store.find_match("+15550001111", Some(Uuid::new_v4()), Some(Uuid::new_v4())).is_none());
    }
}
