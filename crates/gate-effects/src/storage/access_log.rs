use async_trait::async_trait;
use gate_core::effects::AccessLogStore;
use gate_core::{
    AccessLogEntry, AccessLogFilter, EntryId, FacilityId, Page, Result, SecurityFlag, SubjectId,
    SyncKey, Timestamp,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use super::paginate;

#[derive(Debug, Default)]
struct Inner {
    /// Append order
    entries: Vec<AccessLogEntry>,
    positions: HashMap<EntryId, usize>,
    sync_keys: HashSet<SyncKey>,
}

impl Inner {
    fn push(&mut self, entry: AccessLogEntry) {
        self.sync_keys.insert(entry.sync_key());
        self.positions.insert(entry.id, self.entries.len());
        self.entries.push(entry);
    }
}

/// Append-only access log held in memory
#[derive(Debug, Default)]
pub struct MemoryAccessLog {
    inner: RwLock<Inner>,
}

impl MemoryAccessLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry in append order
    pub fn snapshot(&self) -> Vec<AccessLogEntry> {
        self.inner.read().entries.clone()
    }
}

#[async_trait]
impl AccessLogStore for MemoryAccessLog {
    async fn append(&self, entry: AccessLogEntry) -> Result<()> {
        self.inner.write().push(entry);
        Ok(())
    }

    async fn append_unique(&self, entry: AccessLogEntry) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.sync_keys.contains(&entry.sync_key()) {
            return Ok(false);
        }
        inner.push(entry);
        Ok(true)
    }

    async fn count_attempts(
        &self,
        subject_id: &SubjectId,
        facility_id: &FacilityId,
        since: Timestamp,
    ) -> Result<u32> {
        let count = self
            .inner
            .read()
            .entries
            .iter()
            .filter(|e| {
                e.timestamp >= since
                    && &e.facility_id == facility_id
                    && e.subject_id.as_ref() == Some(subject_id)
            })
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn query(&self, filter: &AccessLogFilter) -> Result<Page<AccessLogEntry>> {
        let mut matching: Vec<AccessLogEntry> = self
            .inner
            .read()
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // Stable: equal timestamps keep append order.
        matching.sort_by_key(|e| e.timestamp);
        Ok(paginate(&matching, filter.offset, filter.limit))
    }

    async fn entries_since(&self, since: Timestamp) -> Result<Vec<AccessLogEntry>> {
        Ok(self
            .inner
            .read()
            .entries
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn add_security_flags(&self, id: &EntryId, flags: &[SecurityFlag]) -> Result<bool> {
        let mut inner = self.inner.write();
        let Some(&position) = inner.positions.get(id) else {
            return Ok(false);
        };
        let Some(entry) = inner.entries.get_mut(position) else {
            return Ok(false);
        };
        let mut added = false;
        for flag in flags {
            added |= entry.security_flags.insert(*flag);
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::{AccessResult, DenialReason, DeviceId, DeviceInfo, Nonce};
    use std::collections::BTreeSet;

    fn entry(seed: u8, subject: &str, ts: u64) -> AccessLogEntry {
        AccessLogEntry {
            id: EntryId::from_entropy([seed; 16]),
            subject_id: Some(SubjectId::new(subject).unwrap()),
            credential_id: None,
            facility_id: FacilityId::new("LIB").unwrap(),
            timestamp: Timestamp::from_millis(ts),
            result: AccessResult::Denied,
            denial_reason: Some(DenialReason::NoPermission),
            device: DeviceInfo::new(DeviceId::new("dev-1").unwrap()),
            qr_nonce: Some(Nonce::from_bytes([seed; 16])),
            attempt_number: 1,
            security_flags: BTreeSet::new(),
            emergency_override: None,
            extra_requirements: Vec::new(),
            offline: true,
            recorded_at: Timestamp::from_millis(ts),
        }
    }

    #[tokio::test]
    async fn append_unique_drops_replays() {
        let log = MemoryAccessLog::new();
        assert!(log.append_unique(entry(1, "a", 10)).await.unwrap());
        let mut replay = entry(1, "a", 10);
        replay.id = EntryId::from_entropy([9u8; 16]);
        assert!(!log.append_unique(replay).await.unwrap());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn attempts_count_only_the_window() {
        let log = MemoryAccessLog::new();
        log.append(entry(1, "a", 10)).await.unwrap();
        log.append(entry(2, "a", 20)).await.unwrap();
        log.append(entry(3, "b", 20)).await.unwrap();
        let count = log
            .count_attempts(
                &SubjectId::new("a").unwrap(),
                &FacilityId::new("LIB").unwrap(),
                Timestamp::from_millis(15),
            )
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn query_orders_by_timestamp_and_pages() {
        let log = MemoryAccessLog::new();
        log.append(entry(1, "a", 30)).await.unwrap();
        log.append(entry(2, "a", 10)).await.unwrap();
        log.append(entry(3, "a", 20)).await.unwrap();
        let page = log
            .query(&AccessLogFilter {
                offset: 1,
                limit: 1,
                ..AccessLogFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].timestamp, Timestamp::from_millis(20));
    }

    #[tokio::test]
    async fn flags_are_appended_once() {
        let log = MemoryAccessLog::new();
        let e = entry(1, "a", 10);
        let id = e.id;
        log.append(e).await.unwrap();
        assert!(log
            .add_security_flags(&id, &[SecurityFlag::RepeatedDenials])
            .await
            .unwrap());
        assert!(!log
            .add_security_flags(&id, &[SecurityFlag::RepeatedDenials])
            .await
            .unwrap());
    }
}
