use std::sync::Arc;

use tracing::debug;

use crate::builtin::BuiltinPayload;
use crate::checksum::partial_checksum;
use crate::payload::PayloadRecord;
use crate::ports::PortSet;

/// Probe payloads indexed by destination port.
///
/// Records are kept sorted by port with at most one record per port. The
/// registry is filled during startup (bootstrap, template files, captures),
/// optionally trimmed to the target ports, and read-only afterwards.
#[derive(Debug, Default)]
pub struct PayloadRegistry {
    records: Vec<PayloadRecord>,
}

impl PayloadRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with `table`, in table order.
    ///
    /// Later inserts for the same ports replace these seeds.
    pub fn bootstrap(table: &[BuiltinPayload]) -> Self {
        let mut registry = Self::new();
        for builtin in table {
            registry.insert(&PortSet::single(builtin.port), builtin.bytes(), builtin.source_port);
        }
        debug!("payloads: {} built-in payloads", registry.len());
        registry
    }

    /// Registry seeded with the built-in payload table
    pub fn with_builtins() -> Self {
        Self::bootstrap(crate::builtin::BUILTIN_PAYLOADS)
    }

    /// Store `bytes` as the payload for every port in `ports`.
    ///
    /// An existing record for a port is replaced in place. Returns how many
    /// ports did not have a record before.
    pub fn insert(&mut self, ports: &PortSet, bytes: &[u8], source_port: Option<u16>) -> usize {
        let shared: Arc<[u8]> = Arc::from(bytes);
        let checksum = partial_checksum(bytes);
        let mut added = 0;

        for port in ports.iter() {
            let record = PayloadRecord::with_shared(port, shared.clone(), checksum, source_port);

            match self.records.binary_search_by_key(&port, PayloadRecord::port) {
                Ok(slot) => self.records[slot] = record,
                Err(slot) => {
                    self.records.insert(slot, record);
                    added += 1;
                }
            }
        }

        added
    }

    /// Payload for `port`, masked to 16 bits
    pub fn lookup(&self, port: u32) -> Option<&PayloadRecord> {
        let port = (port & 0xFFFF) as u16;
        self.records
            .binary_search_by_key(&port, PayloadRecord::port)
            .ok()
            .map(|slot| &self.records[slot])
    }

    /// Drop every record whose port is not in `keep`
    pub fn trim(&mut self, keep: &PortSet) {
        let before = self.records.len();
        self.records.retain(|record| keep.contains(record.port()));
        debug!("payloads: trimmed {} -> {} payloads", before, self.records.len());
    }

    /// Release every record
    pub fn clear(&mut self) {
        self.records.clear();
        self.records.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending port order
    pub fn iter(&self) -> std::slice::Iter<'_, PayloadRecord> {
        self.records.iter()
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.records.iter().map(PayloadRecord::port)
    }
}

impl<'a> IntoIterator for &'a PayloadRegistry {
    type Item = &'a PayloadRecord;
    type IntoIter = std::slice::Iter<'a, PayloadRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
