use std::sync::Arc;

use crate::checksum::partial_checksum;

/// Largest payload accepted from a template file
pub const MAX_TEMPLATE_PAYLOAD: usize = 1500;

/// Largest frame read from a capture file
pub const MAX_FRAME_LEN: usize = 65536;

/// Probe payload for one destination UDP port
#[derive(Debug, Clone)]
pub struct PayloadRecord {
    port: u16,
    source_port: Option<u16>,
    checksum: u16,
    bytes: Arc<[u8]>,
}

impl PayloadRecord {
    pub fn new(port: u16, bytes: &[u8], source_port: Option<u16>) -> Self {
        Self::with_shared(port, Arc::from(bytes), partial_checksum(bytes), source_port)
    }

    /// Build a record around a buffer and checksum already computed for it.
    /// Used when one template applies to many ports.
    pub(crate) fn with_shared(
        port: u16,
        bytes: Arc<[u8]>,
        checksum: u16,
        source_port: Option<u16>,
    ) -> Self {
        Self {
            port,
            source_port,
            checksum,
            bytes,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Explicit source port, `None` when the template did not set one
    pub fn source_port(&self) -> Option<u16> {
        self.source_port
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Partial checksum computed when the record was created
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Fixed-capacity accumulator for decoded payload bytes.
///
/// Bytes pushed past the capacity are dropped and counted so the caller can
/// report the truncation.
#[derive(Debug)]
pub struct PayloadBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    dropped: usize,
}

impl PayloadBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append one byte; returns false when it did not fit
    pub fn push(&mut self, byte: u8) -> bool {
        if self.bytes.len() < self.capacity {
            self.bytes.push(byte);
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of bytes dropped because the buffer was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}
