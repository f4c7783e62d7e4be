//! Multipart SMS reassembly.
//!
//! Concatenated deliveries arrive as independent PDUs, possibly out of
//! order and interleaved with parts of other messages. The assembly layer
//! buffers parts keyed by (reference, total) and yields the complete
//! message once every sequence number is present.
//!
//! The layer is transient session state: it is never persisted and is
//! cleared when the session ends. Partial messages whose remaining parts
//! never arrive simply stay pending until then.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::pdu::Deliver;

/// A fully reassembled delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledSms {
    /// Storage indices of the underlying parts, in sequence order. A
    /// single-part message has exactly one.
    pub indices: Vec<u32>,
    /// Originating address.
    pub sender: String,
    /// Service-centre timestamp of the first part.
    pub scts: String,
    /// The complete text.
    pub text: String,
}

/// Buffers concatenated parts until complete.
#[derive(Debug, Default)]
pub struct AssemblyLayer {
    pending: HashMap<(u16, u8), BTreeMap<u8, (u32, Deliver)>>,
}

impl AssemblyLayer {
    /// An empty assembly layer.
    pub fn new() -> AssemblyLayer {
        AssemblyLayer {
            pending: HashMap::new(),
        }
    }

    /// Feed one decoded delivery, stored at `index`.
    ///
    /// Single-part messages pass through immediately. A concatenated part
    /// is buffered; when it completes its set, the whole message is
    /// returned and the set is dropped. A duplicate sequence number
    /// replaces the earlier copy.
    pub fn push(&mut self, index: u32, deliver: Deliver) -> Option<AssembledSms> {
        let Some(concat) = deliver.concat else {
            return Some(AssembledSms {
                indices: vec![index],
                sender: deliver.sender,
                scts: deliver.scts,
                text: deliver.text,
            });
        };

        let key = (concat.reference, concat.total);
        let parts = self.pending.entry(key).or_default();
        parts.insert(concat.sequence, (index, deliver));
        debug!(
            reference = concat.reference,
            total = concat.total,
            have = parts.len(),
            "buffered multipart fragment"
        );

        if parts.len() < usize::from(concat.total) {
            return None;
        }

        let parts = self.pending.remove(&key)?;
        let mut indices = Vec::with_capacity(parts.len());
        let mut text = String::new();
        let mut sender = String::new();
        let mut scts = String::new();
        for (seq, (index, part)) in parts {
            if seq == 1 {
                sender = part.sender;
                scts = part.scts;
            }
            indices.push(index);
            text.push_str(&part.text);
        }
        Some(AssembledSms {
            indices,
            sender,
            scts,
            text,
        })
    }

    /// How many incomplete messages are buffered.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Take every buffered part out, ordered by storage index. Used by
    /// storage listings, which must surface orphan fragments individually
    /// rather than hold them for siblings that may never arrive.
    pub fn drain(&mut self) -> Vec<(u32, Deliver)> {
        let mut parts: Vec<(u32, Deliver)> = self
            .pending
            .drain()
            .flat_map(|(_, set)| set.into_values())
            .collect();
        parts.sort_by_key(|(index, _)| *index);
        parts
    }

    /// Drop all buffered parts. Called on session teardown.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
