//! Selective-Repeat send window: tracks in-flight segments keyed by
//! their byte-offset sequence number.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::segment::Segment;

#[derive(Debug)]
struct Entry {
    segment: Segment,
    first_sent: Instant,
    acked: bool,
}

#[derive(Debug)]
struct Inner {
    base: u32,
    next_seq: u32,
    entries: BTreeMap<u32, Entry>,
}

/// Thread-safe Selective-Repeat window, fixed at `size` unacknowledged
/// segments.
#[derive(Debug)]
pub struct SendWindow {
    size: usize,
    inner: Mutex<Inner>,
}

impl SendWindow {
    pub fn new(size: usize, initial_seq: u32) -> Self {
        SendWindow {
            size,
            inner: Mutex::new(Inner {
                base: initial_seq,
                next_seq: initial_seq,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// True iff the unacknowledged count is below the window size.
    pub fn can_admit(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.entries.values().filter(|e| !e.acked).count() < self.size
    }

    /// Admits a newly-sent segment at `seq`. If this is the first
    /// in-flight entry, `base` is pinned to it.
    pub fn admit(&self, seq: u32, segment: Segment) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.is_empty() {
            inner.base = seq;
        }
        inner.next_seq = seq.wrapping_add(segment.payload.len().max(1) as u32);
        inner.entries.insert(
            seq,
            Entry {
                segment,
                first_sent: Instant::now(),
                acked: false,
            },
        );
    }

    /// Marks the entry at `seq` acknowledged, then drops every
    /// contiguously-acknowledged entry starting at `base`, advancing
    /// `base` past them. Returns true iff `base` advanced.
    pub fn acknowledge(&self, seq: u32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        Self::acknowledge_locked(&mut inner, seq)
    }

    /// Acknowledges whichever in-flight segment `S` satisfies
    /// `ack_num == S + len(payload(S))`, per the cumulative ACK
    /// convention this window uses (see module docs). Byte-offset
    /// sequencing means at most one in-flight entry can match.
    pub fn acknowledge_ack_num(&self, ack_num: u32) -> bool {
        let mut inner = self.inner.lock().unwrap();

        let matching_seq = inner
            .entries
            .iter()
            .find(|(seq, entry)| seq.wrapping_add(entry.segment.payload.len() as u32) == ack_num)
            .map(|(seq, _)| *seq);

        match matching_seq {
            Some(seq) => Self::acknowledge_locked(&mut inner, seq),
            None => false,
        }
    }

    fn acknowledge_locked(inner: &mut Inner, seq: u32) -> bool {
        let newly_acked = match inner.entries.get_mut(&seq) {
            Some(entry) if !entry.acked => {
                entry.acked = true;
                true
            }
            _ => false,
        };

        if !newly_acked {
            return false;
        }

        let mut advanced = false;
        loop {
            let base = inner.base;
            match inner.entries.get(&base) {
                Some(entry) if entry.acked => {
                    inner.entries.remove(&base);
                    advanced = true;
                    inner.base = inner
                        .entries
                        .keys()
                        .next()
                        .copied()
                        .unwrap_or(inner.next_seq);
                }
                _ => break,
            }
        }

        advanced
    }

    /// Snapshot of still-unacknowledged `(seq, segment, first_sent)` entries.
    pub fn unacknowledged(&self) -> Vec<(u32, Segment, Instant)> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .values()
            .filter(|e| !e.acked)
            .map(|e| (e.segment.seq_num, e.segment.clone(), e.first_sent))
            .collect()
    }

    /// Resets the first-sent timestamp of the entry at `seq`, e.g.
    /// after retransmitting it.
    pub fn refresh(&self, seq: u32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.entries.get_mut(&seq) {
            entry.first_sent = Instant::now();
        }
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.entries.values().all(|e| e.acked)
    }

    pub fn next_seq(&self) -> u32 {
        self.inner.lock().unwrap().next_seq
    }
}
