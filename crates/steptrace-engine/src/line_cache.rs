//! Line-number membership prefilter.

/// Refcounted table of line numbers referenced by at least one breakpoint
/// entry, indexed by raw line number.
///
/// The line-event fast path consults this table before touching any per-unit
/// breakpoint map, so the overwhelmingly common "no breakpoint near this
/// line" case costs one bounds-checked load. Trailing empty slots are packed
/// away when their count drops to zero. Purely a performance aid; dropping
/// it would not change observable behavior.
#[derive(Debug, Default)]
pub struct LineNumberCache {
    counts: Vec<u32>,
}

impl LineNumberCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more reference to `line`.
    pub fn add(&mut self, line: u32) {
        let idx = line as usize;
        if idx >= self.counts.len() {
            self.counts.resize(idx + 1, 0);
        }
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    /// Drop one reference to `line`, packing the tail of the table when the
    /// last slot empties.
    pub fn remove(&mut self, line: u32) {
        let idx = line as usize;
        if let Some(count) = self.counts.get_mut(idx) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                while self.counts.last() == Some(&0) {
                    self.counts.pop();
                }
            }
        }
    }

    /// Whether any breakpoint entry references `line`.
    #[must_use]
    pub fn contains(&self, line: u32) -> bool {
        self.counts.get(line as usize).is_some_and(|count| *count > 0)
    }

    /// Highest line with a live reference, plus one.
    #[must_use]
    pub fn span(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_roundtrip() {
        let mut cache = LineNumberCache::new();
        cache.add(7);
        cache.add(7);
        assert!(cache.contains(7));

        cache.remove(7);
        assert!(cache.contains(7));
        cache.remove(7);
        assert!(!cache.contains(7));
    }

    #[test]
    fn tail_is_packed_when_last_slot_empties() {
        let mut cache = LineNumberCache::new();
        cache.add(3);
        cache.add(90);
        assert_eq!(cache.span(), 91);

        cache.remove(90);
        assert_eq!(cache.span(), 4);
        assert!(cache.contains(3));
    }

    #[test]
    fn interior_removal_keeps_span() {
        let mut cache = LineNumberCache::new();
        cache.add(3);
        cache.add(90);
        cache.remove(3);
        assert_eq!(cache.span(), 91);
        assert!(cache.contains(90));
    }
}
