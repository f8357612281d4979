//! Per-walk visited bits.
//!
//! Every active walk owns one bitmap; the outermost walk reuses the base
//! bitmap and each nested walk pushes a fresh one on top, so an inner walk can
//! never disturb the marks of the walk that called it.

/// Growable bitmap keyed by arena slot index.
#[derive(Clone, Default, Debug)]
pub(crate) struct VisitedBits {
    words: Vec<u64>,
}

impl VisitedBits {
    #[inline]
    fn word_bit(index: usize) -> (usize, u64) {
        (index / 64, 1u64 << (index % 64))
    }

    #[inline]
    pub(crate) fn contains(&self, index: usize) -> bool {
        let (word, bit) = Self::word_bit(index);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    pub(crate) fn insert(&mut self, index: usize) {
        let (word, bit) = Self::word_bit(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= bit;
    }

    #[inline]
    pub(crate) fn remove(&mut self, index: usize) {
        let (word, bit) = Self::word_bit(index);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !bit;
        }
    }

    /// Zeroes every bit but keeps the storage for the next walk.
    pub(crate) fn clear(&mut self) {
        self.words.fill(0);
    }

    pub(crate) fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Stack of bitmaps, one per walk in progress. Never empty.
#[derive(Clone, Debug)]
pub(crate) struct VisitedStack {
    levels: Vec<VisitedBits>,
    /// Walks currently running; `levels.len()` once any walk is active.
    active: usize,
}

impl VisitedStack {
    pub(crate) fn new() -> Self {
        Self {
            levels: vec![VisitedBits::default()],
            active: 0,
        }
    }

    /// Number of walks currently in progress.
    #[inline]
    pub(crate) fn active(&self) -> usize {
        self.active
    }

    /// Number of bitmaps held, including the idle base bitmap.
    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Makes a bitmap available to a walk starting at nesting `depth` (1-based).
    pub(crate) fn enter(&mut self, depth: usize) {
        debug_assert_eq!(depth, self.active + 1);
        if depth > 1 {
            self.levels.push(VisitedBits::default());
        } else {
            self.levels.truncate(1);
            self.top_mut().clear();
        }
        self.active += 1;
    }

    /// Releases the bitmap of the walk at nesting `depth`.
    pub(crate) fn leave(&mut self, depth: usize) {
        debug_assert_eq!(depth, self.active);
        if depth > 1 {
            self.levels.pop();
        } else {
            self.top_mut().clear();
        }
        self.active -= 1;
    }

    #[inline]
    pub(crate) fn is_visited(&self, index: usize) -> bool {
        self.top().contains(index)
    }

    #[inline]
    pub(crate) fn mark(&mut self, index: usize) {
        self.top_mut().insert(index);
    }

    /// Clears `index` in every level, for a slot whose node was deleted.
    pub(crate) fn forget(&mut self, index: usize) {
        for level in &mut self.levels {
            level.remove(index);
        }
    }

    #[inline]
    fn top(&self) -> &VisitedBits {
        // `levels` is never empty.
        &self.levels[self.levels.len() - 1]
    }

    #[inline]
    fn top_mut(&mut self) -> &mut VisitedBits {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    pub(crate) fn marked(&self) -> usize {
        self.top().count()
    }
}
