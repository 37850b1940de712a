//! Scored move lists.
//!
//! A search reports one scored entry per root move, kept sorted from best
//! to worst for the mover so callers can read the principal move in O(1)
//! and iterate alternatives in order.

/// One root move with its search statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMove<M> {
    pub mv: M,
    /// Expected score for the root mover. Carries the proof sentinel when
    /// the move's value is resolved.
    pub score: f64,
    pub visits: u64,
    /// Whether the move's outcome is proven.
    pub resolved: bool,
    /// -1.0 proven loss, 1.0 proven win, 0.0 unresolved.
    pub completion: f64,
}

/// Root moves ordered by descending score, then descending visits.
#[derive(Debug, Clone)]
pub struct ScoredMoveList<M> {
    entries: Vec<ScoredMove<M>>,
}

impl<M> Default for ScoredMoveList<M> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<M: Clone + PartialEq> ScoredMoveList<M> {
    pub fn new(mut entries: Vec<ScoredMove<M>>) -> Self {
        entries.sort_by(Self::ordering);
        Self { entries }
    }

    fn ordering(a: &ScoredMove<M>, b: &ScoredMove<M>) -> std::cmp::Ordering {
        b.score.total_cmp(&a.score).then(b.visits.cmp(&a.visits))
    }

    /// The best-ranked move.
    pub fn best(&self) -> Option<&ScoredMove<M>> {
        self.entries.first()
    }

    /// Replaces the entry for `entry.mv` (or inserts a new one) and moves it
    /// to its sorted position.
    pub fn update(&mut self, entry: ScoredMove<M>) {
        if let Some(at) = self.entries.iter().position(|e| e.mv == entry.mv) {
            self.entries.remove(at);
        }
        let at = self.entries.partition_point(|e| Self::ordering(e, &entry).is_lt());
        self.entries.insert(at, entry);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredMove<M>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<M> std::ops::Index<usize> for ScoredMoveList<M> {
    type Output = ScoredMove<M>;

    fn index(&self, index: usize) -> &ScoredMove<M> {
        &self.entries[index]
    }
}

impl<'a, M> IntoIterator for &'a ScoredMoveList<M> {
    type Item = &'a ScoredMove<M>;
    type IntoIter = std::slice::Iter<'a, ScoredMove<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mv: u8, score: f64, visits: u64) -> ScoredMove<u8> {
        ScoredMove { mv, score, visits, resolved: false, completion: 0.0 }
    }

    #[test]
    fn test_new_sorts_descending() {
        let list = ScoredMoveList::new(vec![entry(0, 0.1, 5), entry(1, 0.9, 2), entry(2, 0.4, 9)]);
        let order: Vec<u8> = list.iter().map(|e| e.mv).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(list.best().unwrap().mv, 1);
    }

    #[test]
    fn test_equal_scores_rank_by_visits() {
        let list = ScoredMoveList::new(vec![entry(0, 0.5, 3), entry(1, 0.5, 8), entry(2, 0.5, 5)]);
        let order: Vec<u8> = list.iter().map(|e| e.mv).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_update_repositions_entry() {
        let mut list =
            ScoredMoveList::new(vec![entry(0, 0.8, 10), entry(1, 0.5, 10), entry(2, 0.2, 10)]);
        list.update(entry(2, 0.9, 11));
        let order: Vec<u8> = list.iter().map(|e| e.mv).collect();
        assert_eq!(order, vec![2, 0, 1]);
        assert_eq!(list.len(), 3, "update must replace, not duplicate");

        list.update(entry(2, 0.1, 12));
        let order: Vec<u8> = list.iter().map(|e| e.mv).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_update_inserts_unknown_move() {
        let mut list = ScoredMoveList::new(vec![entry(0, 0.3, 4)]);
        list.update(entry(7, 0.6, 1));
        assert_eq!(list.len(), 2);
        assert_eq!(list.best().unwrap().mv, 7);
    }

    #[test]
    fn test_empty_list() {
        let list: ScoredMoveList<u8> = ScoredMoveList::default();
        assert!(list.is_empty());
        assert!(list.best().is_none());
    }
}
