//! Ordered, shuffle-aware playlist cursor.
//!
//! A [`Playlist`] does not own the items it orders. It holds a permutation of
//! item ids (`0..len`) and an optional cursor into that permutation. The
//! player keeps two of them: one over the loaded files and one over the
//! tracks of the selected file.

use rand::seq::SliceRandom;
use rand::Rng;

/// Which of the two player playlists an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaylistKind {
    /// Loaded files.
    File,
    /// Tracks of the selected file.
    Track,
}

/// Permutation of item ids with a cursor and repeat flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    order: Vec<usize>,
    current: Option<usize>,
    repeat: bool,
}

impl Playlist {
    /// Create an empty playlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the order to the identity permutation.
    ///
    /// With `Some(size)` the playlist is resized first. The cursor survives
    /// if it still points inside the new range.
    pub fn regen(&mut self, size: Option<usize>) {
        let len = size.unwrap_or(self.order.len());
        self.order.clear();
        self.order.extend(0..len);
        if self.current.is_some_and(|c| c >= len) {
            self.current = None;
        }
    }

    /// Shuffle with the thread-local RNG.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Shuffle with the given RNG. The cursor keeps pointing at the same id.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let playing = self.current_id();
        self.order.shuffle(rng);
        if let Some(id) = playing {
            self.current = self.position_of(id);
        }
    }

    /// Remove the entry at position `pos`.
    ///
    /// Ids above the removed one are shifted down so the order stays a
    /// permutation of `0..len`. Out-of-range positions are ignored.
    pub fn remove(&mut self, pos: usize) {
        if pos >= self.order.len() {
            return;
        }
        let removed = self.order.remove(pos);
        for id in &mut self.order {
            if *id > removed {
                *id -= 1;
            }
        }
        self.current = match self.current {
            Some(c) if pos < c => Some(c - 1),
            Some(c) if pos == c => None,
            other => other,
        };
    }

    /// Swap the entry at `pos` with the one `delta` positions away.
    ///
    /// Returns the entry's new position, or `pos` unchanged if the target is
    /// out of range. The cursor follows the entry it points at.
    pub fn move_entry(&mut self, pos: usize, delta: isize) -> usize {
        let Some(target) = pos.checked_add_signed(delta) else {
            return pos;
        };
        if pos >= self.order.len() || target >= self.order.len() {
            return pos;
        }
        self.order.swap(pos, target);
        self.current = match self.current {
            Some(c) if c == pos => Some(target),
            Some(c) if c == target => Some(pos),
            other => other,
        };
        target
    }

    /// Position that follows the cursor, if any.
    pub fn next(&self) -> Option<usize> {
        self.step(1)
    }

    /// Position that precedes the cursor, if any.
    pub fn prev(&self) -> Option<usize> {
        self.step(-1)
    }

    fn step(&self, offset: isize) -> Option<usize> {
        if self.repeat && self.current.is_some() {
            return self.current;
        }
        // a cleared cursor behaves like position -1
        let from = self.current.map_or(-1, |c| c as isize);
        let to = from + offset;
        (to >= 0 && (to as usize) < self.order.len()).then_some(to as usize)
    }

    /// Id stored at position `pos`.
    pub fn get(&self, pos: usize) -> Option<usize> {
        self.order.get(pos).copied()
    }

    /// Position of `id` in the order.
    pub fn position_of(&self, id: usize) -> Option<usize> {
        self.order.iter().position(|&i| i == id)
    }

    /// Id under the cursor.
    pub fn current_id(&self) -> Option<usize> {
        self.current.and_then(|c| self.get(c))
    }

    /// Position of the cursor.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Move the cursor. Positions outside the playlist clear it.
    pub fn set_current(&mut self, pos: Option<usize>) {
        self.current = pos.filter(|&p| p < self.order.len());
    }

    /// Whether stepping stays on the current entry.
    pub fn repeat(&self) -> bool {
        self.repeat
    }

    /// Set the repeat flag.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    /// Drop every entry and the cursor. The repeat flag is kept.
    pub fn clear(&mut self) {
        self.order.clear();
        self.current = None;
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the playlist has no entries.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in playback order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn playlist(len: usize, current: Option<usize>) -> Playlist {
        let mut p = Playlist::new();
        p.regen(Some(len));
        p.set_current(current);
        p
    }

    fn is_permutation(order: &[usize]) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted.iter().copied().eq(0..order.len())
    }

    #[test]
    fn next_from_cleared_cursor_is_first() {
        assert_eq!(playlist(3, None).next(), Some(0));
        assert_eq!(playlist(3, None).prev(), None);
        assert_eq!(playlist(0, None).next(), None);
    }

    #[test]
    fn next_and_prev_stop_at_bounds() {
        assert_eq!(playlist(3, Some(2)).next(), None);
        assert_eq!(playlist(3, Some(0)).prev(), None);
        assert_eq!(playlist(3, Some(1)).next(), Some(2));
        assert_eq!(playlist(3, Some(1)).prev(), Some(0));
    }

    #[test]
    fn repeat_returns_current() {
        let mut p = playlist(3, Some(1));
        p.set_repeat(true);
        assert_eq!(p.next(), Some(1));
        assert_eq!(p.prev(), Some(1));

        let mut empty_cursor = playlist(3, None);
        empty_cursor.set_repeat(true);
        assert_eq!(empty_cursor.next(), Some(0));
    }

    #[test]
    fn regen_clears_out_of_range_cursor() {
        let mut p = playlist(5, Some(4));
        p.regen(Some(3));
        assert_eq!(p.order(), &[0, 1, 2]);
        assert_eq!(p.current(), None);

        let mut q = playlist(5, Some(2));
        q.regen(Some(3));
        assert_eq!(q.current(), Some(2));
    }

    #[test]
    fn remove_shifts_ids_and_cursor() {
        let mut p = Playlist::new();
        p.regen(Some(4));
        p.order = vec![3, 0, 2, 1];
        p.set_current(Some(2));

        p.remove(0);
        assert_eq!(p.order(), &[0, 2, 1]);
        assert_eq!(p.current(), Some(1));
        assert!(is_permutation(p.order()));
    }

    #[test]
    fn remove_cursor_entry_clears_cursor() {
        let mut p = playlist(3, Some(1));
        p.remove(1);
        assert_eq!(p.current(), None);
        assert_eq!(p.order(), &[0, 1]);
    }

    #[test]
    fn remove_after_cursor_keeps_cursor() {
        let mut p = playlist(3, Some(0));
        p.remove(2);
        assert_eq!(p.current(), Some(0));
        p.remove(7);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn move_entry_swaps_and_reports_position() {
        let mut p = playlist(4, Some(1));
        assert_eq!(p.move_entry(1, 2), 3);
        assert_eq!(p.order(), &[0, 3, 2, 1]);
        assert_eq!(p.current(), Some(3));
        assert_eq!(p.get(3), Some(1));
    }

    #[test]
    fn move_entry_out_of_range_is_noop() {
        let mut p = playlist(3, Some(0));
        assert_eq!(p.move_entry(0, -1), 0);
        assert_eq!(p.move_entry(2, 1), 2);
        assert_eq!(p.move_entry(5, -1), 5);
        assert_eq!(p.order(), &[0, 1, 2]);
    }

    #[test]
    fn shuffle_keeps_permutation_and_current_id() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut p = playlist(32, Some(5));
        for _ in 0..10 {
            p.shuffle_with(&mut rng);
            assert!(is_permutation(p.order()));
            assert_eq!(p.current_id(), Some(5));
        }
    }

    #[test]
    fn clear_keeps_repeat() {
        let mut p = playlist(3, Some(1));
        p.set_repeat(true);
        p.clear();
        assert!(p.is_empty());
        assert_eq!(p.current(), None);
        assert!(p.repeat());
    }
}
