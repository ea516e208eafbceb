//! Round-robin merging of iterators.

use std::collections::VecDeque;
use std::iter::FusedIterator;

/// Iterator that takes one item from each source in turn.
///
/// A source that runs dry is dropped from the rotation and the remaining
/// sources keep alternating, so `round_robin(["ABC", "D", "EF"])` (as chars)
/// yields `A D E B F C`.
#[derive(Debug, Clone)]
pub struct RoundRobin<I> {
    pending: VecDeque<I>,
}

/// Creates a [`RoundRobin`] over the given sources, starting with the first.
pub fn round_robin<S>(sources: S) -> RoundRobin<<S::Item as IntoIterator>::IntoIter>
where
    S: IntoIterator,
    S::Item: IntoIterator,
{
    RoundRobin {
        pending: sources.into_iter().map(IntoIterator::into_iter).collect(),
    }
}

impl<I: Iterator> Iterator for RoundRobin<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(mut source) = self.pending.pop_front() {
            if let Some(item) = source.next() {
                self.pending.push_back(source);
                return Some(item);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending
            .iter()
            .map(Iterator::size_hint)
            .fold((0, Some(0)), |(lo, hi), (l, h)| {
                (
                    lo.saturating_add(l),
                    hi.zip(h).and_then(|(a, b)| a.checked_add(b)),
                )
            })
    }
}

impl<I: Iterator> FusedIterator for RoundRobin<I> {}
