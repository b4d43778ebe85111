//! Lazy regeneration of a report's broadcast numbers

use std::iter::FusedIterator;

use crate::chain::{TemporaryContactKey, TemporaryContactNumber};

/// Iterator over the numbers a reporter broadcast in `[start, end]`.
///
/// Holds a single chain key and ratchets it on demand, so a full
/// retrospective window never has to be materialized. Cloning the iterator
/// snapshots its position.
#[derive(Clone, Debug)]
pub struct TemporaryContactNumbers {
    next_key: Option<TemporaryContactKey>,
    end_index: u16,
}

impl TemporaryContactNumbers {
    pub(crate) fn new(start_key: TemporaryContactKey, end_index: u16) -> Self {
        let next_key = (start_key.index() <= end_index).then_some(start_key);
        Self { next_key, end_index }
    }

    fn remaining(&self) -> usize {
        self.next_key
            .as_ref()
            .map_or(0, |key| usize::from(self.end_index - key.index()) + 1)
    }
}

impl Iterator for TemporaryContactNumbers {
    type Item = TemporaryContactNumber;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next_key.take()?;
        let number = key.temporary_contact_number();

        if key.index() < self.end_index {
            // index < end_index <= u16::MAX, so the step cannot exhaust
            self.next_key = key.ratchet().ok();
        }

        Some(number)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TemporaryContactNumbers {}

impl FusedIterator for TemporaryContactNumbers {}
