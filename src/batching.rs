//! Splits a column into slot-sized batches.

use crate::context::EncryptionContext;
use crate::crypto::{CkksError, CkksResult};

/// Contiguous run of at most `capacity` values, borrowed from the column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch<'a> {
    pub index: usize,
    pub values: &'a [f64],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBatcher {
    capacity: usize,
}

impl SlotBatcher {
    pub fn new(capacity: usize) -> CkksResult<Self> {
        if capacity == 0 {
            return Err(CkksError::invalid_parameters(
                "slot capacity must be positive",
            ));
        }
        Ok(Self { capacity })
    }

    /// Batcher sized to the context's slot count.
    pub fn for_context(ctx: &EncryptionContext) -> Self {
        Self {
            capacity: ctx.slot_count(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `ceil(len / capacity)`
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.capacity)
    }

    /// Ordered, unpadded batches. Every batch but the last holds exactly
    /// `capacity` values; an empty column yields nothing.
    pub fn batches<'a>(&self, values: &'a [f64]) -> impl ExactSizeIterator<Item = Batch<'a>> + 'a {
        values
            .chunks(self.capacity)
            .enumerate()
            .map(|(index, values)| Batch { index, values })
    }
}
