use crate::error::RecordError;

/// Initial value of every sequence counter.
pub const SEQUENCE_SEED: u8 = 0xAB;

/// Rolling 8-bit sequence number attached to every record of one channel endpoint.
///
/// Writers call [`SequenceCounter::next`] for each record; readers mirror the
/// counter and call [`SequenceCounter::check`] to detect desynchronisation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// Creates a counter starting at [`SEQUENCE_SEED`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: SEQUENCE_SEED,
        }
    }

    /// Returns the sequence number for the next record and advances the counter.
    #[allow(clippy::should_implement_trait)]
    pub const fn next(&mut self) -> u8 {
        let current = self.next;
        self.next = current.wrapping_add(1);
        current
    }

    /// Returns the value the next call to [`SequenceCounter::next`] will produce.
    #[must_use]
    pub const fn peek(&self) -> u8 {
        self.next
    }

    /// Verifies that `actual` is the expected sequence number and advances.
    pub fn check(&mut self, actual: u8) -> Result<(), RecordError> {
        let expected = self.next();
        if expected == actual {
            Ok(())
        } else {
            Err(RecordError::OutOfSequence { expected, actual })
        }
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_seed_and_wraps() {
        let mut counter = SequenceCounter::new();
        assert_eq!(counter.next(), 0xAB);
        for _ in 0..(0xFF - 0xAB) {
            counter.next();
        }
        assert_eq!(counter.next(), 0x00);
        assert_eq!(counter.peek(), 0x01);
    }

    #[test]
    fn check_accepts_mirrored_sequence() {
        let mut writer = SequenceCounter::new();
        let mut reader = SequenceCounter::default();
        for _ in 0..600 {
            reader.check(writer.next()).expect("sequences stay aligned");
        }
    }

    #[test]
    fn check_reports_skipped_record() {
        let mut reader = SequenceCounter::new();
        let error = reader.check(0xAC).unwrap_err();
        assert!(matches!(
            error,
            RecordError::OutOfSequence {
                expected: 0xAB,
                actual: 0xAC
            }
        ));
    }
}
