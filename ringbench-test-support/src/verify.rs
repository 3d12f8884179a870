//! Ordering verification for single-producer streams.

/// Checks that values arrive as 0, 1, 2, ...
#[derive(Debug, Default, Clone)]
pub struct SequenceChecker {
    expected: u64,
    received: u64,
    errors: u64,
    first_error: Option<(u64, u64)>,
}

impl SequenceChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value`. Returns false if it was not the expected one;
    /// the checker then resynchronises on `value + 1`.
    pub fn check(&mut self, value: u64) -> bool {
        self.received += 1;
        let ok = value == self.expected;
        if !ok {
            self.errors += 1;
            self.first_error.get_or_insert((self.expected, value));
        }
        self.expected = value.wrapping_add(1);
        ok
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// `(expected, got)` of the first out-of-order value
    pub fn first_error(&self) -> Option<(u64, u64)> {
        self.first_error
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order() {
        let mut checker = SequenceChecker::new();
        assert!((0..100).all(|v| checker.check(v)));
        assert!(checker.is_clean());
        assert_eq!(checker.received(), 100);
    }

    #[test]
    fn test_gap_and_repeat() {
        let mut checker = SequenceChecker::new();
        checker.check(0);
        assert!(!checker.check(2));
        assert!(checker.check(3));
        assert!(!checker.check(3));
        assert_eq!(checker.errors(), 2);
        assert_eq!(checker.first_error(), Some((1, 2)));
    }
}
