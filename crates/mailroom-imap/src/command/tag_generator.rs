//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0001", "A0002", etc. Each
/// engine owns its own generator, so separate connections never share a
/// counter.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    ///
    /// The counter wraps after `u32::MAX`; a tag is only ever compared with
    /// the single command in flight.
    pub fn next_tag(&mut self) -> String {
        self.counter = self.counter.wrapping_add(1);
        format!("{}{:04}", self.prefix, self.counter)
    }

    /// Returns the number of the last tag handed out.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next_tag(), "A0001");
        assert_eq!(generator.next_tag(), "A0002");
        assert_eq!(generator.current(), 2);
    }

    #[test]
    fn test_custom_prefix_and_padding() {
        let mut generator = TagGenerator::new('X');
        for _ in 0..99 {
            let _ = generator.next_tag();
        }
        assert_eq!(generator.next_tag(), "X0100");
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = TagGenerator::default();
        let mut b = TagGenerator::default();
        let _ = a.next_tag();
        let _ = a.next_tag();
        assert_eq!(b.next_tag(), "A0001");
    }

    #[test]
    fn test_wraps_without_panicking() {
        let mut generator = TagGenerator {
            counter: u32::MAX,
            prefix: 'A',
        };
        assert_eq!(generator.next_tag(), "A0000");
        assert_eq!(generator.next_tag(), "A0001");
    }

    #[test]
    fn test_uniqueness() {
        let mut generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10000 {
            assert!(seen.insert(generator.next_tag()), "duplicate tag generated");
        }
    }
}
