//! Identifier generation for new records
//!
//! Identifiers are a fixed prefix plus a zero-padded sequence number
//! (`STU0001`, `STU0002`, ...). The sequence is a monotonic counter rather
//! than "smallest free number", so an id is never handed out twice, even
//! after the record that carried it has been deleted.

/// Sequence-based identifier generator
///
/// # Example
///
/// ```
/// use campstore::IdGenerator;
///
/// let mut ids = IdGenerator::new("STU", 4);
/// assert_eq!(ids.next(|_| false), "STU0001");
///
/// // Skips values that are already taken
/// assert_eq!(ids.next(|id| id == "STU0002"), "STU0003");
/// ```
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    width: usize,
    next_seq: u64,
}

impl IdGenerator {
    pub fn new(prefix: &str, width: usize) -> Self {
        IdGenerator {
            prefix: prefix.to_string(),
            width,
            next_seq: 1,
        }
    }

    /// Rebuild the generator from persisted state
    ///
    /// The counter resumes after the larger of the stored high-water mark
    /// and the highest sequence found among `existing` ids.
    pub fn resume<'a>(
        prefix: &str,
        width: usize,
        stored_next: Option<u64>,
        existing: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut ids = IdGenerator::new(prefix, width);
        let highest = existing
            .into_iter()
            .filter_map(|id| ids.parse_seq(id))
            .max()
            .map_or(1, |seq| seq.saturating_add(1));
        ids.next_seq = highest.max(stored_next.unwrap_or(1)).max(1);
        ids
    }

    /// The sequence number the next identifier will start from
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn format(&self, seq: u64) -> String {
        format!("{}{:0width$}", self.prefix, seq, width = self.width)
    }

    /// Extract the sequence number from an id carrying this generator's prefix
    pub fn parse_seq(&self, id: &str) -> Option<u64> {
        let digits = id.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Propose the next free identifier without consuming it
    ///
    /// Returns the id and the counter value to store once the record that
    /// uses it has been committed.
    pub fn candidate(&self, is_taken: impl Fn(&str) -> bool) -> (String, u64) {
        let mut seq = self.next_seq;
        loop {
            let id = self.format(seq);
            seq = seq.saturating_add(1);
            if !is_taken(&id) {
                return (id, seq);
            }
        }
    }

    /// Move the counter forward; never moves it backwards
    pub fn advance_to(&mut self, next_seq: u64) {
        self.next_seq = self.next_seq.max(next_seq);
    }

    /// Take the next free identifier
    pub fn next(&mut self, is_taken: impl Fn(&str) -> bool) -> String {
        let (id, next_seq) = self.candidate(is_taken);
        self.advance_to(next_seq);
        id
    }
}
