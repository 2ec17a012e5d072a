//! Built-in subject catalogue offered when starting a quiz.

pub const SUBJECTS: [&str; 10] = [
    "Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "Computer Science",
    "History",
    "Geography",
    "English Literature",
    "Economics",
    "Psychology",
];

/// Subject attached to free-form tutor chats.
pub const DEFAULT_CHAT_SUBJECT: &str = "General";

/// Case-insensitive lookup that returns the canonical spelling.
#[must_use]
pub fn canonical_subject(raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    SUBJECTS
        .iter()
        .copied()
        .find(|subject| subject.eq_ignore_ascii_case(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_subject_ignores_case_and_whitespace() {
        assert_eq!(canonical_subject("  computer science "), Some("Computer Science"));
        assert_eq!(canonical_subject("Alchemy"), None);
    }
}
