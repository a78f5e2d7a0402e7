//! Subjects are the courses learners enrol in and pay for.

/// Database identifier of a subject.
pub type SubjectId = i32;

/// A course or product offered on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub slug: String,
    pub name: String,
    pub active: bool,
    pub sort_order: i32,
}

impl Subject {
    /// Whether `key` identifies this subject: slug first, then name, both
    /// compared case-insensitively.
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim();
        !key.is_empty() && (self.slug.eq_ignore_ascii_case(key) || self.name.eq_ignore_ascii_case(key))
    }

    /// Human label used for checkout line items.
    pub fn item_name(&self) -> String {
        format!("{} Enrollment", self.name)
    }
}

/// Normalise a user-supplied subject key for lookups.
pub fn normalise_subject_key(raw: &str) -> Option<String> {
    let key = raw.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn loss() -> Subject {
        Subject {
            id: 7,
            slug: "loss".to_owned(),
            name: "Loss and Adaptation".to_owned(),
            active: true,
            sort_order: 1,
        }
    }

    #[rstest]
    #[case("loss", true)]
    #[case("LOSS", true)]
    #[case(" Loss and Adaptation ", true)]
    #[case("reading", false)]
    #[case("", false)]
    fn subject_keys_match_slug_or_name(#[case] key: &str, #[case] expected: bool) {
        assert_eq!(loss().matches_key(key), expected);
    }

    #[rstest]
    fn normalises_keys() {
        assert_eq!(normalise_subject_key("  Reading "), Some("reading".to_owned()));
        assert_eq!(normalise_subject_key("   "), None);
    }

    #[rstest]
    fn item_name_mentions_subject() {
        assert_eq!(loss().item_name(), "Loss and Adaptation Enrollment");
    }
}
