//! Capability token generation

/// Generate a fresh, globally-unique opaque token.
///
/// Rendered as a UUIDv4 string, matching the original broker's
/// `uuid.uuid4()` token format so unmodified clients keep working.
pub fn generate() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate()));
        }
    }

    #[test]
    fn tokens_look_like_uuids() {
        let token = generate();
        assert_eq!(token.len(), 36);
        assert_eq!(token.chars().filter(|&c| c == '-').count(), 4);
    }
}
