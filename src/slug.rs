// Two-word session slugs ("bold-fox") for human-readable conversation URLs

use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "bold", "calm", "deep", "eager", "fair", "fond", "glad", "keen",
    "late", "loud", "mild", "neat", "pale", "quick", "rare", "ripe",
    "sage", "sharp", "shy", "sly", "soft", "stern", "swift", "tall",
    "tart", "tidy", "vast", "warm", "wise", "wry", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "fox", "owl", "elk", "wren", "lynx", "hare", "crow", "dove",
    "finch", "heron", "ibis", "kite", "lark", "mole", "newt", "otter",
    "pike", "quail", "raven", "seal", "stork", "swan", "teal", "toad",
    "trout", "vole", "wasp", "whale", "wolf", "yak", "bear", "crane",
];

/// Generate a candidate two-word slug. Uniqueness is enforced by the
/// transcripts table's UNIQUE constraint; callers retry on collision.
pub fn generate() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
    let noun = NOUNS[bytes[1] as usize % NOUNS.len()];
    format!("{}-{}", adjective, noun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_shape() {
        let slug = generate();
        let parts: Vec<&str> = slug.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(ADJECTIVES.contains(&parts[0]));
        assert!(NOUNS.contains(&parts[1]));
    }

    #[test]
    fn test_slugs_vary() {
        // 32x32 candidate space; 50 draws should not all agree
        let first = generate();
        let varied = (0..50).any(|_| generate() != first);
        assert!(varied);
    }
}
