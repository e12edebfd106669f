//! Small text and identifier helpers shared by the handlers.

use chrono::{DateTime, Utc};
use rand::Rng;

const ACCOUNT_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ACCOUNT_CODE_LEN: usize = 6;

/// Attempts made before account-code generation gives up.
pub const ACCOUNT_CODE_ATTEMPTS: usize = 10;

/// Random `SA-XXXXXX` account code (uppercase letters and digits).
pub fn random_account_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..ACCOUNT_CODE_LEN)
        .map(|_| char::from(ACCOUNT_CODE_CHARSET[rng.gen_range(0..ACCOUNT_CODE_CHARSET.len())]))
        .collect();
    format!("SA-{suffix}")
}

/// Support thread id: unix seconds followed by a four-digit sub-second sequence.
pub fn thread_id(now: DateTime<Utc>) -> String {
    let seq = match now.timestamp_subsec_nanos() % 10_000 {
        0 => 1,
        n => n,
    };
    format!("{}{seq:04}", now.timestamp())
}

/// Cut `text` to at most `max_chars` characters, appending `...` when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Content between the first `<tag>` and the following `</tag>`, trimmed.
pub fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = start + text[start..].find(&close)?;
    let inner = text[start..end].trim();
    (!inner.is_empty()).then_some(inner)
}

/// Mask a secret for display, keeping at most the last four characters.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn account_code_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let code = random_account_code(&mut rng);
            assert_eq!(code.len(), 9);
            assert!(code.starts_with("SA-"));
            assert!(code[3..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn thread_id_uses_seconds_and_sequence() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(thread_id(at), "17000000006789");
    }

    #[test]
    fn thread_id_never_uses_zero_sequence() {
        let at = Utc.timestamp_opt(1_700_000_000, 20_000).unwrap();
        assert_eq!(thread_id(at), "17000000000001");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ñañaña", 2), "ña...");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn extract_tag_finds_inner_text() {
        let notes = "see <redirectionlink> https://x.test/a </redirectionlink> now";
        assert_eq!(extract_tag(notes, "redirectionlink"), Some("https://x.test/a"));
        assert_eq!(extract_tag("<redirectionlink></redirectionlink>", "redirectionlink"), None);
        assert_eq!(extract_tag("no tags", "redirectionlink"), None);
        assert_eq!(extract_tag("</redirectionlink><redirectionlink>", "redirectionlink"), None);
    }

    #[test]
    fn mask_secret_keeps_tail() {
        assert_eq!(mask_secret(""), "(unset)");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
    }
}
