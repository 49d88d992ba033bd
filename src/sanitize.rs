//! Turning controller-supplied client names into DNS labels.

use hickory_proto::rr::Name;

/// Characters kept as-is. Everything else becomes `-`.
///
/// `0` and `8` are deliberately absent: names containing them are folded
/// into hyphens, and existing zones depend on that mapping.
const ALLOWED: &str = "abcdefghijklmnopqrstuvwxyz12345679-";

/// Lowercase `raw` and reduce it to a single DNS label made of `[a-z0-9-]`.
///
/// Disallowed characters turn into `-`, runs of `-` collapse to one, and
/// leading or trailing `-` are dropped. Empty input gives empty output.
pub fn sanitize_name(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    // Lowercase per character: one char in, one char out. `str::to_lowercase`
    // expands some characters ('İ' becomes "i\u{307}") and applies
    // context rules that would change the resulting label.
    let mapped: String = raw
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .map(|c| if ALLOWED.contains(c) { c } else { '-' })
        .collect();

    mapped
        .split('-')
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Whether `name` is already a fully-qualified domain name
/// (dotted, with at least two labels that parse as a DNS name).
pub fn is_fqdn(name: &str) -> bool {
    let name = name.trim_end_matches('.');
    if !name.contains('.') {
        return false;
    }
    match Name::from_ascii(name) {
        Ok(parsed) => parsed.num_labels() >= 2,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !s.contains("--")
            && !s.starts_with('-')
            && !s.ends_with('-')
    }

    #[test]
    fn test_lowercases_and_replaces_spaces() {
        assert_eq!(sanitize_name("Living Room TV"), "living-room-tv");
    }

    #[test]
    fn test_lowercases_one_char_at_a_time() {
        assert_eq!(sanitize_name("İstanbul"), "istanbul");
        assert_eq!(sanitize_name("İ"), "i");
        assert_eq!(sanitize_name("ÉCRAN"), "cran");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn test_collapses_and_trims_hyphens() {
        assert_eq!(sanitize_name("--a__b--"), "a-b");
        assert_eq!(sanitize_name("  Printer  "), "printer");
        assert_eq!(sanitize_name("---"), "");
    }

    #[test]
    fn test_zero_and_eight_are_replaced() {
        assert_eq!(sanitize_name("nas01"), "nas-1");
        assert_eq!(sanitize_name("pi8"), "pi");
        assert_eq!(sanitize_name("host1234567"), "host1234567");
        assert_eq!(sanitize_name("808"), "");
    }

    #[test]
    fn test_dots_and_unicode_are_replaced() {
        assert_eq!(sanitize_name("tv.home.arpa"), "tv-home-arpa");
        assert_eq!(sanitize_name("Jürgen's iPhone"), "j-rgen-s-iphone");
    }

    #[test]
    fn test_idempotent_and_clean() {
        let samples = [
            "",
            "Living Room TV",
            "--x--",
            "ÄÖÜ",
            "a.b.c",
            "Host_Name-01",
            "MacBook Pro (2)",
            "printer",
            "8080",
            "a - - b",
        ];
        for sample in samples {
            let once = sanitize_name(sample);
            assert_eq!(sanitize_name(&once), once, "not idempotent for {sample:?}");
            assert!(is_clean(&once), "unclean output {once:?} for {sample:?}");
        }
    }

    #[test]
    fn test_is_fqdn() {
        assert!(is_fqdn("printer.home.arpa"));
        assert!(is_fqdn("printer.home.arpa."));
        assert!(!is_fqdn("printer"));
        assert!(!is_fqdn("living-room-tv"));
        assert!(!is_fqdn(""));
    }
}
