use std::collections::HashMap;

use regex::{Captures, Regex};

use super::{registry::FixerTable, url_parts::split};

/// What to do with a bare `www` subdomain when fixing a URL.
///
/// Matching is unaffected either way: `www.reddit.com` and `reddit.com` both match
/// `reddit.com` since matching goes by registrable domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WwwPolicy {
    /// `https://www.reddit.com/` becomes `https://www.rxddit.com/`.
    #[default]
    Keep,
    /// `https://www.reddit.com/` becomes `https://rxddit.com/`.
    Drop,
}

/// Knobs for [`rewrite`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewritePolicy {
    pub www: WwwPolicy,
}

/// Result of [`rewrite`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rewrite<'a> {
    /// Nothing to fix; this is the input text as is.
    Unchanged(&'a str),
    /// Text with URLs fixed and the attribution line appended.
    Changed(String),
}

impl Rewrite<'_> {
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Unchanged(text) => text,
            Self::Changed(text) => text,
        }
    }
}

/// Line appended to every fixed message.
#[must_use]
pub fn attribution_line(author: &str) -> String {
    format!("Original message posted by {author}")
}

/// Produce the fixed version of a single word, if it's a URL with an active fixer.
///
/// Returns [`None`] if the word isn't a URL, its domain has no fixer, or
/// fixing it wouldn't change anything.
#[must_use]
pub fn fix_url(token: &str, table: &FixerTable, policy: &RewritePolicy) -> Option<String> {
    let mut parsed = split(token)?;
    let fixer = table.lookup(&parsed.registrable_domain())?;

    parsed.domain = fixer.to_string();
    if policy.www == WwwPolicy::Drop && parsed.subdomain == "www" {
        parsed.subdomain.clear();
    }

    let fixed = parsed.to_string();
    (fixed != token).then_some(fixed)
}

/// Find all URLs in the text that should be fixed, paired with their fixed versions.
///
/// The text is split by whitespace, so a URL glued to other text is not seen.
/// Each URL appears once, in order of its first appearance.
#[must_use]
pub fn find_fixable_urls<'t>(
    text: &'t str,
    table: &FixerTable,
    policy: &RewritePolicy,
) -> Vec<(&'t str, String)> {
    let mut output: Vec<(&'t str, String)> = Vec::new();
    for token in text.split_whitespace() {
        if output.iter().any(|(seen, _)| *seen == token) {
            continue;
        }
        if let Some(fixed) = fix_url(token, table, policy) {
            output.push((token, fixed));
        }
    }
    output
}

/// Replace every occurrence of every original URL with its fixed version in one pass.
///
/// Longer originals win where several start at the same spot, so a URL that's a prefix
/// of another one can't mangle it.
fn substitute(text: &str, replacements: &[(&str, String)]) -> String {
    let lookup: HashMap<&str, &str> = replacements
        .iter()
        .map(|(original, fixed)| (*original, fixed.as_str()))
        .collect();

    let mut originals: Vec<&str> = lookup.keys().copied().collect();
    originals.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let pattern = originals
        .iter()
        .map(|x| regex::escape(x))
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&pattern) {
        Ok(regex) => regex
            .replace_all(text, |caps: &Captures<'_>| {
                let found = &caps[0];
                lookup.get(found).copied().unwrap_or(found).to_string()
            })
            .into_owned(),
        Err(e) => {
            // Only happens if the pattern is too large. Plain replacing is good enough then.
            log::warn!("Failed to build URL substitution regex: {e}");
            let mut output = text.to_string();
            for original in originals {
                output = output.replace(original, lookup[original]);
            }
            output
        }
    }
}

/// Fix all URLs in a message's text with the given fixer table.
///
/// If nothing needs fixing, returns [`Rewrite::Unchanged`] without building anything.
/// Otherwise, every occurrence of each fixable URL is replaced, and a line naming the
/// `author` is appended.
#[must_use]
pub fn rewrite<'a>(
    text: &'a str,
    author: &str,
    table: &FixerTable,
    policy: &RewritePolicy,
) -> Rewrite<'a> {
    if table.is_empty() {
        return Rewrite::Unchanged(text);
    }

    let replacements = find_fixable_urls(text, table, policy);
    if replacements.is_empty() {
        log::debug!("No suitable domain or any URL found");
        return Rewrite::Unchanged(text);
    }

    let mut fixed = substitute(text, &replacements);
    fixed.push('\n');
    fixed.push_str(&attribution_line(author));

    Rewrite::Changed(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixers::registry::DomainFixer;

    fn reddit_only() -> FixerTable {
        FixerTable::from_fixers([DomainFixer::new("reddit.com", "rxddit", true)])
    }

    #[test]
    fn keeps_subdomain_suffix_and_query() {
        let text = "https://www.reddit.com/r/test?x=1";
        let result = rewrite(text, "@someone", &reddit_only(), &RewritePolicy::default());
        assert_eq!(
            result,
            Rewrite::Changed(
                "https://www.rxddit.com/r/test?x=1\nOriginal message posted by @someone"
                    .to_string()
            )
        );
        assert!(result.changed());
    }

    #[test]
    fn text_without_fixable_urls_is_untouched() {
        let table = FixerTable::defaults();
        let policy = RewritePolicy::default();
        for text in [
            "",
            "hello there",
            "https://example.com/r/test",
            "reddit.com/r/test without a scheme",
            "look at this:https://reddit.com/r/test",
            "ftp://reddit.com/file",
        ] {
            assert_eq!(
                rewrite(text, "@someone", &table, &policy),
                Rewrite::Unchanged(text)
            );
        }
    }

    #[test]
    fn only_matching_urls_are_replaced() {
        let text = "see https://reddit.com/r/a and https://example.com/b";
        let result = rewrite(text, "Some One", &reddit_only(), &RewritePolicy::default());
        assert_eq!(
            result.text(),
            "see https://rxddit.com/r/a and https://example.com/b\nOriginal message posted by Some One"
        );
    }

    #[test]
    fn repeated_urls_are_all_replaced() {
        let text = "https://reddit.com/r/a\nagain: https://reddit.com/r/a !";
        let result = rewrite(text, "@a", &reddit_only(), &RewritePolicy::default());
        assert_eq!(
            result.text(),
            "https://rxddit.com/r/a\nagain: https://rxddit.com/r/a !\nOriginal message posted by @a"
        );
    }

    #[test]
    fn replacements_come_in_order_of_appearance() {
        let text = "https://x.com/a https://reddit.com/b https://x.com/a https://tiktok.com/c";
        let found = find_fixable_urls(text, &FixerTable::defaults(), &RewritePolicy::default());
        assert_eq!(
            found,
            vec![
                ("https://x.com/a", "https://fixupx.com/a".to_string()),
                ("https://reddit.com/b", "https://rxddit.com/b".to_string()),
                ("https://tiktok.com/c", "https://vxtiktok.com/c".to_string()),
            ]
        );
    }

    #[test]
    fn prefix_urls_do_not_mangle_each_other() {
        let text = "https://reddit.com/r https://reddit.com/r/rust";
        let result = rewrite(text, "@a", &reddit_only(), &RewritePolicy::default());
        assert_eq!(
            result.text(),
            "https://rxddit.com/r https://rxddit.com/r/rust\nOriginal message posted by @a"
        );
    }

    #[test]
    fn disabled_fixers_are_not_applied() {
        let table = FixerTable::from_fixers([
            DomainFixer::new("reddit.com", "rxddit", false),
            DomainFixer::new("x.com", "fixupx", true),
        ]);
        let text = "https://reddit.com/r/a";
        assert_eq!(
            rewrite(text, "@a", &table, &RewritePolicy::default()),
            Rewrite::Unchanged(text)
        );
    }

    #[test]
    fn malformed_tokens_are_skipped() {
        let text = "http://[oops https:// https://reddit.com/ok";
        let result = rewrite(text, "@a", &reddit_only(), &RewritePolicy::default());
        assert_eq!(
            result.text(),
            "http://[oops https:// https://rxddit.com/ok\nOriginal message posted by @a"
        );
    }

    #[test]
    fn www_policy() {
        let table = reddit_only();
        let drop = RewritePolicy {
            www: WwwPolicy::Drop,
        };
        assert_eq!(
            fix_url("https://www.reddit.com/r/a", &table, &drop).as_deref(),
            Some("https://rxddit.com/r/a")
        );
        // Only a bare "www" is dropped.
        assert_eq!(
            fix_url("https://old.reddit.com/r/a", &table, &drop).as_deref(),
            Some("https://old.rxddit.com/r/a")
        );
        assert_eq!(
            fix_url("https://www.reddit.com/r/a", &table, &RewritePolicy::default()).as_deref(),
            Some("https://www.rxddit.com/r/a")
        );
    }

    #[test]
    fn fixer_equal_to_domain_is_not_a_change() {
        let table = FixerTable::from_fixers([DomainFixer::new("reddit.com", "reddit", true)]);
        let text = "https://reddit.com/r/a";
        assert_eq!(
            rewrite(text, "@a", &table, &RewritePolicy::default()),
            Rewrite::Unchanged(text)
        );
    }

    #[test]
    fn same_input_same_output() {
        let table = FixerTable::defaults();
        let policy = RewritePolicy::default();
        let text = "https://twitter.com/a/status/1 and https://www.instagram.com/p/x/";
        let first = rewrite(text, "@a", &table, &policy);
        let second = rewrite(text, "@a", &table, &policy);
        assert_eq!(first, second);
        assert_eq!(
            first.text(),
            concat!(
                "https://fxtwitter.com/a/status/1 and https://www.ddinstagram.com/p/x/\n",
                "Original message posted by @a"
            )
        );
    }
}
