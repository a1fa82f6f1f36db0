use std::fmt::Display;

use url::{Host, Url};

/// A URL taken apart, with its host split along the public suffix list.
///
/// Every part is kept exactly as it was written in the message, except for the
/// host parts, which are ASCII-lowercased. That way, putting it back together with
/// [`Display`] reproduces the original text when nothing was swapped out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedUrl {
    /// `http` or `https`.
    pub scheme: String,
    /// `user:password` part before the `@`, if any.
    pub userinfo: Option<String>,
    /// Everything before the registrable domain, like `www` or `old.m`. May be empty.
    pub subdomain: String,
    /// The registrable domain without its suffix, like `example` in `example.co.uk`.
    pub domain: String,
    /// Public suffix, like `co.uk`.
    pub suffix: String,
    /// Port after the `:`, if any. Kept as text so that a dangling `:` survives.
    pub port: Option<String>,
    /// Path, starting with `/` if non-empty.
    pub path: String,
    /// Query without the `?`.
    pub query: Option<String>,
    /// Fragment without the `#`.
    pub fragment: Option<String>,
    /// Whether the suffix comes from the private section of the list, like `github.io`.
    pub is_private: bool,
}

impl ParsedUrl {
    /// Domain and suffix together, like `example.co.uk`. This is what fixers are keyed by.
    #[must_use]
    pub fn registrable_domain(&self) -> String {
        format!("{}.{}", self.domain, self.suffix)
    }

    /// Full host name, like `www.example.co.uk`.
    #[must_use]
    pub fn host(&self) -> String {
        let mut host = String::with_capacity(
            self.subdomain.len() + self.domain.len() + self.suffix.len() + 2,
        );
        for part in [&self.subdomain, &self.domain, &self.suffix] {
            if part.is_empty() {
                continue;
            }
            if !host.is_empty() {
                host.push('.');
            }
            host.push_str(part);
        }
        host
    }
}

impl Display for ParsedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(userinfo) = &self.userinfo {
            write!(f, "{userinfo}@")?;
        }
        f.write_str(&self.host())?;
        if let Some(port) = &self.port {
            write!(f, ":{port}")?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Try to take a single word of a message apart as an `http(s)` URL.
///
/// Returns [`None`] for anything that doesn't start with `http://` or `https://`,
/// doesn't parse as a URL, has an IP address for a host, or has a host the public
/// suffix list can't find a registrable domain in.
#[must_use]
pub fn split(token: &str) -> Option<ParsedUrl> {
    let (scheme, rest) = if let Some(rest) = token.strip_prefix("https://") {
        ("https", rest)
    } else if let Some(rest) = token.strip_prefix("http://") {
        ("http", rest)
    } else {
        return None;
    };

    // Let the url crate be the judge of whether this is a URL at all.
    let url = Url::parse(token).ok()?;
    if !matches!(url.host(), Some(Host::Domain(_))) {
        return None;
    }

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, rest) = rest.split_at(authority_end);

    let (userinfo, host_and_port) = match authority.rsplit_once('@') {
        Some((userinfo, host_and_port)) => (Some(userinfo), host_and_port),
        None => (None, authority),
    };
    let (host, port) = match host_and_port.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|x| x.is_ascii_digit()) => (host, Some(port)),
        _ => (host_and_port, None),
    };

    let host = host.to_ascii_lowercase();
    let (subdomain, domain, suffix, is_private) = split_host(&host)?;

    let (rest, fragment) = match rest.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (rest, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    Some(ParsedUrl {
        scheme: scheme.to_string(),
        userinfo: userinfo.map(ToString::to_string),
        subdomain: subdomain.to_string(),
        domain: domain.to_string(),
        suffix: suffix.to_string(),
        port: port.map(ToString::to_string),
        path: path.to_string(),
        query: query.map(ToString::to_string),
        fragment: fragment.map(ToString::to_string),
        is_private,
    })
}

/// Split a lowercase host into subdomain, domain label, suffix, and whether the suffix
/// is a private one.
fn split_host(host: &str) -> Option<(&str, &str, &str, bool)> {
    let registrable = psl::domain(host.as_bytes())?;
    let suffix = registrable.suffix();
    let is_private = suffix.typ() == Some(psl::Type::Private);

    let registrable = std::str::from_utf8(registrable.as_bytes()).ok()?;
    let suffix_len = suffix.as_bytes().len();
    let suffix = registrable.get(registrable.len().checked_sub(suffix_len)?..)?;

    let domain = registrable.strip_suffix(suffix)?.strip_suffix('.')?;
    let subdomain = host
        .strip_suffix(registrable)?
        .strip_suffix('.')
        .unwrap_or_default();

    Some((subdomain, domain, suffix, is_private))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn splits_along_public_suffix() {
        let parsed = split("https://www.example.co.uk/a/b?c=d#e").unwrap();
        assert_eq!(parsed.scheme, "https");
        assert_eq!(parsed.subdomain, "www");
        assert_eq!(parsed.domain, "example");
        assert_eq!(parsed.suffix, "co.uk");
        assert_eq!(parsed.registrable_domain(), "example.co.uk");
        assert_eq!(parsed.path, "/a/b");
        assert_eq!(parsed.query.as_deref(), Some("c=d"));
        assert_eq!(parsed.fragment.as_deref(), Some("e"));
        assert!(!parsed.is_private);
    }

    #[test]
    fn bare_domain_has_no_subdomain() {
        let parsed = split("http://reddit.com").unwrap();
        assert_eq!(parsed.subdomain, "");
        assert_eq!(parsed.domain, "reddit");
        assert_eq!(parsed.suffix, "com");
        assert_eq!(parsed.path, "");
        assert_eq!(parsed.query, None);
        assert_eq!(parsed.host(), "reddit.com");
    }

    #[test]
    fn private_suffixes_are_flagged() {
        let parsed = split("https://someone.github.io/project").unwrap();
        assert_eq!(parsed.domain, "someone");
        assert_eq!(parsed.suffix, "github.io");
        assert!(parsed.is_private);
    }

    #[test]
    fn host_is_lowercased_but_rest_is_verbatim() {
        let parsed = split("https://Old.REDDIT.com/R/Rust?Sort=New").unwrap();
        assert_eq!(parsed.subdomain, "old");
        assert_eq!(parsed.registrable_domain(), "reddit.com");
        assert_eq!(parsed.path, "/R/Rust");
        assert_eq!(parsed.query.as_deref(), Some("Sort=New"));
    }

    #[test]
    fn userinfo_and_port_are_kept() {
        let parsed = split("https://me:pw@m.tiktok.com:8443/@someone").unwrap();
        assert_eq!(parsed.userinfo.as_deref(), Some("me:pw"));
        assert_eq!(parsed.port.as_deref(), Some("8443"));
        assert_eq!(parsed.subdomain, "m");
        assert_eq!(parsed.path, "/@someone");
    }

    #[test]
    fn reassembly_reproduces_the_token() {
        for token in [
            "https://www.reddit.com/r/test?x=1",
            "http://reddit.com",
            "https://x.com/someone/status/123#frag",
            "https://a.b.c.example.co.uk/path;params?q=%20#",
            "https://me:pw@m.tiktok.com:8443/@someone",
            "https://reddit.com?just=query",
            "https://reddit.com#just-fragment",
        ] {
            assert_eq!(split(token).unwrap().to_string(), token);
        }
    }

    #[test]
    fn reassembly_uses_swapped_parts() {
        let mut parsed = split("https://www.reddit.com/r/test?x=1").unwrap();
        parsed.domain = "rxddit".to_string();
        assert_eq!(parsed.to_string(), "https://www.rxddit.com/r/test?x=1");

        parsed.subdomain.clear();
        assert_eq!(parsed.to_string(), "https://rxddit.com/r/test?x=1");
    }

    #[test]
    fn non_candidates_are_ignored() {
        assert_eq!(split("reddit.com/r/test"), None);
        assert_eq!(split("ftp://reddit.com/"), None);
        assert_eq!(split("HTTPS://reddit.com/"), None);
        assert_eq!(split("(https://reddit.com/)"), None);
        assert_eq!(split("hello"), None);
    }

    #[test]
    fn malformed_urls_do_not_panic() {
        assert_eq!(split("http://"), None);
        assert_eq!(split("https://"), None);
        assert_eq!(split("http://[oops"), None);
        assert_eq!(split("http://exa%mple.com/"), None);
        assert_eq!(split("https://:80/"), None);
    }

    #[test]
    fn ip_hosts_are_ignored() {
        assert_eq!(split("http://127.0.0.1/"), None);
        assert_eq!(split("http://[::1]:8080/"), None);
    }
}
