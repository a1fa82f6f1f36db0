use std::{borrow::Cow, collections::BTreeMap, fmt::Display, sync::Arc};

use crate::database::{self, Database};

/// Fixers the bot ships with. Used as the static table, and to seed a fresh database.
pub static DEFAULT_FIXERS: &[(&str, &str)] = &[
    ("reddit.com", "rxddit"),
    ("tiktok.com", "vxtiktok"),
    ("x.com", "fixupx"),
    ("twitter.com", "fxtwitter"),
    ("instagram.com", "ddinstagram"),
];

/// A single entry of the domain fixer table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainFixer {
    /// Registrable domain to look for, like `reddit.com`. Always lowercase.
    pub original: String,
    /// Label to put in place of the domain label, like `rxddit`.
    pub fixer: String,
    /// Disabled entries are never applied.
    pub enabled: bool,
}

impl DomainFixer {
    #[must_use]
    pub fn new(original: &str, fixer: &str, enabled: bool) -> Self {
        Self {
            original: original.to_ascii_lowercase(),
            fixer: fixer.to_string(),
            enabled,
        }
    }
}

impl Display for DomainFixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = if self.enabled { "✅" } else { "❌" };
        write!(f, "{} {} -> {}", mark, self.original, self.fixer)
    }
}

/// Check a domain and a fixer label typed in by a person, and make an enabled
/// fixer out of them.
pub fn validate_fixer(original: &str, fixer: &str) -> Result<DomainFixer, &'static str> {
    let original = original.trim().to_ascii_lowercase();
    if psl::domain_str(&original) != Some(original.as_str()) {
        return Err("the domain must be a registrable domain, like reddit.com");
    }

    let fixer = fixer.trim().to_ascii_lowercase();
    // Same rules as any DNS label.
    let label_ok = (1..=63).contains(&fixer.len())
        && fixer.bytes().all(|x| x.is_ascii_alphanumeric() || x == b'-')
        && !fixer.starts_with('-')
        && !fixer.ends_with('-');
    if !label_ok {
        return Err("the fixer must be a single label of letters, digits and hyphens, like rxddit");
    }

    Ok(DomainFixer::new(&original, &fixer, true))
}

/// Snapshot of the fixers that are active right now, keyed by registrable domain.
///
/// Only enabled fixers ever make it in here, so a lookup miss is simply "don't touch it".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FixerTable(BTreeMap<String, String>);

impl FixerTable {
    /// Build a table out of fixer entries, dropping disabled ones.
    pub fn from_fixers(fixers: impl IntoIterator<Item = DomainFixer>) -> Self {
        Self(
            fixers
                .into_iter()
                .filter(|x| x.enabled)
                .map(|x| (x.original, x.fixer))
                .collect(),
        )
    }

    /// Table made of [`DEFAULT_FIXERS`].
    #[must_use]
    pub fn defaults() -> Self {
        Self::from_fixers(
            DEFAULT_FIXERS
                .iter()
                .map(|(original, fixer)| DomainFixer::new(original, fixer, true)),
        )
    }

    /// Find the fixer label for a registrable domain. The domain is matched
    /// ASCII-case-insensitively.
    #[must_use]
    pub fn lookup(&self, registrable_domain: &str) -> Option<&str> {
        let key: Cow<'_, str> = if registrable_domain.bytes().any(|x| x.is_ascii_uppercase()) {
            registrable_domain.to_ascii_lowercase().into()
        } else {
            registrable_domain.into()
        };
        self.0.get(key.as_ref()).map(String::as_str)
    }

    /// All active fixers, `original -> fixer`.
    #[must_use]
    pub fn all_active(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where the fixer table comes from. Picked once at startup.
pub enum DomainRegistry {
    /// A fixed table that never changes.
    Static(FixerTable),
    /// The `domain_fixers` table of the database, re-read on every snapshot so that
    /// toggling a fixer takes effect on the very next message.
    Persisted(Arc<Database>),
}

impl DomainRegistry {
    /// Get the currently active fixers.
    pub async fn snapshot(&self) -> Result<FixerTable, database::Error> {
        match self {
            Self::Static(table) => Ok(table.clone()),
            Self::Persisted(database) => Ok(FixerTable::from_fixers(
                database.get_domain_fixers(true).await?,
            )),
        }
    }

    /// The database behind this registry, if fixers are editable at all.
    #[must_use]
    pub fn database(&self) -> Option<&Database> {
        match self {
            Self::Static(_) => None,
            Self::Persisted(database) => Some(database.as_ref()),
        }
    }

    /// Short human readable name of the backing store.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static(_) => "static table",
            Self::Persisted(_) => "database",
        }
    }
}
