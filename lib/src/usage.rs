use std::sync::Arc;

use dashmap::DashSet;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::corpus::Corpus;
use crate::error::Result;

/// Icon style family, per the marker class preceding an icon class.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Family {
    Solid,
    Regular,
    Brand,
    /// The bare prefix marker, carrying no style of its own.
    Generic,
}

/// A single observed icon usage: the style family marker plus the icon name
/// with the class prefix stripped (`fa-arrow-right` scans as `arrow-right`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageToken {
    pub family: Family,
    pub name: Arc<str>,
}

/// Explicit scanner configuration.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Class prefix shared by family markers and icon classes. The
    /// recognized markers are `{prefix}`, `{prefix}s`, `{prefix}r`, and
    /// `{prefix}b`. Default: `fa`.
    pub prefix: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions { prefix: "fa".into() }
    }
}

/// The deduplicated result of a corpus scan.
///
/// Families are tracked per token, but name lookups deliberately ignore
/// them: a solid and a regular usage of the same name count as one.
#[derive(Debug)]
pub struct UsageSet {
    prefix: String,
    tokens: FxHashSet<UsageToken>,
    names: Vec<Arc<str>>,
    documents: usize,
}

impl UsageSet {
    pub fn new<I>(prefix: &str, tokens: I, documents: usize) -> Self
        where I: IntoIterator<Item = UsageToken>
    {
        let tokens: FxHashSet<UsageToken> = tokens.into_iter().collect();
        let mut names: Vec<Arc<str>> = tokens.iter()
            .map(|token| token.name.clone())
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();

        names.sort();
        UsageSet { prefix: prefix.into(), tokens, names, documents }
    }

    /// Number of distinct `(family, name)` tokens observed.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of documents scanned, for diagnostics.
    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Distinct names in sorted order, families discarded.
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &UsageToken> {
        self.tokens.iter()
    }
}

/// Scans every document in `corpus` for usage tokens, in parallel, and
/// merges the results into one deduplicated set.
pub fn scan(corpus: &Corpus, options: &ScanOptions) -> Result<UsageSet> {
    let tokens = DashSet::new();
    corpus.documents().par_iter()
        .map(|doc| {
            let text = doc.read_lossy()?;
            scan_text(&text, &options.prefix, |token| { tokens.insert(token); });
            Ok(())
        })
        .collect::<Result<()>>()?;

    Ok(UsageSet::new(&options.prefix, tokens, corpus.len()))
}

/// Extracts every usage token in `text`, invoking `found` once per match.
///
/// A match is a family marker as a whole word, at least one whitespace
/// character, then `{prefix}-` followed by one or more name characters.
/// The name runs to the last consecutive name character, so `fa-x` inside
/// `fas fa-x-wing` never surfaces as a separate `x` usage.
pub fn scan_text<F: FnMut(UsageToken)>(text: &str, prefix: &str, mut found: F) {
    use memchr::memmem;

    let needle = format!("{prefix}-");
    let finder = memmem::Finder::new(needle.as_bytes());
    let bytes = text.as_bytes();

    let mut at = 0;
    while let Some(i) = finder.find(&bytes[at..]) {
        let start = at + i;
        at = start + needle.len();

        let name_start = start + needle.len();
        let name_len = bytes[name_start..].iter()
            .take_while(|b| is_name_byte(**b))
            .count();
        if name_len == 0 {
            continue;
        }

        let Some(family) = family_before(bytes, start, prefix) else { continue };

        found(UsageToken {
            family,
            name: Arc::from(&text[name_start..name_start + name_len]),
        });

        at = name_start + name_len;
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Checks for a family marker ending just before the whitespace run that
/// precedes `end`, with a word boundary in front of the marker.
fn family_before(bytes: &[u8], end: usize, prefix: &str) -> Option<Family> {
    let mut i = end;
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }

    // The marker and the icon class must be distinct words.
    if i == end {
        return None;
    }

    let head = &bytes[..i];
    const SUFFIXES: [(&str, Family); 4] = [
        ("s", Family::Solid),
        ("r", Family::Regular),
        ("b", Family::Brand),
        ("", Family::Generic),
    ];

    for (suffix, family) in SUFFIXES {
        let marker_len = prefix.len() + suffix.len();
        if head.len() < marker_len {
            continue;
        }

        let (rest, tail) = head.split_at(head.len() - marker_len);
        if &tail[..prefix.len()] == prefix.as_bytes() && &tail[prefix.len()..] == suffix.as_bytes() {
            if rest.last().map_or(true, |&b| !is_word_byte(b)) {
                return Some(family);
            }
        }
    }

    None
}
