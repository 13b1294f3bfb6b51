use std::{fmt, fs};
use std::sync::Arc;
use std::path::Path;

use crate::error::{Chainable, Result};
use crate::stylesheet::{StyleRule, Stylesheet};
use crate::usage::UsageSet;

/// Rules kept unconditionally, independent of any usage.
#[derive(Debug, Clone)]
pub struct CoreAllowlist {
    /// At-rule keywords always kept. Default: `font-face`, since font
    /// loading must work regardless of which icons are used.
    pub at_rules: Vec<String>,
    /// Selectors kept when one appears as a whole comma-separated member
    /// of a rule's selector list. Default: the family base classes.
    pub selectors: Vec<String>,
}

impl Default for CoreAllowlist {
    fn default() -> Self {
        CoreAllowlist {
            at_rules: vec!["font-face".into()],
            selectors: [".fa", ".fas", ".far", ".fab", ".fal"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// How a rule relates to the observed usage set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Kept unconditionally.
    Core,
    /// Kept because the named icon is used.
    Icon(Arc<str>),
    /// Dropped.
    Unrelated,
}

const PSEUDO_MARKERS: [&str; 4] = ["::before", ":before", "::after", ":after"];

/// Classifies one rule against the usage set and allowlist. First match
/// wins: core at-rule, then core selector member, then icon reference.
/// Pure in its inputs; two passes over the same rule always agree.
pub fn classify(rule: &StyleRule, usage: &UsageSet, allow: &CoreAllowlist) -> Classification {
    if let Some(keyword) = rule.at_keyword() {
        if allow.at_rules.iter().any(|k| k == keyword) {
            return Classification::Core;
        }
    }

    if rule.selectors().any(|member| allow.selectors.iter().any(|s| s == member)) {
        return Classification::Core;
    }

    // Names iterate in sorted order, so the winning tag is deterministic
    // even for a rule that references several used icons.
    for name in usage.names() {
        if references_icon(rule.text(), usage.prefix(), name) {
            return Classification::Icon(name.clone());
        }
    }

    Classification::Unrelated
}

/// Whether `{prefix}-{name}` occurs immediately followed by a before/after
/// pseudo-element anywhere in the rule text.
fn references_icon(text: &str, prefix: &str, name: &str) -> bool {
    use memchr::memmem;

    let class = format!("{prefix}-{name}");
    memmem::find_iter(text.as_bytes(), class.as_bytes()).any(|i| {
        let rest = &text[i + class.len()..];
        PSEUDO_MARKERS.iter().any(|marker| rest.starts_with(marker))
    })
}

/// Keeps exactly the core rules plus the icon rules named by `usage`,
/// preserving source order.
pub fn extract<'s>(
    sheet: &'s Stylesheet,
    usage: &UsageSet,
    allow: &CoreAllowlist,
) -> Vec<&'s StyleRule> {
    sheet.rules().iter()
        .filter(|rule| classify(rule, usage, allow) != Classification::Unrelated)
        .collect()
}

/// Joins kept rules into the output stylesheet text.
pub fn assemble(rules: &[&StyleRule]) -> String {
    rules.iter()
        .map(|rule| rule.text())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte metrics for one subsetting run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Savings {
    pub original: usize,
    pub subset: usize,
}

impl Savings {
    pub fn saved(&self) -> usize {
        self.original.saturating_sub(self.subset)
    }

    pub fn percent(&self) -> f64 {
        if self.original == 0 {
            return 0.0;
        }

        self.saved() as f64 / self.original as f64 * 100.0
    }
}

impl fmt::Display for Savings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({:.1}% smaller)",
            Kb(self.original), Kb(self.subset), self.percent())
    }
}

/// A byte count displayed in KB with one decimal.
pub struct Kb(pub usize);

impl fmt::Display for Kb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} KB", self.0 as f64 / 1024.0)
    }
}

/// Writes `contents` to `path` all-or-nothing: the bytes land in a
/// temporary sibling first and are renamed into place, so a failed run
/// never leaves a partial file at the destination.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).chain_with(|| error! {
            "failed to create output directory",
            "path" => parent.display(),
        })?;
    }

    let staging = path.with_extension("tmp");
    if let Err(e) = fs::write(&staging, contents) {
        let _ = fs::remove_file(&staging);
        return Err(e).chain_with(|| error! {
            "failed to stage output file",
            "path" => staging.display(),
        });
    }

    fs::rename(&staging, path).chain_with(|| error! {
        "failed to move staged output into place",
        "from" => staging.display(),
        "to" => path.display(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{Family, UsageToken};

    const SHEET: &str = concat!(
        ".fa,.fas,.far,.fab{display:inline-block;font-style:normal}",
        "@font-face{font-family:\"Icons\";src:url(icons.woff2) format(\"woff2\")}",
        ".fa-arrow-right::before{content:\"\\f061\"}",
        ".fa-home::before{content:\"\\f015\"}",
    );

    fn usage(names: &[&str]) -> UsageSet {
        let tokens = names.iter()
            .map(|name| UsageToken { family: Family::Solid, name: (*name).into() });
        UsageSet::new("fa", tokens, 1)
    }

    fn kept_texts(source: &str, names: &[&str]) -> Vec<String> {
        let sheet = Stylesheet::parse(source).unwrap();
        extract(&sheet, &usage(names), &CoreAllowlist::default())
            .iter()
            .map(|rule| rule.text().to_string())
            .collect()
    }

    #[test]
    fn keeps_core_and_used_icons_only() {
        let kept = kept_texts(SHEET, &["arrow-right"]);
        assert_eq!(kept.len(), 3);
        assert!(kept[0].starts_with(".fa,"));
        assert!(kept[1].starts_with("@font-face"));
        assert!(kept[2].starts_with(".fa-arrow-right"));
    }

    #[test]
    fn empty_usage_keeps_exactly_the_core() {
        let kept = kept_texts(SHEET, &[]);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].starts_with(".fa,"));
        assert!(kept[1].starts_with("@font-face"));
    }

    #[test]
    fn core_selectors_match_whole_members_only() {
        // `.fab` appears as a member; `.fast` merely starts with one.
        assert_eq!(kept_texts(".x,.fab{a:1}", &[]).len(), 1);
        assert_eq!(kept_texts(".fast{a:1}", &[]).len(), 0);
        assert_eq!(kept_texts(".fa .x{a:1}", &[]).len(), 0);
    }

    #[test]
    fn kept_rules_preserve_source_order() {
        let source = ".fa-zebra::before{c:1}.fa-apple::before{c:2}";
        let kept = kept_texts(source, &["apple", "zebra"]);
        assert!(kept[0].contains("zebra") && kept[1].contains("apple"));
    }

    #[test]
    fn font_face_wins_over_an_icon_reference() {
        let source = "@font-face{/* fa-home::before */src:url(x.woff2)}";
        let sheet = Stylesheet::parse(source).unwrap();
        let class = classify(&sheet.rules()[0], &usage(&["home"]), &CoreAllowlist::default());
        assert_eq!(class, Classification::Core);
    }

    #[test]
    fn icon_reference_requires_an_abutting_pseudo_element() {
        assert_eq!(kept_texts(".fa-home:before{c:1}", &["home"]).len(), 1);
        assert_eq!(kept_texts(".fa-home-alt::before{c:1}", &["home"]).len(), 0);
        assert_eq!(kept_texts(".fa-home{c:1}", &["home"]).len(), 0);
    }

    #[test]
    fn classification_ignores_the_token_family() {
        let tokens = [UsageToken { family: Family::Brand, name: "home".into() }];
        let set = UsageSet::new("fa", tokens, 1);
        let sheet = Stylesheet::parse(".fa-home::before{c:1}").unwrap();
        assert_eq!(extract(&sheet, &set, &CoreAllowlist::default()).len(), 1);
    }

    #[test]
    fn subsetting_is_idempotent() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let set = usage(&["arrow-right", "home"]);
        let allow = CoreAllowlist::default();

        let once = assemble(&extract(&sheet, &set, &allow));
        let resheet = Stylesheet::parse(&once).unwrap();
        let twice = assemble(&extract(&resheet, &set, &allow));
        assert_eq!(once, twice);
    }

    #[test]
    fn savings_metrics_are_exact() {
        let savings = Savings { original: 2048, subset: 512 };
        assert_eq!(savings.saved(), 1536);
        assert_eq!(savings.percent(), 75.0);
        assert_eq!(savings.to_string(), "2.0 KB -> 0.5 KB (75.0% smaller)");
        assert_eq!(Savings { original: 0, subset: 0 }.percent(), 0.0);
    }

    #[test]
    fn write_atomic_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("assets/css/icons.min.css");
        write_atomic(&out, b".fa{}").unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b".fa{}");
        assert!(!out.with_extension("tmp").exists());
    }
}
