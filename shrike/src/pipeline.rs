use std::fs;
use std::fmt;
use std::path::PathBuf;

use waxwing::corpus::Corpus;
use waxwing::stylesheet::Stylesheet;
use waxwing::usage::{self, ScanOptions};
use waxwing::subset::{self, Kb, Savings};
use waxwing::error::{Chainable, NotFound, Result};
use waxwing::{err, error};

use crate::config::Settings;

/// One subsetting run over a built site.
#[derive(Debug)]
pub struct Pipeline {
    pub settings: Settings,
    pub quiet: bool,
}

/// What a run produced.
#[derive(Debug)]
pub enum Outcome {
    /// No usages were found; the source stylesheet was copied unchanged.
    Copied { documents: usize, output: PathBuf },
    /// A subset was extracted and written.
    Subset(Report),
}

#[derive(Debug)]
pub struct Report {
    pub documents: usize,
    pub icons: usize,
    pub rules_total: usize,
    pub rules_kept: usize,
    pub savings: Savings,
    pub output: PathBuf,
}

impl Pipeline {
    pub fn run(&self) -> Result<Outcome> {
        let settings = &self.settings;
        if settings.prefix.is_empty() {
            return err!("icon class prefix cannot be empty");
        }

        // The stylesheet is checked before any scanning so a bad path
        // fails fast instead of after a full corpus walk.
        let source = &settings.stylesheet;
        if !source.is_file() {
            return Err(NotFound { path: source.clone(), expected: "file" }.into());
        }

        let corpus = Corpus::build(&settings.pages, &settings.extension)?;
        self.say(format_args!("scanning {} .{} documents ({}) under {}",
            corpus.len(), settings.extension, Kb(corpus.total_bytes()),
            corpus.root().display()));

        let options = ScanOptions { prefix: settings.prefix.clone() };
        let set = usage::scan(&corpus, &options)?;
        let output = settings.output();

        if set.is_empty() {
            self.say(format_args!("no `{}` usages found; copying stylesheet unchanged",
                settings.prefix));

            let bytes = fs::read(source).chain_with(|| error! {
                "failed to read stylesheet",
                "path" => source.display(),
            })?;

            subset::write_atomic(&output, &bytes)?;
            return Ok(Outcome::Copied { documents: corpus.len(), output });
        }

        self.say(format_args!("found {} icons: {}", set.len(), set.names().join(", ")));

        let raw = fs::read_to_string(source).chain_with(|| error! {
            "failed to read stylesheet",
            "path" => source.display(),
        })?;

        let sheet = Stylesheet::parse(&raw).chain_with(|| error! {
            "failed to split stylesheet into rules",
            "path" => source.display(),
        })?;

        let allow = settings.allowlist();
        let kept = subset::extract(&sheet, &set, &allow);
        let css = subset::assemble(&kept);
        subset::write_atomic(&output, css.as_bytes())?;

        Ok(Outcome::Subset(Report {
            documents: corpus.len(),
            icons: set.len(),
            rules_total: sheet.len(),
            rules_kept: kept.len(),
            savings: Savings { original: raw.len(), subset: css.len() },
            output,
        }))
    }

    fn say(&self, message: fmt::Arguments<'_>) {
        if !self.quiet {
            println!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use waxwing::error::Kind;

    use super::*;

    const SHEET: &str = concat!(
        ".fa,.fas,.far,.fab{display:inline-block}",
        "@font-face{font-family:\"Icons\";src:url(icons.woff2)}",
        ".fa-arrow-right::before{content:\"\\f061\"}",
        ".fa-home::before{content:\"\\f015\"}",
    );

    fn site(root: &Path, page: &str) -> Pipeline {
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/index.html"), page).unwrap();
        fs::write(root.join("icons.css"), SHEET).unwrap();

        let settings = Settings {
            pages: root.join("dist"),
            stylesheet: root.join("icons.css"),
            output: Some(root.join("out/icons.css")),
            ..Settings::default()
        };

        Pipeline { settings, quiet: true }
    }

    #[test]
    fn copies_unchanged_when_nothing_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = site(tmp.path(), "<p>plain text</p>");

        match pipeline.run().unwrap() {
            Outcome::Copied { documents, output } => {
                assert_eq!(documents, 1);
                assert_eq!(fs::read_to_string(output).unwrap(), SHEET);
            }
            outcome => panic!("expected an unchanged copy, got {outcome:?}"),
        }
    }

    #[test]
    fn subsets_to_the_used_icons() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = site(tmp.path(), r#"<i class="fas fa-arrow-right"></i>"#);

        let Outcome::Subset(report) = pipeline.run().unwrap() else {
            panic!("expected a subset");
        };

        assert_eq!((report.rules_total, report.rules_kept), (4, 3));
        assert_eq!(report.icons, 1);

        let css = fs::read_to_string(&report.output).unwrap();
        assert!(css.contains(".fa-arrow-right::before"));
        assert!(!css.contains(".fa-home"));
        assert_eq!(report.savings.original, SHEET.len());
        assert_eq!(report.savings.subset, css.len());
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = site(tmp.path(), r#"<i class="fab fa-github"></i> <i class="fas fa-home"></i>"#);

        pipeline.run().unwrap();
        let first = fs::read(tmp.path().join("out/icons.css")).unwrap();
        pipeline.run().unwrap();
        let second = fs::read(tmp.path().join("out/icons.css")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_failure_leaves_the_destination_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = site(tmp.path(), r#"<i class="fas fa-home"></i>"#);
        fs::write(tmp.path().join("icons.css"), ".fa{display:inline-block").unwrap();
        fs::create_dir_all(tmp.path().join("out")).unwrap();
        fs::write(tmp.path().join("out/icons.css"), "previous output").unwrap();

        let error = pipeline.run().unwrap_err();
        assert_eq!(error.kind(), Kind::Parse);

        let dest = fs::read_to_string(tmp.path().join("out/icons.css")).unwrap();
        assert_eq!(dest, "previous output");
    }

    #[test]
    fn missing_inputs_fail_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = site(tmp.path(), "<p></p>");

        fs::remove_file(tmp.path().join("icons.css")).unwrap();
        assert_eq!(pipeline.run().unwrap_err().kind(), Kind::NotFound);

        fs::write(tmp.path().join("icons.css"), SHEET).unwrap();
        fs::remove_dir_all(tmp.path().join("dist")).unwrap();
        assert_eq!(pipeline.run().unwrap_err().kind(), Kind::NotFound);
    }
}
