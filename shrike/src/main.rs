use std::time::SystemTime;

use waxwing::subset::Kb;

use crate::config::Settings;
use crate::pipeline::{Outcome, Pipeline};

mod config;
mod pipeline;

pub const CONFIG_FILE: &str = "shrike.toml";

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Subset a vendor icon stylesheet to the icons a built site uses.
        cmd shrike {
            /// Directory of rendered documents to scan.
            optional pages: PathBuf

            /// Settings file to read instead of `shrike.toml`.
            optional -c, --config path: PathBuf

            /// Vendor stylesheet to subset.
            optional -s, --stylesheet path: PathBuf

            /// Destination for the subset stylesheet.
            optional -o, --output path: PathBuf

            /// Only report the final summary.
            optional -q, --quiet
        }
    }
}

pub fn main() {
    let flags = flags::Shrike::from_env_or_exit();

    let start = SystemTime::now();
    let result = Settings::load(flags.config.as_deref())
        .map(|mut settings| {
            if let Some(pages) = flags.pages {
                settings.pages = pages;
            }

            if let Some(stylesheet) = flags.stylesheet {
                settings.stylesheet = stylesheet;
            }

            if let Some(output) = flags.output {
                settings.output = Some(output);
            }

            Pipeline { settings, quiet: flags.quiet }
        })
        .and_then(|pipeline| pipeline.run());

    match result {
        Ok(outcome) => report(&outcome, start),
        Err(e) => {
            println!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn report(outcome: &Outcome, start: SystemTime) {
    match outcome {
        Outcome::Copied { documents, output } => {
            println!("no usages across {documents} documents; copied stylesheet unchanged");
            println!("wrote {}", output.display());
        }
        Outcome::Subset(report) => {
            println!("kept {} of {} rules for {} icons across {} documents",
                report.rules_kept, report.rules_total, report.icons, report.documents);
            println!("wrote {}", report.output.display());
            println!("original: {}", Kb(report.savings.original));
            println!("subset:   {}", Kb(report.savings.subset));
            println!("saved:    {} ({:.1}% reduction)",
                Kb(report.savings.saved()), report.savings.percent());
        }
    }

    println!("total time: {}ms", start.elapsed().unwrap().as_millis());
}
