//! Checks a rules, blocks or settings file and prints what it describes.
//!
//! ```text
//! blockspace-check rules space.rules
//! blockspace-check blocks space.blocks
//! blockspace-check settings growth.par
//! ```

use blockspace::IdGenerator;
use blockspace_syntax::report::write_reports;
use blockspace_syntax::{blocks, rules, settings, SyntaxError};
use std::process::ExitCode;
use std::sync::Arc;
use std::{env, fs, io};

fn usage() -> ExitCode {
    eprintln!("usage: blockspace-check <rules|blocks|settings> <file>");
    ExitCode::from(2)
}

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let (Some(kind), Some(filename)) = (args.next(), args.next()) else {
        return usage();
    };
    let src = match fs::read_to_string(&filename) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("cannot read {filename}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (summary, errors): (Result<String, String>, Vec<SyntaxError>) = match kind.as_str() {
        "rules" => {
            let (parsed, errors) = rules::parse_rules(&src);
            let summary = rules::registry_from_rules(parsed.iter().map(|(r, _)| r))
                .map(|registry| {
                    format!(
                        "{} rules over {} port classes",
                        parsed.len(),
                        registry.known_classes().len()
                    )
                })
                .map_err(|report| format!("{report:?}"));
            (summary, errors)
        }
        "blocks" => {
            let (parsed, errors) = blocks::parse_blocks(&src);
            let summary = blocks::library_from_blocks(
                Arc::new(IdGenerator::new()),
                parsed.iter().map(|(b, _)| b),
            )
            .map(|library| {
                format!(
                    "{} scaffolds, {} fragments, {} capping groups",
                    library.pool_len(blockspace::Pool::Scaffold),
                    library.pool_len(blockspace::Pool::Fragment),
                    library.pool_len(blockspace::Pool::Capping)
                )
            })
            .map_err(|report| format!("{report:?}"));
            (summary, errors)
        }
        "settings" => {
            let (parsed, errors) = settings::parse_settings(&src);
            let applied = settings::apply_settings(
                blockspace::GrowthSettings::default(),
                parsed.iter().map(|(s, _)| s),
            );
            let summary = serde_json::to_string_pretty(&applied).map_err(|e| e.to_string());
            (summary, errors)
        }
        _ => return usage(),
    };

    if !errors.is_empty() {
        if let Err(e) = write_reports(&filename, &src, &errors, true, io::stderr()) {
            eprintln!("cannot print reports: {e}");
        }
        return ExitCode::FAILURE;
    }
    match summary {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
