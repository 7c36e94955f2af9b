//! The command-line driver: lex, parse and desugar source files into one
//! compilation root, reporting diagnostics along the way.

use clap::{Arg, ArgAction};
use diagnostics::Reporter;
use session::Top;
use span::SourceFile;
use std::{path::PathBuf, process::ExitCode, rc::Rc};

mod dump;

fn main() -> ExitCode {
    let matches = clap::Command::new("wake-frontend")
        .bin_name("wake-frontend")
        .about("Parse and desugar Wake build-language sources")
        .arg_required_else_help(true)
        .args([
            Arg::new("files")
                .value_name("FILE")
                .num_args(1..)
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("The source files to check"),
            Arg::new("dump-tokens")
                .long("dump-tokens")
                .action(ArgAction::SetTrue)
                .help("Print the token stream of each file"),
            Arg::new("dump-cst")
                .long("dump-cst")
                .action(ArgAction::SetTrue)
                .help("Print the concrete syntax tree of each file"),
            Arg::new("dump-dst")
                .long("dump-dst")
                .action(ArgAction::SetTrue)
                .help("Print the desugared definitions of each package"),
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Suppress the per-file summary"),
        ])
        .get_matches();

    let reporter = Reporter::stderr();
    let mut top = Top::default();

    for path in matches.get_many::<PathBuf>("files").into_iter().flatten() {
        let file = match SourceFile::load(path.clone()) {
            Ok(file) => Rc::new(file),
            Err(error) => {
                eprintln!("error: cannot read ‘{}’: {error}", path.display());
                return ExitCode::FAILURE;
            }
        };
        reporter.set_file(Rc::clone(&file));

        if matches.get_flag("dump-tokens") {
            dump::tokens(&file);
        }

        let cst = parser::parse(&file, &reporter);

        if matches.get_flag("dump-cst") {
            dump::cst(&cst, &file);
        }

        let package = lowerer::lower(&cst, &file, &mut top, &reporter);

        if !matches.get_flag("quiet") {
            println!("{}: package ‘{package}’", path.display());
        }
    }

    if matches.get_flag("dump-dst") {
        dump::dst(&top);
    }

    if reporter.reported_any_errors() {
        let count = reporter.error_count();
        eprintln!("aborting due to {count} previous {}", utility::pluralize!(count, "error"));
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
