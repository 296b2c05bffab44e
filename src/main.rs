// cnorm: normalize a preprocessed C/C++ file and dump the annotated stream

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use cnorm::config::{Dialect, Settings};
use cnorm::normalize;
use cnorm::report::CollectedReports;
use cnorm::tokens::Lexer;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let program_name = args.first().map(|s| s.as_str()).unwrap_or("cnorm");

    let mut dialect = Dialect::Cpp;
    let mut input = None;
    for arg in &args[1..] {
        match arg.as_str() {
            "--c" => dialect = Dialect::C,
            "--cpp" => dialect = Dialect::Cpp,
            _ => input = Some(arg.clone()),
        }
    }

    let Some(input) = input else {
        eprintln!("Error: No input file provided");
        eprintln!();
        eprintln!("Usage: {} [--c|--cpp] <preprocessed-file>", program_name);
        eprintln!();
        eprintln!("Dumps the normalized token stream: one token per line with");
        eprintln!("source position, bracket-link target, and variable identity.");
        return ExitCode::FAILURE;
    };

    if !Path::new(&input).exists() {
        eprintln!("Error: File '{}' not found", input);
        return ExitCode::FAILURE;
    }

    let source = match fs::read_to_string(&input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: Cannot read '{}': {}", input, e);
            return ExitCode::FAILURE;
        }
    };

    let mut list = match Lexer::new(&source, dialect).tokenize(&input) {
        Ok(list) => list,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = match dialect {
        Dialect::C => Settings::c(),
        Dialect::Cpp => Settings::cpp(),
    };
    let mut reports = CollectedReports::new();

    if let Err(e) = normalize::normalize(&mut list, &settings, &mut reports) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    for diag in &reports.diags {
        eprintln!("{}", diag);
    }

    for id in list.iter() {
        let tok = &list[id];
        print!("{}:{}\t{}", tok.loc.line, tok.loc.column, tok.text);
        if tok.varid != 0 {
            print!("\tvarid={}", tok.varid);
        }
        if let Some(partner) = tok.link {
            let ploc = list[partner].loc;
            print!("\tlink={}:{}", ploc.line, ploc.column);
        }
        println!();
    }

    ExitCode::SUCCESS
}
