//! Binary entry point for the `parz` command-line tool.
//!
//! Control flow: alias detection on argv[0] (an `un…` name implies `-d`, a
//! `…cat` name `-dc`), `PARZ` environment options prepended to argv, the
//! option parse, terminal-safety checks, recursive expansion for `-r`, and
//! dispatch to compress/decompress/test/list. Exit code 0 on success, 1 on
//! any failure.

use std::io::IsTerminal;
use std::path::Path;

use parz::cli::args::{detect_alias, env_args, parse_args_from, OpMode, ParsedArgs, ENV_OPTS};
use parz::io::prefs::display_level;
use parz::io::{
    compress_multiple_filenames, decompress_multiple_filenames, list_multiple_filenames,
    set_notification_level, STDIN_MARK,
};
use parz::util::create_file_list;

fn run(args: ParsedArgs) -> i32 {
    let mut prefs = args.prefs;
    let op_mode = args.op_mode;
    let mut inputs = args.inputs;

    set_notification_level(args.verbosity);

    // With no file operands, work stdin to stdout.
    if inputs.is_empty() {
        inputs.push(STDIN_MARK.to_owned());
        prefs.to_stdout = true;
    }

    // Refuse to write compressed data to, or read it from, a terminal.
    if op_mode == OpMode::Compress
        && prefs.to_stdout
        && std::io::stdout().is_terminal()
        && !prefs.force
    {
        display_level(
            1,
            "parz: refusing to write compressed data to a terminal (use -f to force)\n",
        );
        return 1;
    }
    if (op_mode == OpMode::Decompress || op_mode == OpMode::Test || op_mode == OpMode::List)
        && inputs.iter().any(|i| i == STDIN_MARK)
        && std::io::stdin().is_terminal()
    {
        display_level(1, "parz: refusing to read compressed data from a terminal\n");
        return 1;
    }

    // Recursive expansion: directories become their contained files.
    if prefs.recursive {
        let paths: Vec<&Path> = inputs.iter().map(|s| Path::new(s.as_str())).collect();
        match create_file_list(&paths) {
            Ok(list) => {
                inputs = list
                    .into_iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect();
            }
            Err(e) => {
                display_level(1, &format!("parz: {}\n", e));
                return 1;
            }
        }
    }

    let input_refs: Vec<&str> = inputs.iter().map(|s| s.as_str()).collect();
    let missed = match op_mode {
        OpMode::Compress => compress_multiple_filenames(&input_refs, &prefs),
        OpMode::Decompress | OpMode::Test => {
            decompress_multiple_filenames(&input_refs, &prefs)
        }
        OpMode::List => list_multiple_filenames(&input_refs, &prefs),
    };

    if missed > 0 {
        1
    } else {
        0
    }
}

fn main() {
    let argv0 = std::env::args().next().unwrap_or_else(|| "parz".to_owned());
    let init = detect_alias(&argv0);

    // Options from the environment come first so the command line overrides.
    let mut argv: Vec<String> = Vec::new();
    if let Ok(value) = std::env::var(ENV_OPTS) {
        match env_args(&value) {
            Ok(mut opts) => argv.append(&mut opts),
            Err(e) => {
                eprintln!("parz: {}", e);
                std::process::exit(1);
            }
        }
    }
    argv.extend(std::env::args().skip(1));

    let args = match parse_args_from(init, &argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("parz: {}", e);
            std::process::exit(1);
        }
    };

    if args.exit_early {
        std::process::exit(0);
    }

    std::process::exit(run(args));
}
