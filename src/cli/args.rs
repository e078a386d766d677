//! Argument parsing for the `parz` / `unparz` / `parzcat` family.
//!
//! Options are single characters and may be aggregated (`-dfc`). The value
//! options `-b`, `-p`, and `-s` take the remainder of their cluster or, when
//! the cluster ends there, the next argument. A bare `--` ends option
//! processing. Options may also be pre-supplied through the whitespace-
//! separated `PARZ` environment variable, which must not contain file names.
//!
//! Bad usage returns an `Err` before any I/O happens; the process exits 1.

use anyhow::{anyhow, bail, Result};

use crate::io::prefs::{Format, Prefs, KB};

/// Environment variable holding default options.
pub const ENV_OPTS: &str = "PARZ";

/// Operation selected by the options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpMode {
    Compress,
    Decompress,
    Test,
    List,
}

/// Initial state derived from the program name (argv[0]).
#[derive(Clone, Copy, Debug, Default)]
pub struct CliInit {
    pub decompress: bool,
    pub to_stdout: bool,
}

/// A name starting with `un` implies decompression; a name ending in `cat`
/// implies decompression to stdout.
pub fn detect_alias(argv0: &str) -> CliInit {
    let base = argv0
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(argv0)
        .trim_end_matches(".exe");
    CliInit {
        decompress: base.starts_with("un") || base.ends_with("cat"),
        to_stdout: base.ends_with("cat"),
    }
}

/// Everything the dispatch phase needs.
#[derive(Debug)]
pub struct ParsedArgs {
    pub prefs: Prefs,
    pub op_mode: OpMode,
    /// Verbosity: 0 silent, 1 errors, 2 normal, 3+ verbose.
    pub verbosity: i32,
    pub inputs: Vec<String>,
    /// A help/version flag was handled; exit 0 without doing I/O.
    pub exit_early: bool,
}

/// Splits the `PARZ` environment variable into leading pseudo-arguments.
/// File names (anything not starting with `-`) are rejected.
pub fn env_args(value: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for word in value.split_whitespace() {
        if !word.starts_with('-') {
            bail!("cannot give file names in the {} variable", ENV_OPTS);
        }
        out.push(word.to_owned());
    }
    Ok(out)
}

/// Parses `argv` (without argv[0]) starting from the alias-derived state.
pub fn parse_args_from(init: CliInit, argv: &[String]) -> Result<ParsedArgs> {
    let mut prefs = Prefs::default();
    prefs.to_stdout = init.to_stdout;

    let mut op_mode = if init.decompress {
        OpMode::Decompress
    } else {
        OpMode::Compress
    };
    let mut verbosity: i32 = 2;
    let mut inputs: Vec<String> = Vec::new();
    let mut exit_early = false;
    let mut all_files = false;

    let mut idx = 0usize;
    while idx < argv.len() {
        let arg = &argv[idx];
        idx += 1;
        if arg.is_empty() {
            continue;
        }

        if all_files || !arg.starts_with('-') || arg == "-" {
            inputs.push(arg.clone());
            continue;
        }

        if arg == "--" {
            all_files = true;
            continue;
        }
        if let Some(long) = arg.strip_prefix("--") {
            match long {
                "help" => {
                    crate::cli::help::print_usage();
                    exit_early = true;
                    continue;
                }
                "version" => {
                    crate::cli::help::print_version();
                    exit_early = true;
                    continue;
                }
                _ => bail!("unknown option --{}", long),
            }
        }

        // Single-character cluster; -b/-p/-s consume the rest (or the next
        // argument) as their value.
        let mut chars = arg[1..].chars();
        while let Some(opt) = chars.next() {
            match opt {
                '0'..='9' => {
                    prefs
                        .set_level(opt as u32 - '0' as u32)
                        .map_err(|e| anyhow!(e))?;
                }
                'b' | 'p' | 's' => {
                    let rest: String = chars.by_ref().collect();
                    let value = if rest.is_empty() {
                        if idx >= argv.len() {
                            bail!("missing parameter after -{}", opt);
                        }
                        idx += 1;
                        argv[idx - 1].clone()
                    } else {
                        rest
                    };
                    match opt {
                        'b' => {
                            let kib: usize = value
                                .parse()
                                .map_err(|_| anyhow!("invalid block size: {}", value))?;
                            let bytes = kib
                                .checked_mul(KB)
                                .ok_or_else(|| anyhow!("block size too large"))?;
                            prefs.set_block_size(bytes).map_err(|e| anyhow!(e))?;
                        }
                        'p' => {
                            let n: usize = value
                                .parse()
                                .map_err(|_| anyhow!("invalid process count: {}", value))?;
                            prefs.set_nb_workers(n).map_err(|e| anyhow!(e))?;
                        }
                        's' => {
                            prefs.suffix = Some(value);
                        }
                        _ => unreachable!(),
                    }
                    break; // the cluster's remainder was the value
                }
                'i' => prefs.dictionary = false,
                'd' => op_mode = OpMode::Decompress,
                't' => op_mode = OpMode::Test,
                'l' => op_mode = OpMode::List,
                'f' => prefs.force = true,
                'r' => prefs.recursive = true,
                'k' => prefs.keep = true,
                'c' => prefs.to_stdout = true,
                'z' => prefs.format = Format::Zlib,
                'K' => prefs.format = Format::ZipWithDescriptor,
                'N' => {
                    prefs.store_name = true;
                    prefs.store_time = true;
                    prefs.restore_meta = true;
                }
                'n' => {
                    prefs.store_name = false;
                    prefs.restore_meta = false;
                }
                'T' => prefs.store_time = false,
                'q' => verbosity = (verbosity - 1).max(0),
                'v' => verbosity += 1,
                'V' => {
                    crate::cli::help::print_version();
                    exit_early = true;
                }
                'h' => {
                    crate::cli::help::print_usage();
                    exit_early = true;
                }
                other => bail!("unknown option -{}", other),
            }
        }
    }

    if op_mode == OpMode::Test {
        prefs.test_mode = true;
    }

    Ok(ParsedArgs {
        prefs,
        op_mode,
        verbosity,
        inputs,
        exit_early,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ParsedArgs> {
        let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        parse_args_from(CliInit::default(), &argv)
    }

    #[test]
    fn defaults_compress_gzip() {
        let a = parse(&[]).unwrap();
        assert_eq!(a.op_mode, OpMode::Compress);
        assert_eq!(a.prefs.format, Format::Gzip);
        assert!(a.inputs.is_empty());
    }

    #[test]
    fn level_digit_sets_level() {
        let a = parse(&["-9"]).unwrap();
        assert_eq!(a.prefs.level, 9);
        let a = parse(&["-1"]).unwrap();
        assert_eq!(a.prefs.level, 1);
    }

    #[test]
    fn clustered_options() {
        let a = parse(&["-dfc"]).unwrap();
        assert_eq!(a.op_mode, OpMode::Decompress);
        assert!(a.prefs.force);
        assert!(a.prefs.to_stdout);
    }

    #[test]
    fn block_size_attached_and_separate() {
        let a = parse(&["-b256"]).unwrap();
        assert_eq!(a.prefs.block_size, 256 * KB);
        let a = parse(&["-b", "64"]).unwrap();
        assert_eq!(a.prefs.block_size, 64 * KB);
    }

    #[test]
    fn block_size_below_minimum_rejected() {
        assert!(parse(&["-b16"]).is_err());
    }

    #[test]
    fn process_count() {
        let a = parse(&["-p4"]).unwrap();
        assert_eq!(a.prefs.nb_workers, 4);
        assert!(parse(&["-p0"]).is_err());
    }

    #[test]
    fn missing_value_parameter_rejected() {
        assert!(parse(&["-b"]).is_err());
        assert!(parse(&["-p"]).is_err());
        assert!(parse(&["-s"]).is_err());
    }

    #[test]
    fn combined_value_letter_consumes_rest_of_cluster() {
        // "-kb64" gives -k and block size 64; "-bk" is a bad number.
        let a = parse(&["-kb64"]).unwrap();
        assert!(a.prefs.keep);
        assert_eq!(a.prefs.block_size, 64 * KB);
        assert!(parse(&["-bk"]).is_err());
    }

    #[test]
    fn formats() {
        assert_eq!(parse(&["-z"]).unwrap().prefs.format, Format::Zlib);
        assert_eq!(
            parse(&["-K"]).unwrap().prefs.format,
            Format::ZipWithDescriptor
        );
    }

    #[test]
    fn independent_blocks_flag() {
        assert!(!parse(&["-i"]).unwrap().prefs.dictionary);
    }

    #[test]
    fn test_and_list_modes() {
        let a = parse(&["-t"]).unwrap();
        assert_eq!(a.op_mode, OpMode::Test);
        assert!(a.prefs.test_mode);
        assert_eq!(parse(&["-l"]).unwrap().op_mode, OpMode::List);
    }

    #[test]
    fn quiet_and_verbose_adjust_verbosity() {
        assert_eq!(parse(&["-q"]).unwrap().verbosity, 1);
        assert_eq!(parse(&["-qq"]).unwrap().verbosity, 0);
        assert_eq!(parse(&["-v"]).unwrap().verbosity, 3);
    }

    #[test]
    fn name_time_flags() {
        let a = parse(&["-n"]).unwrap();
        assert!(!a.prefs.store_name);
        let a = parse(&["-T"]).unwrap();
        assert!(!a.prefs.store_time);
        let a = parse(&["-N"]).unwrap();
        assert!(a.prefs.restore_meta);
    }

    #[test]
    fn double_dash_ends_options() {
        let a = parse(&["--", "-weird-name"]).unwrap();
        assert_eq!(a.inputs, vec!["-weird-name"]);
    }

    #[test]
    fn lone_dash_is_stdin_input() {
        let a = parse(&["-"]).unwrap();
        assert_eq!(a.inputs, vec!["-"]);
    }

    #[test]
    fn unknown_option_rejected() {
        assert!(parse(&["-Z"]).is_err());
        assert!(parse(&["--nonsense"]).is_err());
    }

    #[test]
    fn env_args_reject_file_names() {
        assert!(env_args("-9 -p2").is_ok());
        assert!(env_args("-9 somefile").is_err());
    }

    #[test]
    fn alias_detection() {
        assert!(!detect_alias("parz").decompress);
        let un = detect_alias("/usr/bin/unparz");
        assert!(un.decompress);
        assert!(!un.to_stdout);
        let cat = detect_alias("parzcat");
        assert!(cat.decompress);
        assert!(cat.to_stdout);
    }
}
