//! Reorder PDF Pages
//!
//! Writes a copy of a PDF with its pages selected and reordered.
//!
//! Usage:
//!   reorder_pages <input.pdf> <output.pdf> <ranges> [options]
//!
//! Ranges are 1-based and inclusive, e.g. `3-4,1` or
//! `[{"start":3,"end":4},{"singlePage":1}]`.
//!
//! Options:
//!   --balanced N      Rebuild the page tree with at most N kids per node
//!   --keep-numbers    Keep the original object numbers
//!   --compact         Write dictionaries on one line
//!   --lenient         Skip unreadable objects and rebuild broken xref tables
//!   --strict          Fail on any deviation from the file format
//!   --verbose, -v     Log progress

use pdf_reorder::config::{PageTreeLayout, ReorderOptions};
use pdf_reorder::parser_config::ParserOptions;
use pdf_reorder::planner::{from_json, parse_page_ranges};
use pdf_reorder::{Document, Error, PageRange, PageTree};
use std::path::PathBuf;
use std::time::Instant;

struct ReorderConfig {
    input: PathBuf,
    output: PathBuf,
    ranges: String,
    options: ReorderOptions,
    verbose: bool,
}

impl ReorderConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut positional = Vec::new();
        let mut options = ReorderOptions::new();
        let mut verbose = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--balanced" => {
                    i += 1;
                    let max_kids = args
                        .get(i)
                        .and_then(|v| v.parse::<usize>().ok())
                        .ok_or("--balanced expects a number")?;
                    options = options.with_layout(PageTreeLayout::Balanced { max_kids });
                },
                "--keep-numbers" => {
                    options = options.with_renumbering(false);
                },
                "--compact" => {
                    options = options.with_compact_output(true);
                },
                "--lenient" => {
                    options = options.with_parser_options(ParserOptions::lenient());
                },
                "--strict" => {
                    options = options.with_parser_options(ParserOptions::strict());
                },
                "--verbose" | "-v" => {
                    verbose = true;
                },
                "--help" | "-h" => {
                    return Err(String::new());
                },
                other if other.starts_with("--") => {
                    return Err(format!("unknown option {}", other));
                },
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        if positional.len() != 3 {
            return Err("expected <input.pdf> <output.pdf> <ranges>".to_string());
        }
        let ranges = positional.pop().unwrap_or_default();
        let output = PathBuf::from(positional.pop().unwrap_or_default());
        let input = PathBuf::from(positional.pop().unwrap_or_default());

        Ok(Self {
            input,
            output,
            ranges,
            options,
            verbose,
        })
    }
}

fn print_usage() {
    eprintln!("Usage: reorder_pages <input.pdf> <output.pdf> <ranges> [options]");
    eprintln!();
    eprintln!("  <ranges>          e.g. 3-4,1 or a JSON array of ranges");
    eprintln!("  --balanced N      at most N kids per page tree node");
    eprintln!("  --keep-numbers    keep the original object numbers");
    eprintln!("  --compact         write dictionaries on one line");
    eprintln!("  --lenient         recover from damaged files");
    eprintln!("  --strict          reject any deviation from the file format");
    eprintln!("  --verbose, -v     log progress");
}

fn parse_ranges(text: &str) -> pdf_reorder::Result<Vec<PageRange>> {
    if text.trim_start().starts_with('[') {
        from_json(text)
    } else {
        parse_page_ranges(text)
    }
}

fn run(config: &ReorderConfig) -> pdf_reorder::Result<usize> {
    let ranges = parse_ranges(&config.ranges)?;
    let input = std::fs::read(&config.input)?;

    if config.verbose {
        let doc = Document::load_with_options(&input, &config.options.parser)?;
        let tree = PageTree::walk(&doc)?;
        println!(
            "Input: {} (PDF {}.{}, {} objects, {} pages)",
            config.input.display(),
            doc.version().0,
            doc.version().1,
            doc.len(),
            tree.len()
        );
    }

    let output = pdf_reorder::reorder_pages_with_options(&input, &ranges, &config.options)?;
    std::fs::write(&config.output, &output)?;
    Ok(output.len())
}

fn main() {
    let config = match ReorderConfig::from_args() {
        Ok(config) => config,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}", message);
            }
            print_usage();
            std::process::exit(2);
        },
    };

    let mut logger = env_logger::Builder::from_default_env();
    if config.verbose {
        logger.filter_level(log::LevelFilter::Info);
    }
    logger.init();

    let start = Instant::now();
    match run(&config) {
        Ok(bytes) => {
            if config.verbose {
                println!(
                    "Wrote {} ({} bytes) in {} ms",
                    config.output.display(),
                    bytes,
                    start.elapsed().as_millis()
                );
            }
        },
        Err(e) => {
            eprintln!("{}: {}", e.kind(), e);
            if let Error::Io(_) = e {
                eprintln!("  while reading {} or writing {}", config.input.display(), config.output.display());
            }
            std::process::exit(1);
        },
    }
}
