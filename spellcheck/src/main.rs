//! Command-line spell checker.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use spellcheck::{SpellChecker, DEFAULT_DICTIONARY};

#[derive(Parser)]
#[command(name = "spellcheck")]
#[command(about = "Check words against a letter-trie dictionary", long_about = None)]
struct Cli {
    /// Whitespace-delimited word list (defaults to the built-in dictionary)
    #[arg(short, long)]
    dictionary: Option<PathBuf>,

    /// Print the dictionary trie before checking
    #[arg(long)]
    dump: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Words to check
    words: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let mut checker = match &cli.dictionary {
        Some(path) => SpellChecker::load_file(path)
            .with_context(|| format!("failed to load dictionary {}", path.display()))?,
        None => SpellChecker::from_dictionary(DEFAULT_DICTIONARY)
            .context("failed to build the built-in dictionary")?,
    };
    tracing::info!(words = checker.len(), "dictionary ready");

    if cli.dump {
        print!("{}", checker.dump());
    }

    let mut misspelled = 0usize;
    for word in &cli.words {
        let correct = checker.check(word);
        if !correct {
            misspelled += 1;
        }
        println!(
            "{word} is spelled {}",
            if correct { "correctly" } else { "incorrectly" }
        );
    }

    Ok(if misspelled == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
