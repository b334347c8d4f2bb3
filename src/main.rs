use std::io::{self, Read};

use anyhow::Context;
use leafmark::{ParseOptions, Parser};

/// Reads Markdown on stdin and prints the parsed blocks and reference table as JSON.
/// An optional argument names a JSON file of parser options.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let options = match std::env::args_os().nth(1) {
        Some(path) => ParseOptions::load_from_path(path)?,
        None => ParseOptions::default(),
    };
    log::debug!("Parsing with {:?}", options);

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;

    let document = Parser::with_options(options).parse(&input);
    let output = serde_json::to_string_pretty(&document).context("Failed to serialize document")?;
    println!("{}", output);
    Ok(())
}
