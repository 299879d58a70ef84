//! Preview binary - parses a lyric file and prints the selected display
//! without running the server
//!
//! Usage:
//!   cargo run --bin preview -- path/to/lyrics.txt
//!   cargo run --bin preview -- path/to/lyrics.txt --langs ja,zh
//!
//! With no --langs flag the default selection (ja, romaji, zh) is used.
//! Useful for checking how a hand-written lyric file will group and align
//! before publishing it to the lyrics origin.

use std::collections::BTreeSet;
use std::fs;

use anyhow::{Context, Result};

use anisong_lyrics::lang::Tag;
use anisong_lyrics::parser;
use anisong_lyrics::selector::{self, select_display};

fn parse_args() -> Result<(String, BTreeSet<Tag>)> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut path = None;
    let mut langs: BTreeSet<Tag> = [Tag::Ja, Tag::Romaji, Tag::Zh].into_iter().collect();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--langs" {
            let value = iter
                .next()
                .context("--langs requires a value (e.g. ja,zh)")?;
            langs = value
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(Tag::from_code)
                .collect::<Result<_>>()?;
        } else {
            path = Some(arg.clone());
        }
    }

    let path = path.context("Usage: preview <lyrics-file> [--langs ja,zh]")?;
    Ok((path, langs))
}

fn join_codes(tags: impl IntoIterator<Item = Tag>) -> String {
    let codes: Vec<&str> = tags.into_iter().map(|tag| tag.code()).collect();
    if codes.is_empty() {
        "(none)".to_string()
    } else {
        codes.join(", ")
    }
}

fn main() -> Result<()> {
    let (path, langs) = parse_args()?;

    let raw = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
    let rows = parser::parse(&raw);
    let available = selector::available_tags(&rows);
    let lines = select_display(&rows, &langs, &Tag::LANGUAGES);

    println!();
    println!("--- {} ---", path);
    println!("Rows parsed:        {}", rows.len());
    println!("Languages in file:  {}", join_codes(available));
    println!("Selected languages: {}", join_codes(langs));
    println!();

    if lines.is_empty() {
        println!("(no displayable content for this selection)");
        println!();
        return Ok(());
    }

    for line in &lines {
        for cell in &line.cells {
            for (i, part) in cell.text.split('\n').enumerate() {
                if i == 0 {
                    println!("[{:>6}] {}", cell.tag.code(), part);
                } else {
                    println!("         {}", part);
                }
            }
        }
        println!();
    }

    Ok(())
}
