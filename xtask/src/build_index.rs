//! xtask build-index: turn a titles file into a WOM index.
//!
//! Input format: one article per line, `title<TAB>body`. Lines without a tab
//! become articles with an empty body; blank lines are skipped. Titles are
//! written in file order, the reader does not need them sorted.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use library::{FileHeader, IndexWriter};
use tracing::{debug, info};

/// Entry point called from main.rs
pub fn run(titles: &Path, out: &Path) -> Result<()> {
    let text = fs::read_to_string(titles)
        .with_context(|| format!("reading {}", titles.display()))?;
    let header = build(&text, out)?;
    println!(
        "{}",
        format!(
            "✓ {} entries on {} index pages written to {}",
            header.entry_count,
            header.index_num_pages,
            out.display()
        )
        .green()
    );
    Ok(())
}

/// Write an index for the articles in `text` to `out`.
pub(crate) fn build(text: &str, out: &Path) -> Result<FileHeader> {
    let mut writer = IndexWriter::new();
    for (title, body) in parse_articles(text) {
        debug!("adding {:?} ({} body bytes)", title, body.len());
        writer
            .add_article(title, body.as_bytes())
            .with_context(|| format!("adding {title:?}"))?;
    }
    let header = writer
        .finish(out)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(
        "index: {} entries, pages {}..{}, checksum {:#x}",
        header.entry_count,
        header.index_first_page,
        header.articles_first_page,
        header.index_checksum
    );
    Ok(header)
}

/// Split `text` into `(title, body)` pairs.
pub(crate) fn parse_articles(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_once('\t').unwrap_or((line, "")))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lines_split_on_first_tab() {
        let parsed: Vec<_> = parse_articles("Apple\tA fruit\tred\n\nBanana\r\nCherry\tsmall\n").collect();
        assert_eq!(
            parsed,
            vec![("Apple", "A fruit\tred"), ("Banana", ""), ("Cherry", "small")]
        );
    }

    #[test]
    fn build_writes_readable_index() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("pedia.wom");
        let header = build("Apple\tfruit\nBanana\tyellow\n", &out).unwrap();
        assert_eq!(header.entry_count, 2);
        assert_eq!(header.index_first_page, 1);
        assert_eq!(&fs::read(&out).unwrap()[..4], b"WOM1");
    }

    #[test]
    fn missing_titles_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(run(&tmp.path().join("absent.txt"), &tmp.path().join("out.wom")).is_err());
    }
}
