//! xtask find / list / inspect: read an index from the local filesystem.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use library::{IndexEntry, IndexReader};
use platform::config::{INDEX_FILE_NAME, WIKI_ROOT_ENV};
use platform::storage_local::{LocalFile, LocalFileStorage};

/// Longest article excerpt printed next to a match.
const EXCERPT_LEN: usize = 120;

/// Storage and file name for the index.
///
/// An absolute `--index` is opened from its own directory. A relative one
/// resolves under `WIKI_ROOT` when that is set (`env_root`), otherwise under
/// the working directory. Without `--index` the card-root index file under
/// `WIKI_ROOT` is used.
pub(crate) fn locate(
    index: Option<&Path>,
    env_root: Option<LocalFileStorage>,
) -> Result<(LocalFileStorage, String)> {
    let path = match (index, env_root) {
        (None, Some(storage)) => return Ok((storage, INDEX_FILE_NAME.to_owned())),
        (None, None) => anyhow::bail!("no --index given and {} is not set", WIKI_ROOT_ENV),
        (Some(path), Some(storage)) if path.is_relative() => {
            let name = path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("invalid index path"))?;
            return Ok((storage, name.to_owned()));
        }
        (Some(path), _) => path,
    };
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let root = root
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid index path"))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid index path"))?;
    Ok((LocalFileStorage::new(root), name.to_owned()))
}

/// Open the index chosen by [`locate`], honouring `WIKI_ROOT`.
pub(crate) fn open(index: Option<&Path>) -> Result<IndexReader<LocalFile>> {
    let (mut storage, name) = locate(index, LocalFileStorage::from_env())?;
    IndexReader::open(&mut storage, &name).with_context(|| format!("opening {name}"))
}

pub(crate) fn describe(entry: &IndexEntry<'_>) -> String {
    match entry.key_str() {
        Some(key) => format!("{key} @ {:#x}", entry.data_offset()),
        None => format!("{:02x?} @ {:#x}", entry.key(), entry.data_offset()),
    }
}

/// Look `key` up and print the match plus `then` following entries.
pub fn find(path: Option<&Path>, key: &str, then: usize) -> Result<()> {
    let mut reader = open(path)?;
    let hits = lookup(&mut reader, key, then)?;
    let Some((first, rest)) = hits.split_first() else {
        println!("{}", format!("✗ no entry matches {key:?}").yellow());
        return Ok(());
    };
    println!("{}", format!("✓ {}", first.0).green());
    let mut body = [0u8; EXCERPT_LEN];
    let len = reader.read_article(first.1, &mut body)?;
    let shown = len.min(EXCERPT_LEN);
    println!("  {}", String::from_utf8_lossy(body.get(..shown).unwrap_or_default()));
    for (line, _) in rest {
        println!("  {line}");
    }
    Ok(())
}

/// The entry matching `key` followed by up to `then` successors, as
/// `(description, data_offset)`. Empty when nothing matches.
pub(crate) fn lookup(reader: &mut IndexReader<LocalFile>, key: &str, then: usize) -> Result<Vec<(String, u32)>> {
    let mut out = Vec::new();
    match reader.find(key.as_bytes())? {
        Some(entry) => out.push((describe(&entry), entry.data_offset())),
        None => return Ok(out),
    }
    for _ in 0..then {
        match reader.next_entry()? {
            Some(entry) => out.push((describe(&entry), entry.data_offset())),
            None => break,
        }
    }
    Ok(out)
}

/// Print entries from the first index page on.
pub fn list(path: Option<&Path>, limit: Option<usize>) -> Result<()> {
    let mut reader = open(path)?;
    let mut shown = 0usize;
    while limit.is_none_or(|l| shown < l) {
        let Some(entry) = reader.next_entry()? else {
            break;
        };
        println!("{:>6}  {}", shown, describe(&entry));
        shown = shown.saturating_add(1);
    }
    println!("{}", format!("{shown} entries").cyan());
    reader.close()?;
    Ok(())
}

/// Print the header fields and the checksum verdict.
pub fn inspect(path: Option<&Path>) -> Result<()> {
    let mut reader = open(path)?;
    let header = *reader.header();
    let label = path.map_or_else(
        || format!("${WIKI_ROOT_ENV}/{INDEX_FILE_NAME}"),
        |p| p.display().to_string(),
    );
    println!("{}", label.bold());
    println!("  index pages    {}..{}", header.index_first_page, header.index_end_page().unwrap_or(u32::MAX));
    println!("  articles from  page {}", header.articles_first_page);
    println!("  entries        {}", header.entry_count);
    println!("  checksum       {:#010x}", header.index_checksum);
    if reader.verify_checksum()? {
        println!("{}", "✓ index checksum matches".green());
    } else {
        println!("{}", "✗ index checksum mismatch".red().bold());
    }
    reader.close()?;
    Ok(())
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
    use crate::build_index::build;
    use tempfile::TempDir;

    fn fixture(tmp: &TempDir) -> std::path::PathBuf {
        let path = tmp.path().join("pedia.wom");
        build("Apple\tfruit\nBanana\tyellow\nCherry\tred\n", &path).unwrap();
        path
    }

    #[test]
    fn lookup_returns_match_and_successors() {
        let tmp = TempDir::new().unwrap();
        let mut reader = open(Some(fixture(&tmp).as_path())).unwrap();
        let hits = lookup(&mut reader, "banana", 5).unwrap();
        let names: Vec<_> = hits.iter().map(|(d, _)| d.split(' ').next().unwrap()).collect();
        assert_eq!(names, vec!["Banana", "Cherry"]);
    }

    #[test]
    fn lookup_miss_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut reader = open(Some(fixture(&tmp).as_path())).unwrap();
        assert!(lookup(&mut reader, "Durian", 1).unwrap().is_empty());
    }

    #[test]
    fn commands_succeed_on_valid_index() {
        let tmp = TempDir::new().unwrap();
        let path = fixture(&tmp);
        find(Some(path.as_path()), "apple", 1).unwrap();
        list(Some(path.as_path()), Some(2)).unwrap();
        inspect(Some(path.as_path())).unwrap();
    }

    #[test]
    fn describe_falls_back_to_hex() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("raw.wom");
        let mut w = library::IndexWriter::new();
        w.add_entry(&[0xFF, 0xFE], 7).unwrap();
        w.finish(&path).unwrap();
        let mut reader = open(Some(path.as_path())).unwrap();
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(describe(&entry), "[ff, fe] @ 0x7");
    }

    fn env_root(tmp: &TempDir) -> Option<LocalFileStorage> {
        Some(LocalFileStorage::new(tmp.path().to_str().unwrap()))
    }

    #[test]
    fn missing_index_defaults_to_wiki_root() {
        let tmp = TempDir::new().unwrap();
        fixture(&tmp);
        let (mut storage, name) = locate(None, env_root(&tmp)).unwrap();
        assert_eq!(name, INDEX_FILE_NAME);
        let reader = IndexReader::open(&mut storage, &name).unwrap();
        assert_eq!(reader.header().entry_count, 3);
    }

    #[test]
    fn relative_index_resolves_under_wiki_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("en")).unwrap();
        build("Apple\tfruit\n", &tmp.path().join("en").join("pedia.wom")).unwrap();
        let (mut storage, name) = locate(Some(Path::new("en/pedia.wom")), env_root(&tmp)).unwrap();
        let reader = IndexReader::open(&mut storage, &name).unwrap();
        assert_eq!(reader.header().entry_count, 1);
    }

    #[test]
    fn absolute_index_ignores_wiki_root() {
        let tmp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let path = fixture(&tmp);
        let (mut storage, name) = locate(Some(path.as_path()), env_root(&other)).unwrap();
        assert_eq!(name, INDEX_FILE_NAME);
        assert!(IndexReader::open(&mut storage, &name).is_ok());
    }

    #[test]
    fn no_index_and_no_wiki_root_is_an_error() {
        assert!(locate(None, None).is_err());
    }
}
