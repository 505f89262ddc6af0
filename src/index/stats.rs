use crate::index::reader::StoreReader;
use crate::model::ModelConfig;
use anyhow::Result;
use std::path::Path;

/// Display model store statistics
///
/// With `load` set the store is also indexed in memory, which adds the
/// cooccurrence table size to the report.
pub fn show_stats(dir: &Path, load: bool) -> Result<()> {
    let reader = StoreReader::open(dir)?;
    let meta = &reader.meta;

    println!("Model Statistics");
    println!("================");
    println!();
    println!("Location:         {}", reader.dir().display());
    println!("Format version:   {}", meta.version);
    println!("Sentence pairs:   {}", meta.sentences);
    println!("Source tokens:    {}", meta.source_tokens);
    println!("Target tokens:    {}", meta.target_tokens);
    println!("Alignment links:  {}", meta.links);
    println!("Source vocab:     {}", meta.source_vocab);
    println!("Target vocab:     {}", meta.target_vocab);
    if meta.sentences > 0 {
        println!(
            "Avg links/pair:   {:.2}",
            meta.links as f64 / meta.sentences as f64
        );
    }

    if let Ok(size) = dir_size(dir) {
        println!();
        println!("Store size:       {}", format_size(size));
    }

    if load {
        let (model, _) = reader.load_model(ModelConfig::default())?;
        let stats = model.stats();
        println!();
        println!("Indexed tokens:   {}", stats.base_tokens);
        println!("Cooc entries:     {}", stats.cooc_entries);
    }

    println!();
    println!("Created:          {}", format_timestamp(meta.created_at));

    Ok(())
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            size += metadata.len();
        } else if metadata.is_dir() {
            size += dir_size(&entry.path())?;
        }
    }
    Ok(size)
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.2} KB", b as f64 / KB as f64),
        b => format!("{} bytes", b),
    }
}

/// Seconds since the epoch, with a relative age when it is in the past
fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let created = UNIX_EPOCH + Duration::from_secs(ts);
    match SystemTime::now().duration_since(created) {
        Ok(age) => format!("{} ({}s ago)", ts, age.as_secs()),
        Err(_) => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_dir_size() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a"), [0u8; 10]).unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("sub/b"), [0u8; 5]).unwrap();
        assert_eq!(dir_size(temp_dir.path()).unwrap(), 15);
    }
}
