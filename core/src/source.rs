//! Loading entity records from JSON exports.
//!
//! A path is either a file or a directory walked for `.json` and `.jsonl`
//! files. A `.json` file holds an array of records or a single record; a
//! `.jsonl` file holds one record per line.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

fn input_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    }
    files
}

pub fn read_records<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for file in input_files(path.as_ref()) {
        let before = records.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut records)?;
        } else {
            read_json(&file, &mut records)?;
        }
        tracing::debug!(file = %file.display(), records = records.len() - before, "read records");
    }
    Ok(records)
}

fn read_jsonl<T: DeserializeOwned>(file: &Path, out: &mut Vec<T>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(file: &Path, out: &mut Vec<T>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(items) => {
            for item in items {
                out.push(serde_json::from_value(item)?);
            }
        }
        serde_json::Value::Object(_) => out.push(serde_json::from_value(json)?),
        _ => tracing::warn!(file = %file.display(), "expected a JSON array or object, skipped"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: u64,
    }

    #[test]
    fn reads_arrays_objects_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"id": 3}"#).unwrap();
        std::fs::write(dir.path().join("c.jsonl"), "{\"id\": 4}\n\n{\"id\": 5}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let rows: Vec<Row> = read_records(dir.path()).unwrap();
        let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let single: Vec<Row> = read_records(dir.path().join("b.json")).unwrap();
        assert_eq!(single, vec![Row { id: 3 }]);
    }

    #[test]
    fn missing_path_reads_nothing() {
        let rows: Vec<Row> = read_records("/nonexistent/jobrank/input").unwrap();
        assert!(rows.is_empty());
    }
}
