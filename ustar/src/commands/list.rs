use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;
use ustar_format::{ArchiveReader, Entry, ReaderOptions};

use crate::cli::ListArgs;
use crate::error::{Error, Result};
use crate::util::{format_mode, format_size, format_time};

#[derive(Serialize)]
struct JsonEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: &'static str,
    size: u64,
    mode: String,
    uid: u32,
    gid: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    uname: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    gname: String,
    modified: String,
    dialect: String,
    checksum_ok: bool,
}

/// An entry plus whether its header checksum matched.
struct Row {
    entry: Entry,
    checksum_ok: bool,
}

pub fn run(args: ListArgs) -> Result<()> {
    let rows = read_rows(&args.archive, args.verify)?;

    if args.json {
        list_json(&rows)
    } else if args.long {
        list_long(&rows);
        Ok(())
    } else {
        list_compact(&rows);
        Ok(())
    }
}

fn read_rows(path: &Path, verify: bool) -> Result<Vec<Row>> {
    let file = File::open(path).map_err(|source| Error::OpenArchive {
        path: path.to_path_buf(),
        source,
    })?;

    let options = ReaderOptions {
        verify_checksums: verify,
        ..Default::default()
    };
    let mut reader = ArchiveReader::with_options(BufReader::new(file), options);

    let mut rows = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .map_err(|source| Error::read(path, source))?
    {
        let checksum_ok = reader
            .header_checksum()
            .map(|sums| sums.is_valid())
            .unwrap_or(false);
        rows.push(Row { entry, checksum_ok });
    }
    Ok(rows)
}

fn list_compact(rows: &[Row]) {
    println!("{:>12}  Path", "Size");
    println!("{}", "-".repeat(40));

    let mut total = 0u64;
    for row in rows {
        let entry = &row.entry;
        if entry.is_directory() {
            println!("{:>12}  {}", "-", entry.name);
        } else {
            println!("{:>12}  {}", format_size(entry.size), entry.name);
            total += entry.size;
        }
    }

    println!("{}", "-".repeat(40));
    println!("{:>12}  Total ({} entries)", format_size(total), rows.len());
}

fn list_long(rows: &[Row]) {
    println!(
        "{:10}  {:>8}  {:>8}  {:>12}  {:20}  {:5}  {:8}  Path",
        "Perms", "Owner", "Group", "Size", "Modified", "Kind", "Checksum"
    );
    println!("{}", "-".repeat(100));

    for row in rows {
        let entry = &row.entry;
        let owner = if entry.uname.is_empty() {
            entry.uid.to_string()
        } else {
            entry.uname.clone()
        };
        let group = if entry.gname.is_empty() {
            entry.gid.to_string()
        } else {
            entry.gname.clone()
        };
        let size = if entry.is_directory() {
            "-".to_string()
        } else {
            format_size(entry.size)
        };

        println!(
            "{:10}  {:>8}  {:>8}  {:>12}  {:20}  {:5}  {:8}  {}",
            format_mode(entry.mode, entry.is_directory()),
            owner,
            group,
            size,
            format_time(entry.mod_time),
            entry.dialect,
            if row.checksum_ok { "ok" } else { "MISMATCH" },
            entry.name
        );
    }
}

fn list_json(rows: &[Row]) -> Result<()> {
    let entries: Vec<JsonEntry> = rows
        .iter()
        .map(|row| {
            let entry = &row.entry;
            JsonEntry {
                path: entry.name.clone(),
                entry_type: if entry.is_directory() { "directory" } else { "file" },
                size: entry.content_size(),
                mode: format!("{:o}", entry.mode),
                uid: entry.uid,
                gid: entry.gid,
                uname: entry.uname.clone(),
                gname: entry.gname.clone(),
                modified: format_time(entry.mod_time),
                dialect: entry.dialect.to_string(),
                checksum_ok: row.checksum_ok,
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
