use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use ustar_format::{Archive, ExtractOptions, NativeHost, ReaderOptions};

use crate::cli::ExtractArgs;
use crate::error::{Error, Result};

pub fn run(args: ExtractArgs) -> Result<()> {
    let file = File::open(&args.archive).map_err(|source| Error::OpenArchive {
        path: args.archive.clone(),
        source,
    })?;

    let output = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let reader_options = ReaderOptions {
        records_per_block: args.records_per_block,
        verify_checksums: args.verify,
    };
    let options = ExtractOptions {
        keep_existing: !args.overwrite,
        restore_permissions: !args.no_permissions,
    };

    let mut archive = Archive::reader_with(BufReader::new(file), reader_options, NativeHost);
    let count = archive
        .extract(&output, &options)
        .map_err(|source| Error::extract(&args.archive, source))?;

    if !args.quiet {
        println!("Extracted {} entries to {}", count, output.display());
    }

    Ok(())
}
