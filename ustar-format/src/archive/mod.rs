//! Streaming archive access, plus the [`Archive`] facade that connects a
//! reader or writer to the local filesystem.

#[cfg(feature = "reader")]
pub mod reader;
#[cfg(feature = "writer")]
pub mod writer;

#[cfg(feature = "reader")]
pub use reader::{ArchiveReader, Entries, ReaderOptions};
#[cfg(feature = "writer")]
pub use writer::{ArchiveWriter, WriterOptions};

use crate::fs::{Host, NativeHost};

/// Options for [`Archive::extract`].
#[cfg(feature = "reader")]
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Leave files that already exist in the target untouched.
    pub keep_existing: bool,
    /// Apply each entry's stored mode after creating it.
    pub restore_permissions: bool,
}

#[cfg(feature = "reader")]
impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            keep_existing: true,
            restore_permissions: true,
        }
    }
}

/// Options for [`Archive::add`].
#[cfg(feature = "writer")]
#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Header dialect for every entry added, children included.
    pub dialect: crate::entry::HeaderDialect,
    /// Whether to descend into directories.
    pub recurse: bool,
    /// Bytes read from a local file per write.
    pub chunk_size: usize,
}

#[cfg(feature = "writer")]
impl Default for AddOptions {
    fn default() -> Self {
        Self {
            dialect: crate::entry::HeaderDialect::UsTar,
            recurse: true,
            chunk_size: 32 * 1024,
        }
    }
}

/// An archive opened either for reading or for writing, never both.
///
/// `S` is an [`ArchiveReader`] or an [`ArchiveWriter`]; the available
/// operations follow from it. `H` provides permission fixup and directory
/// listing.
#[derive(Debug)]
pub struct Archive<S, H = NativeHost> {
    stream: S,
    host: H,
}

impl<S, H: Host> Archive<S, H> {
    /// The underlying reader or writer.
    pub fn stream(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

#[cfg(feature = "reader")]
mod extract {
    use std::io::{Read, Write};
    use std::path::Path;

    use super::*;
    use crate::error::ArchiveError;

    impl<R: Read> Archive<ArchiveReader<R>> {
        pub fn reader(source: R) -> Self {
            Self::reader_with(source, ReaderOptions::default(), NativeHost)
        }
    }

    impl<R: Read, H: Host> Archive<ArchiveReader<R>, H> {
        pub fn reader_with(source: R, options: ReaderOptions, host: H) -> Self {
            Archive {
                stream: ArchiveReader::with_options(source, options),
                host,
            }
        }

        /// Extracts every remaining entry below `target`, returning the number
        /// of entries processed (skipped existing files included).
        pub fn extract(
            &mut self,
            target: &Path,
            options: &ExtractOptions,
        ) -> Result<usize, ArchiveError> {
            let mut count = 0;
            let mut buf = vec![0u8; 32 * 1024];

            while let Some(entry) = self.stream.next_entry()? {
                let relative = crate::path::sanitize(&entry.name).ok_or_else(|| {
                    ArchiveError::UnsafePath {
                        name: entry.name.clone(),
                    }
                })?;
                let path = target.join(relative);

                if entry.is_directory() {
                    std::fs::create_dir_all(&path).map_err(|source| ArchiveError::CreateDir {
                        path: path.clone(),
                        source,
                    })?;
                } else {
                    if options.keep_existing && path.exists() {
                        tracing::debug!(name = %entry.name, "keeping existing file");
                        count += 1;
                        continue;
                    }

                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent).map_err(|source| {
                            ArchiveError::CreateDir {
                                path: parent.to_path_buf(),
                                source,
                            }
                        })?;
                    }

                    let mut file =
                        std::fs::File::create(&path).map_err(|source| ArchiveError::CreateFile {
                            path: path.clone(),
                            source,
                        })?;
                    loop {
                        let n = self.stream.read(&mut buf)?;
                        if n == 0 {
                            break;
                        }
                        file.write_all(&buf[..n])
                            .map_err(|source| ArchiveError::CreateFile {
                                path: path.clone(),
                                source,
                            })?;
                    }
                }

                if options.restore_permissions {
                    if let Err(error) = self.host.apply_permissions(&path, entry.mode) {
                        tracing::warn!(
                            path = %path.display(),
                            mode = entry.mode,
                            %error,
                            "could not apply permissions"
                        );
                    }
                }

                tracing::debug!(name = %entry.name, size = entry.content_size(), "extracted");
                count += 1;
            }

            Ok(count)
        }
    }
}

#[cfg(feature = "writer")]
mod add {
    use std::io::{ErrorKind, Read, Write};
    use std::path::Path;

    use super::*;
    use crate::error::ArchiveError;

    impl<W: Write> Archive<ArchiveWriter<W>> {
        pub fn writer(sink: W) -> Self {
            Self::writer_with(sink, WriterOptions::default(), NativeHost)
        }
    }

    impl<W: Write, H: Host> Archive<ArchiveWriter<W>, H> {
        pub fn writer_with(sink: W, options: WriterOptions, host: H) -> Self {
            Archive {
                stream: ArchiveWriter::with_options(sink, options),
                host,
            }
        }

        /// Adds `path`, named after the path itself with any root removed.
        pub fn add(&mut self, path: &Path, options: &AddOptions) -> Result<(), ArchiveError> {
            let name = crate::path::entry_name(path, false);
            self.add_as(path, name, options)
        }

        /// Adds `path` under the entry name `name`. Children of a directory
        /// are named `name/<child>`.
        ///
        /// Owner ids, mode and mtime are taken from the filesystem as is. Values
        /// that do not fit their octal header field (a uid or gid of 262144 or
        /// more, for instance) fail with [`HeaderError::ValueTooLarge`] wrapped
        /// in [`ArchiveError::InvalidEntry`].
        ///
        /// [`HeaderError::ValueTooLarge`]: crate::error::HeaderError::ValueTooLarge
        pub fn add_as(
            &mut self,
            path: &Path,
            name: String,
            options: &AddOptions,
        ) -> Result<(), ArchiveError> {
            let entry = crate::fs::entry_from_path(path, name, options.dialect).map_err(
                |source| ArchiveError::ReadSource {
                    path: path.to_path_buf(),
                    source,
                },
            )?;

            // An empty name (the archive root itself) has no entry of its own.
            if !entry.name.is_empty() {
                self.stream.begin_entry(&entry)?;
                if !entry.is_directory() {
                    let source = entry.source.as_deref().unwrap_or(path);
                    self.copy_content(source, entry.size, options.chunk_size)?;
                }
                self.stream.close_entry()?;
                tracing::debug!(name = %entry.name, size = entry.content_size(), "added");
            }

            if entry.is_directory() && options.recurse {
                let children = self.host.list_children(path).map_err(|source| {
                    ArchiveError::ReadSource {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;

                for child in children {
                    let child_name = match child.file_name() {
                        Some(file_name) => {
                            format!("{}{}", entry.name, file_name.to_string_lossy())
                        }
                        None => continue,
                    };
                    self.add_as(&child, child_name, options)?;
                }
            }

            Ok(())
        }

        /// Streams up to `size` bytes of `path` into the open entry.
        fn copy_content(
            &mut self,
            path: &Path,
            size: u64,
            chunk_size: usize,
        ) -> Result<(), ArchiveError> {
            let read_error = |source| ArchiveError::ReadSource {
                path: path.to_path_buf(),
                source,
            };

            let mut file = std::fs::File::open(path).map_err(read_error)?;
            let mut buf = vec![0u8; chunk_size.max(1)];
            let mut remaining = size;

            while remaining > 0 {
                let want = usize::try_from(remaining)
                    .map(|r| r.min(buf.len()))
                    .unwrap_or(buf.len());
                let n = match file.read(&mut buf[..want]) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(read_error(e)),
                };
                self.stream.write(&buf[..n])?;
                remaining -= n as u64;
            }

            Ok(())
        }

        /// Ends the archive. See [`ArchiveWriter::finish`].
        pub fn finish(&mut self) -> Result<u64, ArchiveError> {
            self.stream.finish()
        }
    }
}

#[cfg(all(test, feature = "reader", feature = "writer"))]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::error::ArchiveError;
    use crate::Entry;

    /// Records permission requests instead of applying them.
    #[derive(Default)]
    struct RecordingHost {
        applied: RefCell<Vec<(PathBuf, u32)>>,
        fail: bool,
    }

    impl Host for RecordingHost {
        fn apply_permissions(&self, path: &Path, mode: u32) -> std::io::Result<()> {
            self.applied.borrow_mut().push((path.to_path_buf(), mode));
            if self.fail {
                Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "no chmod"))
            } else {
                Ok(())
            }
        }

        fn list_children(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
            NativeHost.list_children(dir)
        }
    }

    fn sample_archive() -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = ArchiveWriter::new(&mut out);
        writer.begin_entry(&Entry::directory("top/")).unwrap();
        writer.close_entry().unwrap();
        writer
            .begin_entry(&Entry::file("top/inner/file.txt", 5).with_mode(0o100600))
            .unwrap();
        writer.write(b"hello").unwrap();
        writer.close_entry().unwrap();
        writer.finish().unwrap();
        drop(writer);
        out
    }

    #[test]
    fn extract_creates_tree_and_requests_permissions() {
        let data = sample_archive();
        let target = tempfile::tempdir().unwrap();
        let host = RecordingHost::default();

        let mut archive = Archive::reader_with(&data[..], ReaderOptions::default(), host);
        let count = archive
            .extract(target.path(), &ExtractOptions::default())
            .unwrap();

        assert_eq!(count, 2);
        let file = target.path().join("top").join("inner").join("file.txt");
        assert_eq!(std::fs::read(&file).unwrap(), b"hello");

        let applied = archive.host().applied.borrow();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1], (file, 0o100600));
    }

    #[test]
    fn permission_failures_do_not_abort() {
        let data = sample_archive();
        let target = tempfile::tempdir().unwrap();
        let host = RecordingHost {
            fail: true,
            ..Default::default()
        };

        let mut archive = Archive::reader_with(&data[..], ReaderOptions::default(), host);
        let count = archive
            .extract(target.path(), &ExtractOptions::default())
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn existing_files_are_kept_unless_overwriting() {
        let data = sample_archive();
        let target = tempfile::tempdir().unwrap();
        let file = target.path().join("top").join("inner").join("file.txt");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"old").unwrap();

        let options = ExtractOptions {
            keep_existing: true,
            restore_permissions: false,
        };
        let count = Archive::reader(&data[..])
            .extract(target.path(), &options)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(std::fs::read(&file).unwrap(), b"old");

        let options = ExtractOptions {
            keep_existing: false,
            restore_permissions: false,
        };
        Archive::reader(&data[..])
            .extract(target.path(), &options)
            .unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), b"hello");
    }

    #[test]
    fn names_cannot_escape_target() {
        let mut out = Vec::new();
        let mut writer = ArchiveWriter::new(&mut out);
        writer.begin_entry(&Entry::file("../../escape", 1)).unwrap();
        writer.write(b"!").unwrap();
        writer.close_entry().unwrap();
        writer.begin_entry(&Entry::directory("../")).unwrap();
        writer.close_entry().unwrap();
        writer.finish().unwrap();
        drop(writer);

        let outer = tempfile::tempdir().unwrap();
        let target = outer.path().join("target");
        let mut archive = Archive::reader(&out[..]);
        let err = archive
            .extract(&target, &ExtractOptions::default())
            .unwrap_err();

        assert!(matches!(err, ArchiveError::UnsafePath { ref name } if name == "../"));
        assert!(target.join("escape").exists());
        assert!(!outer.path().join("escape").exists());
    }

    #[test]
    fn add_recurses_with_relative_names() {
        let source = tempfile::tempdir().unwrap();
        let root = source.path().join("root");
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("a.txt"), b"aaa").unwrap();
        std::fs::write(root.join("sub").join("b.txt"), vec![7u8; 70_000]).unwrap();

        let mut out = Vec::new();
        let mut archive = Archive::writer(&mut out);
        let options = AddOptions {
            dialect: crate::HeaderDialect::Gnu,
            chunk_size: 4096,
            ..Default::default()
        };
        archive.add_as(&root, "root".into(), &options).unwrap();
        archive.finish().unwrap();
        drop(archive);

        let mut reader = ArchiveReader::new(&out[..]);
        let entries: Vec<Entry> = reader.entries().map(|e| e.unwrap()).collect();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["root/", "root/a.txt", "root/sub/", "root/sub/b.txt"]);
        assert!(entries.iter().all(|e| e.dialect == crate::HeaderDialect::Gnu));
        assert_eq!(entries[3].size, 70_000);
    }

    #[test]
    fn add_without_recursion() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("child"), b"x").unwrap();

        let mut out = Vec::new();
        let mut archive = Archive::writer(&mut out);
        let options = AddOptions {
            recurse: false,
            ..Default::default()
        };
        archive.add_as(source.path(), "d".into(), &options).unwrap();
        archive.finish().unwrap();
        drop(archive);

        let mut reader = ArchiveReader::new(&out[..]);
        let names: Vec<String> = reader.entries().map(|e| e.unwrap().name).collect();
        assert_eq!(names, ["d/"]);
    }
}
