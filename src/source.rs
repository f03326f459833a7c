//! Source file loading, deduplication and position tracking.
//!
//! The reader keeps every loaded file for the lifetime of the run and
//! deduplicates on two levels: a normalized-path map (approximate but
//! conservative: a hit always refers to an already-loaded file) and an
//! OS file-identity map keyed on `(device, inode)`, so that importing
//! the same file through any equivalent path reuses its buffer and its
//! cached AST root.
//!
//! Positions are compact: every file owns a contiguous [`SourceId`]
//! range starting at its `source_id_base`, and a `SourceId` is just the
//! base plus the byte offset. Diagnostics translate an id back into
//! `{path, line, column, context line}` on demand.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::arena::FnvBuildHasher;
use crate::ast::AstNodeId;
use crate::diagnostics::fatal;

/// A position inside some loaded source file. `0` is reserved invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SourceId(pub u32);

impl SourceId {
    pub const INVALID: SourceId = SourceId(0);
}

/// Index of a loaded file inside the reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceFileId(u32);

/// A fully resolved source position, for diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct SourceLocation {
    pub filepath: PathBuf,
    pub line_number: u32,
    pub column_number: u32,
    pub context: String,
}

pub struct SourceFile {
    path: PathBuf,
    content: Vec<u8>,
    source_id_base: u32,
    ast_root: AstNodeId,
}

impl SourceFile {
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn source_id_base(&self) -> u32 {
        self.source_id_base
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct FileIdentity {
    device: u64,
    index: u64,
}

#[cfg(unix)]
fn file_identity(path: &Path) -> FileIdentity {
    use std::os::unix::fs::MetadataExt;

    match std::fs::metadata(path) {
        Ok(metadata) => FileIdentity {
            device: metadata.dev(),
            index: metadata.ino(),
        },
        Err(err) => fatal(format_args!(
            "could not get info on source file {} ({})",
            path.display(),
            err
        )),
    }
}

#[cfg(not(unix))]
fn file_identity(path: &Path) -> FileIdentity {
    // Without stable inode access, fall back to the canonical path,
    // which still collapses `.`/`..` spellings and symlinks.
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|err| {
        fatal(format_args!(
            "could not get info on source file {} ({})",
            path.display(),
            err
        ))
    });

    let bytes = canonical.to_string_lossy();

    FileIdentity {
        device: 0,
        index: u64::from(crate::arena::fnv1a(bytes.as_bytes())),
    }
}

/// Lexically normalizes a path: makes it absolute and folds `.` and
/// `..` components. Deliberately approximate (symlinks are left to the
/// identity map).
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|err| fatal(format_args!("could not get working directory ({})", err)))
            .join(path)
    };

    let mut normalized = PathBuf::new();

    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    normalized
}

/// Path- and identity-deduplicating cache of loaded source files.
pub struct SourceReader {
    files: Vec<SourceFile>,
    by_path: HashMap<PathBuf, u32, FnvBuildHasher>,
    by_identity: HashMap<FileIdentity, u32, FnvBuildHasher>,
    next_source_id_base: u32,
}

impl SourceReader {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            by_path: HashMap::with_hasher(FnvBuildHasher::default()),
            by_identity: HashMap::with_hasher(FnvBuildHasher::default()),
            // Base 1 keeps SourceId 0 invalid.
            next_source_id_base: 1,
        }
    }

    /// Loads `path`, or returns the already-loaded file when either the
    /// normalized path or the OS identity has been seen before.
    pub fn read_source_file(&mut self, path: &Path) -> SourceFileId {
        let normalized = normalize(path);

        if let Some(&index) = self.by_path.get(&normalized) {
            return SourceFileId(index);
        }

        let identity = file_identity(path);

        if let Some(&index) = self.by_identity.get(&identity) {
            self.by_path.insert(normalized, index);

            return SourceFileId(index);
        }

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(err) => fatal(format_args!(
                "could not read source file {} ({})",
                path.display(),
                err
            )),
        };

        if content.len() >= u32::MAX as usize {
            fatal(format_args!(
                "source file {} exceeds the supported maximum of {} bytes",
                path.display(),
                u32::MAX
            ));
        }

        let index = self.files.len() as u32;

        let source_id_base = self.next_source_id_base;

        self.next_source_id_base = source_id_base
            .checked_add(content.len() as u32 + 1)
            .unwrap_or_else(|| fatal(format_args!("total loaded source exceeds 4GiB")));

        self.files.push(SourceFile {
            path: normalized.clone(),
            content,
            source_id_base,
            ast_root: AstNodeId::INVALID,
        });

        self.by_path.insert(normalized, index);
        self.by_identity.insert(identity, index);

        SourceFileId(index)
    }

    pub fn file(&self, id: SourceFileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn ast_root(&self, id: SourceFileId) -> Option<AstNodeId> {
        let root = self.files[id.0 as usize].ast_root;

        (root != AstNodeId::INVALID).then_some(root)
    }

    pub fn set_ast_root(&mut self, id: SourceFileId, root: AstNodeId) {
        debug_assert!(self.files[id.0 as usize].ast_root == AstNodeId::INVALID);

        self.files[id.0 as usize].ast_root = root;
    }

    /// Resolves a [`SourceId`] back into path, line, column and the
    /// surrounding source line.
    pub fn source_location_from_id(&self, source_id: SourceId) -> SourceLocation {
        debug_assert!(source_id != SourceId::INVALID);

        let file = self
            .files
            .iter()
            .find(|f| {
                source_id.0 >= f.source_id_base
                    && source_id.0 <= f.source_id_base + f.content.len() as u32
            })
            .unwrap_or_else(|| {
                fatal(format_args!(
                    "source position {} does not belong to any loaded file",
                    source_id.0
                ))
            });

        let offset = (source_id.0 - file.source_id_base) as usize;

        let offset = offset.min(file.content.len());

        let line_start = file.content[..offset]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|p| p + 1)
            .unwrap_or(0);

        let line_number = 1 + file.content[..line_start]
            .iter()
            .filter(|&&b| b == b'\n')
            .count() as u32;

        let line_end = file.content[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| offset + p)
            .unwrap_or(file.content.len());

        let context = String::from_utf8_lossy(&file.content[line_start..line_end])
            .trim_end_matches('\r')
            .to_string();

        let column_number = String::from_utf8_lossy(&file.content[line_start..offset])
            .chars()
            .count() as u32
            + 1;

        SourceLocation {
            filepath: file.path.clone(),
            line_number,
            column_number,
            context,
        }
    }
}

impl Default for SourceReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();

        path
    }

    #[test]
    fn repeated_reads_hit_the_path_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "main.evl", "let x = 1\n");

        let mut reader = SourceReader::new();

        let first = reader.read_source_file(&path);
        let second = reader.read_source_file(&path);

        assert_eq!(first, second);
        assert_eq!(reader.file(first).content(), b"let x = 1\n");
    }

    #[test]
    fn dot_spelled_paths_resolve_to_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "main.evl", "let x = 1\n");

        let dotted = dir.path().join(".").join("main.evl");

        let mut reader = SourceReader::new();

        let first = reader.read_source_file(&path);
        let second = reader.read_source_file(&dotted);

        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn hard_links_dedup_by_file_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "main.evl", "let x = 1\n");

        let linked = dir.path().join("alias.evl");
        std::fs::hard_link(&path, &linked).unwrap();

        let mut reader = SourceReader::new();

        let first = reader.read_source_file(&path);
        let second = reader.read_source_file(&linked);

        assert_eq!(first, second);
    }

    #[test]
    fn source_locations_carry_line_column_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "main.evl", "first\nsecond line\n");

        let mut reader = SourceReader::new();

        let id = reader.read_source_file(&path);
        let base = reader.file(id).source_id_base();

        // Position of the 'l' in "line".
        let location = reader.source_location_from_id(SourceId(base + 13));

        assert_eq!(location.line_number, 2);
        assert_eq!(location.column_number, 8);
        assert_eq!(location.context, "second line");
    }

    #[test]
    fn distinct_files_get_disjoint_source_id_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.evl", "aaaa\n");
        let b = write_file(dir.path(), "b.evl", "bbbb\n");

        let mut reader = SourceReader::new();

        let first = reader.read_source_file(&a);
        let second = reader.read_source_file(&b);

        let first_base = reader.file(first).source_id_base();
        let second_base = reader.file(second).source_id_base();

        assert!(second_base > first_base + 4);
    }
}
