// ============================================================================
// paracoder-core/src/discovery.rs
// ============================================================================
//
// FILE DISCOVERY: Building the Path Tree of a Batch
//
// This module walks the input roots and collects every qualifying file
// together with every directory that contains one, keyed by absolute path.
// The recorded modification times are what the orchestrator later writes
// back onto targets and directories.
//
// KEY COMPONENTS:
// - PathEntry / PathKind: One discovered file or directory
// - PathTree: Deduplicated, path-ordered map of entries
// - build_path_tree: Traversal with extension filtering and pruning
// - compare_deepest_first: Ordering used for directory timestamp repair

// ---- Internal crate imports ----
use crate::error::CoreResult;

// ---- External crate imports ----
use filetime::FileTime;
use log::{debug, warn};
use walkdir::WalkDir;

// ---- Standard library imports ----
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

/// A discovered path and the modification time it had at discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: PathBuf,
    pub modified: FileTime,
    pub kind: PathKind,
}

impl PathEntry {
    pub fn is_file(&self) -> bool {
        self.kind == PathKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == PathKind::Directory
    }

    /// Lowercase extension of the entry, empty when there is none.
    pub fn extension(&self) -> String {
        lowercase_extension(&self.path)
    }
}

/// All entries of one batch, keyed by absolute path.
///
/// Iteration follows `Path` ordering, which compares component by component:
/// `x/a/b.flac` comes before `x/a-b.flac` even though `-` sorts before `/`
/// as a character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTree {
    entries: BTreeMap<PathBuf, PathEntry>,
}

impl PathTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: PathEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &Path) -> Option<&PathEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.values()
    }

    /// Regular files in path order.
    pub fn files(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.values().filter(|entry| entry.is_file())
    }

    pub fn directories(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.values().filter(|entry| entry.is_dir())
    }

    /// Directories ordered from the deepest path to the shallowest.
    pub fn directories_deepest_first(&self) -> Vec<&PathEntry> {
        let mut dirs: Vec<&PathEntry> = self.directories().collect();
        dirs.sort_by(|a, b| compare_deepest_first(&a.path, &b.path));
        dirs
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&PathEntry) -> bool,
    {
        self.entries.retain(|_, entry| keep(entry));
    }
}

// ============================================================================
// TRAVERSAL
// ============================================================================

/// Builds the path tree for a batch.
///
/// `max_depth` is 1 for a flat scan of each input directory and
/// `usize::MAX` for a recursive one. A directory is only part of the result
/// when at least one qualifying file sits below it; an input root that is
/// itself a qualifying file contributes its parent directory as well.
///
/// Symbolic links are followed. Links that point back at one of their own
/// ancestors, and links whose target is gone, are skipped with a warning.
/// Any other failure to read metadata aborts the traversal: a partial tree
/// would make the directory timestamp repair silently incomplete.
pub fn build_path_tree(
    roots: &[PathBuf],
    max_depth: usize,
    extensions: &BTreeSet<String>,
) -> CoreResult<PathTree> {
    let mut tree = PathTree::new();

    for root in roots {
        let root = std::path::absolute(root)?;
        let metadata = fs::metadata(&root)?;

        if metadata.is_file() {
            if has_allowed_extension(&root, extensions) {
                tree.insert(PathEntry {
                    path: root.clone(),
                    modified: FileTime::from_last_modification_time(&metadata),
                    kind: PathKind::File,
                });
                if let Some(parent) = root.parent() {
                    let parent_meta = fs::metadata(parent)?;
                    tree.insert(PathEntry {
                        path: parent.to_path_buf(),
                        modified: FileTime::from_last_modification_time(&parent_meta),
                        kind: PathKind::Directory,
                    });
                }
            }
            continue;
        }

        collect_directory(&root, max_depth, extensions, &mut tree)?;
    }

    debug!("PathTree: {:?}", tree.entries.keys().collect::<Vec<_>>());
    Ok(tree)
}

fn collect_directory(
    root: &Path,
    max_depth: usize,
    extensions: &BTreeSet<String>,
    tree: &mut PathTree,
) -> CoreResult<()> {
    let mut dir_times: HashMap<PathBuf, FileTime> = HashMap::new();
    let mut files: Vec<PathEntry> = Vec::new();

    for entry in WalkDir::new(root).max_depth(max_depth).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_skippable_link(&e) => {
                warn!("Skipping {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = entry.metadata()?;
        let modified = FileTime::from_last_modification_time(&metadata);

        if metadata.is_dir() {
            dir_times.insert(entry.path().to_path_buf(), modified);
        } else if metadata.is_file() && has_allowed_extension(entry.path(), extensions) {
            files.push(PathEntry {
                path: entry.path().to_path_buf(),
                modified,
                kind: PathKind::File,
            });
        }
    }

    // Only ancestors of qualifying files survive, up to and including the root
    for file in files {
        let mut ancestor = file.path.parent();
        while let Some(dir) = ancestor {
            if !dir.starts_with(root) || tree.contains(dir) {
                break;
            }
            if let Some(modified) = dir_times.get(dir) {
                tree.insert(PathEntry {
                    path: dir.to_path_buf(),
                    modified: *modified,
                    kind: PathKind::Directory,
                });
            }
            ancestor = dir.parent();
        }
        tree.insert(file);
    }

    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

/// Link loops and dangling links below a root.
fn is_skippable_link(error: &walkdir::Error) -> bool {
    if error.depth() == 0 {
        return false;
    }
    error.loop_ancestor().is_some()
        || error
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

/// Lowercase extension of a path, empty when there is none.
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn has_allowed_extension(path: &Path, extensions: &BTreeSet<String>) -> bool {
    let ext = lowercase_extension(path);
    !ext.is_empty() && extensions.contains(&ext)
}

/// Orders paths by descending number of components.
///
/// Children must have their timestamps restored before their parents,
/// because touching a child updates the parent's modification time.
pub fn compare_deepest_first(a: &Path, b: &Path) -> Ordering {
    b.components().count().cmp(&a.components().count())
}
