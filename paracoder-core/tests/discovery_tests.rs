// paracoder-core/tests/discovery_tests.rs

use paracoder_core::discovery::{PathKind, build_path_tree};
use paracoder_core::error::CoreError;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn extensions(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|ext| ext.to_string()).collect()
}

/// root/a.flac, root/sub/b.flac, root/sub/deep/C.FLAC, root/empty/,
/// root/other/notes.txt
fn sample_tree(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(root.join("sub").join("deep"))?;
    fs::create_dir_all(root.join("empty"))?;
    fs::create_dir_all(root.join("other"))?;
    File::create(root.join("a.flac"))?;
    File::create(root.join("sub").join("b.flac"))?;
    File::create(root.join("sub").join("deep").join("C.FLAC"))?;
    File::create(root.join("other").join("notes.txt"))?;
    Ok(())
}

#[test]
fn test_recursive_tree_keeps_only_contributing_directories() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let root = dir.path();
    sample_tree(root)?;

    let tree = build_path_tree(&[root.to_path_buf()], usize::MAX, &extensions(&["flac"]))?;

    let files: Vec<PathBuf> = tree.files().map(|e| e.path.clone()).collect();
    assert_eq!(
        files,
        vec![
            root.join("a.flac"),
            root.join("sub").join("b.flac"),
            root.join("sub").join("deep").join("C.FLAC"),
        ]
    );

    let dirs: Vec<PathBuf> = tree.directories().map(|e| e.path.clone()).collect();
    assert_eq!(dirs.len(), 3);
    assert!(tree.contains(root));
    assert!(tree.contains(&root.join("sub")));
    assert!(tree.contains(&root.join("sub").join("deep")));
    assert!(!tree.contains(&root.join("empty")));
    assert!(!tree.contains(&root.join("other")));

    // Every file's ancestors are present up to the root, nothing above it
    for file in tree.files() {
        for ancestor in file.path.ancestors().skip(1) {
            if ancestor.starts_with(root) {
                assert!(tree.contains(ancestor), "missing ancestor {}", ancestor.display());
            } else {
                assert!(!tree.contains(ancestor), "unexpected {}", ancestor.display());
            }
        }
    }

    dir.close()?;
    Ok(())
}

#[test]
fn test_flat_tree_stops_at_direct_children() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let root = dir.path();
    sample_tree(root)?;

    let tree = build_path_tree(&[root.to_path_buf()], 1, &extensions(&["flac"]))?;

    assert_eq!(tree.files().count(), 1);
    assert!(tree.contains(&root.join("a.flac")));
    assert_eq!(tree.directories().count(), 1);
    assert!(!tree.contains(&root.join("sub")));

    dir.close()?;
    Ok(())
}

#[test]
fn test_file_root_brings_its_parent() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let root = dir.path();
    sample_tree(root)?;
    let file = root.join("sub").join("b.flac");

    let tree = build_path_tree(&[file.clone()], 1, &extensions(&["flac"]))?;

    assert_eq!(tree.len(), 2);
    assert_eq!(tree.get(&file).map(|e| e.kind), Some(PathKind::File));
    assert_eq!(tree.get(&root.join("sub")).map(|e| e.kind), Some(PathKind::Directory));
    assert!(!tree.contains(root));

    // A file root with another extension contributes nothing
    let tree = build_path_tree(&[root.join("other").join("notes.txt")], 1, &extensions(&["flac"]))?;
    assert!(tree.is_empty());

    dir.close()?;
    Ok(())
}

#[test]
fn test_overlapping_roots_are_deduplicated() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let root = dir.path();
    sample_tree(root)?;

    let tree = build_path_tree(
        &[root.to_path_buf(), root.join("sub"), root.join("a.flac")],
        usize::MAX,
        &extensions(&["flac"]),
    )?;
    assert_eq!(tree.files().count(), 3);
    assert_eq!(tree.directories().count(), 3);

    dir.close()?;
    Ok(())
}

#[test]
fn test_directories_deepest_first() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let root = dir.path();
    sample_tree(root)?;

    let tree = build_path_tree(&[root.to_path_buf()], usize::MAX, &extensions(&["flac"]))?;
    let order: Vec<PathBuf> = tree
        .directories_deepest_first()
        .into_iter()
        .map(|e| e.path.clone())
        .collect();
    assert_eq!(order, vec![root.join("sub").join("deep"), root.join("sub"), root.to_path_buf()]);

    dir.close()?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_link_loops_and_dangling_links_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::symlink;

    let dir = tempdir()?;
    let root = dir.path();
    fs::create_dir_all(root.join("sub"))?;
    File::create(root.join("a.flac"))?;
    File::create(root.join("sub").join("b.flac"))?;
    symlink(root, root.join("sub").join("loop"))?;
    symlink(root.join("gone.flac"), root.join("dangling.flac"))?;

    let tree = build_path_tree(&[root.to_path_buf()], usize::MAX, &extensions(&["flac"]))?;

    let files: Vec<PathBuf> = tree.files().map(|e| e.path.clone()).collect();
    assert_eq!(files, vec![root.join("a.flac"), root.join("sub").join("b.flac")]);
    assert!(!tree.contains(&root.join("sub").join("loop")));

    dir.close()?;
    Ok(())
}

#[test]
fn test_entries_follow_component_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::create_dir_all(root.join("a"))?;
    File::create(root.join("a").join("b.flac"))?;
    File::create(root.join("a-b.flac"))?;

    let tree = build_path_tree(&[root.to_path_buf()], usize::MAX, &extensions(&["flac"]))?;

    // A plain string sort would put "a-b.flac" first
    let files: Vec<PathBuf> = tree.files().map(|e| e.path.clone()).collect();
    assert_eq!(files, vec![root.join("a").join("b.flac"), root.join("a-b.flac")]);

    dir.close()?;
    Ok(())
}

#[test]
fn test_missing_root_is_fatal() {
    let missing = PathBuf::from("surely_this_does_not_exist_42_paracoder");
    let result = build_path_tree(&[missing], usize::MAX, &extensions(&["flac"]));
    match result {
        Err(CoreError::Io(_)) => {}
        other => panic!("Unexpected result: {:?}", other.map(|tree| tree.len())),
    }
}
