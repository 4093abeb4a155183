//! File naming conventions shared by every stage
//!
//! Class labels come from the dataset filenames (`great_pyrenees_10.jpg` is a
//! `great_pyrenees`), derived assets append one `_<tag>` token to the source
//! stem, and every output tree mirrors the raw tree's relative paths.

use std::path::{Path, PathBuf};

/// Bucket for files whose name carries no class token
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Derive the class label from a dataset filename.
///
/// All `_`-delimited tokens except the last one form the label. Names without
/// an underscore (or with an empty label) fall into [`UNCATEGORIZED`].
#[must_use]
pub fn class_label_from_filename(file_name: &str) -> String {
    match file_name.rsplit_once('_') {
        Some((label, _)) if !label.is_empty() => label.to_string(),
        _ => UNCATEGORIZED.to_string(),
    }
}

/// Natural-language phrase for a class directory name
#[must_use]
pub fn class_phrase(class_dir_name: &str) -> String {
    class_dir_name.replace('_', " ")
}

/// Recover the source stem of a derived asset by dropping its last `_` token.
///
/// Returns `None` when the stem has no underscore or nothing precedes it.
#[must_use]
pub fn source_stem(derived_stem: &str) -> Option<&str> {
    derived_stem
        .rsplit_once('_')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
}

/// File name of a derived asset: `<source_stem>_<tag>.jpg`
#[must_use]
pub fn variant_file_name(source_stem: &str, tag: &str) -> String {
    format!("{source_stem}_{tag}.jpg")
}

/// Map a file under `source_root` to the same relative path under
/// `target_root`, optionally replacing the extension.
///
/// Returns `None` if `path` is not inside `source_root`.
#[must_use]
pub fn mirrored_path(
    path: &Path,
    source_root: &Path,
    target_root: &Path,
    extension: Option<&str>,
) -> Option<PathBuf> {
    let relative = path.strip_prefix(source_root).ok()?;
    let mirrored = target_root.join(relative);
    Some(match extension {
        Some(ext) => mirrored.with_extension(ext),
        None => mirrored,
    })
}

/// Directory under `target_root` mirroring the parent of `path`
#[must_use]
pub fn mirrored_parent(path: &Path, source_root: &Path, target_root: &Path) -> Option<PathBuf> {
    let relative_parent = path.parent()?.strip_prefix(source_root).ok()?;
    Some(target_root.join(relative_parent))
}

/// File stem as UTF-8, if any
pub(crate) fn stem_str(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}
