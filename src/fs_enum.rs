use crate::error::{LptfError, Result};
use crate::protocol::status;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;
// Filesystem enumeration for LIST, DOWNLOAD and TREE

const DIR_PREFIX: &str = "<DIR>\t";
const FILE_PREFIX: &str = "<FILE>\t";

/// Size of a regular file; anything else is an error.
pub fn get_file_size(path: &Path) -> Result<u64> {
    let md = fs::metadata(path)?;
    if !md.is_file() {
        return Err(LptfError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }
    Ok(md.len())
}

/// One `<DIR>\t<name>` or `<FILE>\t<name>` line per entry, sorted by name.
/// An empty directory yields the literal `(empty)`.
pub fn list_directory_content(path: &Path) -> Result<String> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        // follows symlinks like `ls` does; a dangling link shows up as a file
        let is_dir = entry.path().is_dir();
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    if entries.is_empty() {
        return Ok(status::EMPTY_LISTING.to_string());
    }
    entries.sort();

    let mut out = String::new();
    for (name, is_dir) in entries {
        out.push_str(if is_dir { DIR_PREFIX } else { FILE_PREFIX });
        out.push_str(&name);
        out.push('\n');
    }
    Ok(out)
}

/// Every entry below `root` as a relative path, one per line; directories
/// carry a trailing `/`. Symlinks are listed but not followed.
pub fn tree_listing(root: &Path) -> Result<String> {
    let mut out = String::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            LptfError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        // the wire format is '/'-separated regardless of host
        let rel: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        out.push_str(&rel.join("/"));
        if entry.file_type().is_dir() {
            out.push('/');
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_size_of_regular_file() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a.bin");
        fs::write(&f, vec![0u8; 20001]).unwrap();
        assert_eq!(get_file_size(&f).unwrap(), 20001);
        assert!(get_file_size(dir.path()).is_err());
        assert!(get_file_size(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn empty_directory_lists_as_empty_marker() {
        let dir = tempdir().unwrap();
        assert_eq!(list_directory_content(dir.path()).unwrap(), "(empty)");
    }

    #[test]
    fn listing_marks_dirs_and_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("photos")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        fs::write(dir.path().join("archive.tar.gz"), b"").unwrap();
        assert_eq!(
            list_directory_content(dir.path()).unwrap(),
            "<FILE>\tarchive.tar.gz\n<FILE>\tnotes.txt\n<DIR>\tphotos\n"
        );
    }

    #[test]
    fn listing_a_file_fails() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("f");
        fs::write(&f, b"x").unwrap();
        assert!(list_directory_content(&f).is_err());
    }

    #[test]
    fn tree_is_relative_and_marks_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/c.txt"), b"c").unwrap();
        fs::write(dir.path().join("top.txt"), b"t").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        assert_eq!(
            tree_listing(dir.path()).unwrap(),
            "a/\na/b/\na/b/c.txt\nempty/\ntop.txt\n"
        );
    }

    #[test]
    fn tree_of_empty_root_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(tree_listing(dir.path()).unwrap(), "");
    }
}
