use {
    crate::{Error, Result},
    std::path::{Path, PathBuf},
    tokio::fs::{self, ReadDir},
};

/// Lists every file below `root`, depth first in pre-order.
///
/// Subdirectories are descended into as soon as they are encountered, so a
/// directory's files appear right after the directory's position in its
/// parent listing. Within a directory entries keep the order the platform
/// returns them in; nothing is sorted and no extension is filtered.
///
/// Returned paths are absolute. Symbolic links are listed as files and never
/// followed.
///
/// # Errors
///
/// `FilesystemDiscoveryFailure` if `root` or any directory below it cannot be
/// listed. A partial listing is never returned.
pub async fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let root = fs::canonicalize(root)
        .await
        .map_err(|err| Error::discovery(root, err))?;

    let mut files = Vec::new();
    let mut stack: Vec<(PathBuf, ReadDir)> = vec![(root.clone(), open(&root).await?)];

    while let Some((dir, entries)) = stack.last_mut() {
        let next = entries
            .next_entry()
            .await
            .map_err(|err| Error::discovery(dir.as_path(), err))?;

        let Some(entry) = next else {
            stack.pop();
            continue;
        };

        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|err| Error::discovery(&path, err))?;

        if file_type.is_dir() {
            let entries = open(&path).await?;
            stack.push((path, entries));
        } else {
            files.push(path);
        }
    }

    tracing::debug!("Discovered {} route file(s) below {}", files.len(), root.display());
    Ok(files)
}

async fn open(dir: &Path) -> Result<ReadDir> {
    fs::read_dir(dir)
        .await
        .map_err(|err| Error::discovery(dir, err))
}
