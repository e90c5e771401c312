use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::data::class_index::ClassIndex;
use crate::error::{Error, Result};

/// Where a sample's encoded bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl ImageSource {
    pub fn read(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            ImageSource::Path(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| Error::data(format!("cannot read '{}': {e}", path.display()))),
            ImageSource::Bytes(bytes) => Ok(Cow::Borrowed(&bytes[..])),
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} in-memory bytes>", bytes.len()),
        }
    }
}

/// One training sample: encoded image plus its class id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    pub source: ImageSource,
    pub class_id: usize,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .map_err(|e| Error::data(format!("cannot list '{}': {e}", dir.display())))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::data(format!("cannot list '{}': {e}", dir.display())))?;
    paths.retain(|p| !is_hidden(p));
    paths.sort();
    Ok(paths)
}

/// Walks a corpus whose immediate subdirectories name the classes.
///
/// Classes are numbered in sorted directory-name order and samples are listed
/// in sorted file-name order, so the result only depends on the directory
/// contents. Hidden entries (leading `.`) are skipped.
pub fn discover(root: impl AsRef<Path>) -> Result<(Vec<LabeledImage>, ClassIndex)> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::configuration(format!(
            "dataset root '{}' is not a directory",
            root.display()
        )));
    }

    let mut labels = Vec::new();
    let mut items = Vec::new();
    for class_dir in sorted_entries(root)?.into_iter().filter(|p| p.is_dir()) {
        let label = class_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::data(format!("bad class directory '{}'", class_dir.display())))?;
        let class_id = labels.len();

        let before = items.len();
        items.extend(
            sorted_entries(&class_dir)?
                .into_iter()
                .filter(|p| p.is_file())
                .map(|p| LabeledImage { source: ImageSource::Path(p), class_id }),
        );
        if items.len() == before {
            return Err(Error::data(format!("class '{label}' has no samples")));
        }
        labels.push(label);
    }

    if labels.is_empty() {
        return Err(Error::data(format!("no class directories under '{}'", root.display())));
    }

    tracing::debug!(classes = labels.len(), samples = items.len(), "dataset discovered");
    Ok((items, ClassIndex::from_labels(labels)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn classes_and_samples_come_out_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("犬/b.png"));
        touch(&dir.path().join("犬/a.png"));
        touch(&dir.path().join("猫/z.png"));
        touch(&dir.path().join(".cache/ignored.png"));
        touch(&dir.path().join("stray.txt"));

        let (items, index) = discover(dir.path()).unwrap();
        assert_eq!(index.labels(), &["犬".to_owned(), "猫".to_owned()]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].source, ImageSource::Path(dir.path().join("犬/a.png")));
        assert_eq!(items[0].class_id, 0);
        assert_eq!(items[2].class_id, 1);
    }

    #[test]
    fn empty_class_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/1.png"));
        fs::create_dir_all(dir.path().join("b")).unwrap();
        assert_eq!(discover(dir.path()).unwrap_err().kind(), ErrorKind::Data);
    }

    #[test]
    fn corpus_without_classes_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("loose.png"));
        assert_eq!(discover(dir.path()).unwrap_err().kind(), ErrorKind::Data);
    }

    #[test]
    fn missing_root_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
