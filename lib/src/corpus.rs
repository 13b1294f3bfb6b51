use std::fs;
use std::sync::Arc;
use std::path::{Path, PathBuf};

use crate::error::{Chainable, NotFound, Result};

/// The rendered documents discovered under a single root directory,
/// ordered by path.
#[derive(Debug)]
pub struct Corpus {
    root: PathBuf,
    docs: Vec<Document>,
}

/// A single rendered document captured at walk time.
#[derive(Debug)]
pub struct Document {
    pub path: Arc<Path>,
    pub file_name: String,
    pub metadata: fs::Metadata,
}

#[derive(Default, Debug)]
struct WalkMetadata(Option<fs::Metadata>);

impl jwalk::ClientState for WalkMetadata {
    type ReadDirState = ();
    type DirEntryState = Self;
}

impl Corpus {
    /// Walks `root`, collecting every file whose extension equals
    /// `extension`. The root must be an existing directory; a root with
    /// zero matching documents is a valid, empty corpus.
    pub fn build<P: AsRef<Path>>(root: P, extension: &str) -> Result<Self> {
        use jwalk::WalkDirGeneric;

        let root = root.as_ref();
        if !root.is_dir() {
            return Err(NotFound { path: root.into(), expected: "directory" }.into());
        }

        let walker = WalkDirGeneric::<WalkMetadata>::new(root)
            .follow_links(true)
            .process_read_dir(|_, _, _, entries| {
                entries.iter_mut()
                    .filter_map(|e| e.as_mut().ok())
                    .for_each(|e| e.client_state = WalkMetadata(e.metadata().ok()))
            });

        let mut docs = vec![];
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type.is_file() {
                continue;
            }

            let file_name = entry.file_name.to_string_lossy().into_owned();
            match file_name.rsplit_once('.') {
                Some((_, ext)) if ext == extension => { },
                _ => continue,
            }

            let path = entry.path();
            let Some(metadata) = entry.client_state.0 else { continue };
            docs.push(Document {
                path: Arc::from(path.into_boxed_path()),
                file_name,
                metadata,
            });
        }

        docs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Corpus { root: root.to_path_buf(), docs })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    /// Total size of the corpus, for diagnostics.
    pub fn total_bytes(&self) -> usize {
        self.docs.iter().map(|d| d.metadata.len() as usize).sum()
    }
}

impl Document {
    /// Reads the document as text. Invalid UTF-8 sequences are replaced
    /// rather than fatal: the scanner wants best effort text.
    pub fn read_lossy(&self) -> Result<String> {
        let bytes = fs::read(&*self.path).chain_with(|| error! {
            "failed to read document",
            "path" => self.path.display(),
        })?;

        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }
}
