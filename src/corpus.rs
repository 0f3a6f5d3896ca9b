use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use starspire::controller::extraction::CapitalizedPhraseExtractor;
use starspire::snapshot::ProjectSnapshot;
use starspire::{EngineConfig, Workspace};
use tracing::info;

/// Where the viewer gets its initial workspace from.
#[derive(Clone, Debug)]
pub enum Source {
    /// Every `*.txt` file directly inside a directory, one document each.
    Corpus(PathBuf),
    /// A project saved earlier with "Save project".
    Project(PathBuf),
    Empty,
}

impl Source {
    pub fn describe(&self) -> String {
        match self {
            Self::Corpus(path) => format!("corpus {}", path.display()),
            Self::Project(path) => format!("project {}", path.display()),
            Self::Empty => "empty workspace".to_owned(),
        }
    }
}

pub struct CorpusDocument {
    pub name: String,
    pub content: String,
}

pub fn load_corpus(dir: &Path) -> Result<Vec<CorpusDocument>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read corpus directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        bail!("no .txt documents found in {}", dir.display());
    }

    paths
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read document {}", path.display()))?;
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(CorpusDocument { name, content })
        })
        .collect()
}

/// Builds the workspace for `source`. Runs on the loader thread; the layout
/// worker is started later by the UI once it has attached its repaint hook.
pub fn open_workspace(source: &Source, config: EngineConfig) -> Result<Workspace> {
    match source {
        Source::Corpus(dir) => {
            let documents = load_corpus(dir)?;
            let count = documents.len();
            let mut workspace = Workspace::new(config);
            workspace
                .import_documents(
                    documents
                        .into_iter()
                        .map(|document| (document.name, document.content)),
                )
                .context("failed to import corpus")?;
            info!(documents = count, dir = %dir.display(), "corpus loaded");
            Ok(workspace)
        }
        Source::Project(path) => {
            let snapshot = ProjectSnapshot::load(path)
                .with_context(|| format!("failed to load project {}", path.display()))?;
            let workspace =
                Workspace::restore(snapshot, Arc::new(CapitalizedPhraseExtractor::default()))
                .with_context(|| format!("failed to restore project {}", path.display()))?;
            info!(path = %path.display(), "project restored");
            Ok(workspace)
        }
        Source::Empty => Ok(Workspace::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("starspire-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn corpus_reads_only_text_files_in_name_order() {
        let dir = scratch_dir("corpus");
        fs::write(dir.join("b.txt"), "second").unwrap();
        fs::write(dir.join("a.txt"), "first").unwrap();
        fs::write(dir.join("notes.md"), "ignored").unwrap();

        let documents = load_corpus(&dir).unwrap();
        let names = documents.iter().map(|doc| doc.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(documents[0].content, "first");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let dir = scratch_dir("empty");
        let err = load_corpus(&dir).err().unwrap();
        assert!(err.to_string().contains("no .txt documents"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
