use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Instant;

use tracing::debug;

use super::terms::TermParser;
use crate::model::DocumentId;

/// Turns free text into candidate entity names. Implementations may be slow
/// and are run off the interactive thread.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

impl<F> EntityExtractor for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn extract(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Treats runs of capitalised words as entity names ("New York Times").
/// Leading stop words are dropped so "The Hague" yields "Hague"; a run
/// ends at sentence punctuation.
#[derive(Clone, Debug)]
pub struct CapitalizedPhraseExtractor {
    parser: TermParser,
    max_words: usize,
}

impl Default for CapitalizedPhraseExtractor {
    fn default() -> Self {
        Self::new(TermParser::default())
    }
}

impl CapitalizedPhraseExtractor {
    pub fn new(parser: TermParser) -> Self {
        Self {
            parser,
            max_words: 4,
        }
    }

    fn flush(&self, run: &mut Vec<String>, found: &mut Vec<String>, seen: &mut HashSet<String>) {
        let start = run
            .iter()
            .position(|word| !self.parser.is_stop_word(word))
            .unwrap_or(run.len());
        let phrase = run[start..].join(" ");
        run.clear();
        if phrase.is_empty() || self.parser.is_stop_word(&phrase) {
            return;
        }
        if seen.insert(phrase.to_lowercase()) {
            found.push(phrase);
        }
    }
}

impl EntityExtractor for CapitalizedPhraseExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut run = Vec::new();

        for raw in text.split_whitespace() {
            let ends_clause = raw.ends_with(['.', ',', ';', ':', '!', '?', ')']);
            let word = raw.trim_matches(|ch: char| !ch.is_alphanumeric());
            let capitalised = word.chars().next().is_some_and(char::is_uppercase);

            if capitalised && run.len() < self.max_words {
                run.push(word.to_owned());
            } else {
                self.flush(&mut run, &mut found, &mut seen);
                if capitalised {
                    run.push(word.to_owned());
                }
            }
            if ends_clause {
                self.flush(&mut run, &mut found, &mut seen);
            }
        }
        self.flush(&mut run, &mut found, &mut seen);
        found
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub document: DocumentId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionResult {
    pub document: DocumentId,
    pub entities: Vec<String>,
}

/// Everything one background extraction pass found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionBatch {
    pub results: Vec<ExtractionResult>,
}

impl ExtractionBatch {
    pub fn entity_count(&self) -> usize {
        self.results.iter().map(|result| result.entities.len()).sum()
    }
}

/// Runs `extractor` over `requests` on a worker thread. The batch arrives on
/// the returned channel once every request is done; the receiver applies it
/// on the thread that owns the store.
pub fn spawn_extraction(
    extractor: Arc<dyn EntityExtractor>,
    requests: Vec<ExtractionRequest>,
) -> Receiver<ExtractionBatch> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let started = Instant::now();
        let results = requests
            .into_iter()
            .map(|request| ExtractionResult {
                document: request.document,
                entities: extractor.extract(&request.text),
            })
            .collect::<Vec<_>>();
        let batch = ExtractionBatch { results };
        debug!(
            documents = batch.results.len(),
            entities = batch.entity_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction finished"
        );
        let _ = tx.send(batch);
    });

    rx
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn capitalised_runs_become_phrases() {
        let extractor = CapitalizedPhraseExtractor::default();
        let found = extractor.extract(
            "Yesterday Anna Petrova met officials in The Hague. anna petrova left for New York.",
        );
        assert_eq!(found, vec!["Yesterday Anna Petrova", "Hague", "New York"]);
    }

    #[test]
    fn stop_word_runs_are_dropped() {
        let extractor = CapitalizedPhraseExtractor::default();
        assert!(extractor.extract("The. It. A").is_empty());
    }

    #[test]
    fn background_extraction_delivers_one_batch() {
        let extractor: Arc<dyn EntityExtractor> =
            Arc::new(|text: &str| vec![text.to_uppercase()]);
        let rx = spawn_extraction(
            extractor,
            vec![
                ExtractionRequest {
                    document: DocumentId(0),
                    text: "one".to_owned(),
                },
                ExtractionRequest {
                    document: DocumentId(1),
                    text: "two".to_owned(),
                },
            ],
        );
        let batch = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[1].entities, vec!["TWO"]);
        assert_eq!(batch.entity_count(), 2);
    }
}
