//! BM25 keyword search backed by per-session in-memory Tantivy indexes.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, PhraseQuery, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, STORED, STRING, Schema, TEXT, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term, doc};
use tracing::{debug, warn};

use super::engine::{DEFAULT_MAX_RESULTS, SearchEngine, SessionHousekeeping};
use super::index::{SessionRegistry, next_entry_id};
use crate::types::{SearchRequest, SearchResponse, SearchType, ToolReference};

/// Results scoring below this are discarded unless configured otherwise.
pub const DEFAULT_MIN_SCORE: f32 = 0.25;

// Tantivy's minimum per-thread indexing arena, paid once per open session.
const WRITER_HEAP_BYTES: usize = 15_000_000;

#[derive(Clone, Copy)]
struct KeywordFields {
    id: Field,
    tool_name: Field,
    name_text: Field,
    description: Field,
}

impl KeywordFields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let fields = Self {
            id: builder.add_text_field("id", STRING | STORED),
            tool_name: builder.add_text_field("tool_name", STRING | STORED),
            name_text: builder.add_text_field("name_text", TEXT),
            description: builder.add_text_field("description", TEXT | STORED),
        };
        (builder.build(), fields)
    }
}

struct WriteSide {
    writer: IndexWriter,
    dirty: bool,
}

struct KeywordIndex {
    index: Index,
    fields: KeywordFields,
    write: Mutex<WriteSide>,
    reader: IndexReader,
}

impl KeywordIndex {
    fn open() -> crate::Result<Self> {
        let (schema, fields) = KeywordFields::schema();
        let index = Index::create_in_ram(schema);
        let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            fields,
            write: Mutex::new(WriteSide {
                writer,
                dirty: false,
            }),
            reader,
        })
    }

    fn add(&self, id: u64, reference: &ToolReference) -> crate::Result<()> {
        let f = self.fields;
        let mut write = self.write.lock().unwrap_or_else(|e| e.into_inner());
        write.writer.add_document(doc!(
            f.id => id.to_string(),
            f.tool_name => reference.tool_name.as_str(),
            f.name_text => reference.tool_name.as_str(),
            f.description => reference.summary.as_str(),
        ))?;
        write.dirty = true;
        Ok(())
    }

    /// Commit pending writes and reopen the reader, only if anything changed.
    fn refresh(&self) -> crate::Result<()> {
        let mut write = self.write.lock().unwrap_or_else(|e| e.into_inner());
        if write.dirty {
            write.writer.commit()?;
            self.reader.reload()?;
            write.dirty = false;
        }
        Ok(())
    }

    fn num_docs(&self) -> crate::Result<usize> {
        self.refresh()?;
        Ok(self.reader.searcher().num_docs() as usize)
    }

    fn analyze(&self, text: &str) -> crate::Result<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.description)?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        Ok(tokens)
    }

    /// Phrase match over the description OR'd with a per-term match over
    /// description and name.
    fn build_query(&self, text: &str) -> crate::Result<Option<Box<dyn Query>>> {
        let tokens = self.analyze(text)?;
        if tokens.is_empty() {
            return Ok(None);
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        if tokens.len() > 1 {
            let terms = tokens
                .iter()
                .map(|t| Term::from_field_text(self.fields.description, t))
                .collect();
            clauses.push((Occur::Should, Box::new(PhraseQuery::new(terms))));
        }

        let mut seen = HashSet::new();
        let mut term_clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for token in tokens.iter().filter(|t| seen.insert(t.as_str())) {
            for field in [self.fields.description, self.fields.name_text] {
                term_clauses.push((
                    Occur::Should,
                    Box::new(TermQuery::new(
                        Term::from_field_text(field, token),
                        IndexRecordOption::WithFreqs,
                    )),
                ));
            }
        }
        clauses.push((Occur::Should, Box::new(BooleanQuery::new(term_clauses))));

        Ok(Some(Box::new(BooleanQuery::new(clauses))))
    }

    fn search(&self, text: &str, limit: usize, min_score: f32) -> crate::Result<Vec<ToolReference>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.refresh()?;

        let Some(query) = self.build_query(text)? else {
            return Ok(Vec::new());
        };

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit))?;

        let mut references = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            debug!(score, "Keyword hit");
            if score < min_score {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(address)?;
            let field_text = |field: Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            references.push(
                ToolReference::new(
                    field_text(self.fields.tool_name),
                    field_text(self.fields.description),
                )
                .with_score(f64::from(score)),
            );
        }
        Ok(references)
    }
}

/// Keyword search engine with one isolated Tantivy index per session.
///
/// Each open session owns a RAM index and a single-threaded `IndexWriter`.
/// The writer reserves a 15 MB indexing arena and runs its own merge and
/// segment-updater threads, so memory and thread count grow linearly with the
/// number of concurrently open sessions. Both are released by `clear_index`.
/// Hosts serving many parallel conversations should end them promptly or run
/// an [`IdleSweeper`](super::IdleSweeper), or pick the pattern backend.
pub struct KeywordSearchEngine {
    sessions: SessionRegistry<KeywordIndex>,
    min_score: f32,
}

impl KeywordSearchEngine {
    pub fn new() -> Self {
        Self::with_min_score(DEFAULT_MIN_SCORE)
    }

    pub fn with_min_score(min_score: f32) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            min_score,
        }
    }

    pub fn min_score(&self) -> f32 {
        self.min_score
    }

    /// Make pending writes of every session visible to searches.
    pub fn commit(&self) -> crate::Result<()> {
        for index in self.sessions.indexes() {
            index.refresh()?;
        }
        Ok(())
    }
}

impl Default for KeywordSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine for KeywordSearchEngine {
    fn search_type(&self) -> SearchType {
        SearchType::Keyword
    }

    fn index_tool(&self, session_id: &str, reference: &ToolReference) -> crate::Result<()> {
        if session_id.trim().is_empty() {
            warn!(tool = %reference.tool_name, "No session id provided, skipping indexing");
            return Ok(());
        }

        let id = next_entry_id();
        let index = self
            .sessions
            .get_or_try_create(session_id, KeywordIndex::open)?;
        index.add(id, reference)?;
        debug!(session_id, tool = %reference.tool_name, id, "Indexed tool");
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> crate::Result<SearchResponse> {
        let start = Instant::now();

        if !request.has_session() {
            warn!("No session id provided in search request, returning empty results");
            return Ok(SearchResponse::empty(self.search_type(), &request.query));
        }
        let Some(index) = self.sessions.get(&request.session_id) else {
            debug!(session_id = %request.session_id, "No index found for session");
            return Ok(SearchResponse::empty(self.search_type(), &request.query));
        };

        let references = index.search(
            &request.query,
            request.limit_or(DEFAULT_MAX_RESULTS),
            self.min_score,
        )?;

        Ok(SearchResponse::new(
            self.search_type(),
            &request.query,
            references,
            start.elapsed().as_millis() as u64,
        ))
    }

    fn clear_index(&self, session_id: &str) -> crate::Result<()> {
        if self.sessions.remove(session_id).is_some() {
            debug!(session_id, "Released keyword index for session");
        }
        Ok(())
    }
}

impl SessionHousekeeping for KeywordSearchEngine {
    fn size(&self, session_id: &str) -> crate::Result<usize> {
        match self.sessions.get(session_id) {
            Some(index) => index.num_docs(),
            None => Ok(0),
        }
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn idle_sessions(&self, max_idle: Duration) -> Vec<String> {
        self.sessions.idle_sessions(max_idle)
    }

    fn total_size(&self) -> crate::Result<usize> {
        self.sessions
            .indexes()
            .iter()
            .map(|index| index.num_docs())
            .sum()
    }
}
