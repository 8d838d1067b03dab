//! A small in-memory knowledge base searched by embedding similarity.

use crate::embedding::{Embedder, Vector, cosine_similarity};
use crate::function::Function;
use anyhow::{Context, Result, anyhow};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const DEFAULT_NUM_DOCUMENTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vector,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub content: String,
    pub score: f32,
}

/// Documents plus the embedder that indexed them. Clones share the same
/// document set.
#[derive(Clone)]
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    documents: Arc<RwLock<Vec<Document>>>,
    num_documents: usize,
}

#[derive(Deserialize, JsonSchema)]
struct SearchArgs {
    /// Query to search the knowledge base for
    query: String,
}

impl KnowledgeBase {
    pub fn new(embedder: impl Embedder + 'static) -> Self {
        Self::from_shared(Arc::new(embedder))
    }

    pub fn from_shared(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            documents: Arc::new(RwLock::new(Vec::new())),
            num_documents: DEFAULT_NUM_DOCUMENTS,
        }
    }

    /// How many documents a search returns by default.
    pub fn with_num_documents(mut self, n: usize) -> Self {
        self.num_documents = n.max(1);
        self
    }

    pub fn add_document(&self, name: impl Into<String>, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        let embedding = self.embedder.embed(&content);
        let doc = Document {
            name: name.into(),
            content,
            embedding,
        };
        debug!(name = %doc.name, "Indexed document");
        self.documents
            .write()
            .map_err(|_| anyhow!("knowledge base lock poisoned"))?
            .push(doc);
        Ok(())
    }

    /// Split text into paragraphs (separated by blank lines) and index each
    /// one as `name_<n>`. Returns the number of documents added.
    pub fn load_text(&self, name: &str, text: &str) -> Result<usize> {
        let mut added = 0;
        for paragraph in paragraphs(text) {
            added += 1;
            self.add_document(format!("{}_{}", name, added), paragraph)?;
        }
        Ok(added)
    }

    /// Load a text file, or every `.txt`/`.md` file under a directory.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let mut added = 0;
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_text = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "txt" | "md"));
            if !is_text && entry.path() != path {
                continue;
            }
            let text = std::fs::read_to_string(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            let stem = entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document");
            added += self.load_text(stem, &text)?;
        }
        info!(path = %path.display(), documents = added, "Loaded knowledge");
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `top_k` documents most similar to `query`, best first.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query_vec = self.embedder.embed(query);
        let docs = self
            .documents
            .read()
            .map_err(|_| anyhow!("knowledge base lock poisoned"))?;
        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter_map(|doc| {
                cosine_similarity(&query_vec, &doc.embedding).map(|score| SearchHit {
                    name: doc.name.clone(),
                    content: doc.content.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// `search_knowledge_base(query)`, returning the hits as a JSON array.
    pub fn search_function(&self) -> Function {
        let kb = self.clone();
        Function::typed(
            "search_knowledge_base",
            "Use this function to search the knowledge base for information about a query.",
            move |args: SearchArgs| {
                let hits = kb.search(&args.query, kb.num_documents)?;
                if hits.is_empty() {
                    return Ok("No documents found".to_string());
                }
                Ok(serde_json::to_string(&hits)?)
            },
        )
    }
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}
