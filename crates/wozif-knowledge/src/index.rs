use tracing::{debug, warn};

use wozif_core::error::Result;

use crate::embeddings::{content_hash, cosine_similarity, EmbeddingProvider};
use crate::store::EmbeddingCache;

/// Split knowledge text into chunks on blank lines, dropping empty ones.
pub fn split_paragraphs(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// In-memory vector index over text chunks.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<(String, Vec<f32>)>,
}

impl VectorIndex {
    /// Embed `chunks` and index them. Cached embeddings are reused; cache
    /// failures only cost a re-embedding.
    pub async fn build(
        chunks: Vec<String>,
        embedder: &dyn EmbeddingProvider,
        cache: Option<&EmbeddingCache>,
    ) -> Result<Self> {
        let model = embedder.model().to_string();
        let hashes: Vec<String> = chunks.iter().map(|c| content_hash(&model, c)).collect();

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(chunks.len());
        for hash in &hashes {
            let cached = match cache {
                Some(cache) => cache.get(hash).unwrap_or_else(|e| {
                    warn!(error = %e, "Embedding cache read failed");
                    None
                }),
                None => None,
            };
            vectors.push(cached);
        }

        let missing: Vec<usize> = (0..chunks.len()).filter(|&i| vectors[i].is_none()).collect();
        debug!(
            chunks = chunks.len(),
            cached = chunks.len() - missing.len(),
            "Building vector index"
        );

        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|&i| chunks[i].clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            for (&i, vector) in missing.iter().zip(embedded) {
                if let Some(cache) = cache {
                    if let Err(e) = cache.put(&hashes[i], &model, &vector) {
                        warn!(error = %e, "Embedding cache write failed");
                    }
                }
                vectors[i] = Some(vector);
            }
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .filter_map(|(chunk, vector)| vector.map(|v| (chunk, v)))
            .collect();
        Ok(Self { entries })
    }

    /// The `k` chunks most similar to `query`, best first. Ties keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<&str> {
        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (cosine_similarity(query, v), i))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored
            .into_iter()
            .take(k)
            .map(|(_, i)| self.entries[i].0.as_str())
            .collect()
    }

    /// Embed `question` and return the `k` closest chunks.
    pub async fn retrieve(
        &self,
        question: &str,
        embedder: &dyn EmbeddingProvider,
        k: usize,
    ) -> Result<Vec<String>> {
        if self.entries.is_empty() {
            return Ok(vec![]);
        }
        let query = embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        Ok(self.search(&query, k).into_iter().map(String::from).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: one dimension per keyword.
    pub(crate) struct KeywordEmbedder {
        pub keywords: Vec<&'static str>,
        pub embedded: AtomicUsize,
    }

    impl KeywordEmbedder {
        pub(crate) fn new(keywords: Vec<&'static str>) -> Self {
            Self {
                keywords,
                embedded: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingProvider for KeywordEmbedder {
        fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
            self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
            let out = texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    self.keywords
                        .iter()
                        .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect();
            Box::pin(async move { Ok(out) })
        }

        fn model(&self) -> &str {
            "keyword"
        }
    }

    #[test]
    fn test_split_paragraphs() {
        let chunks = split_paragraphs("Tarifs: 10€\n\n\n\n  Contact: support  \n\n");
        assert_eq!(chunks, vec!["Tarifs: 10€", "Contact: support"]);
        assert!(split_paragraphs("   ").is_empty());
    }

    #[tokio::test]
    async fn test_build_and_retrieve() {
        let embedder = KeywordEmbedder::new(vec!["tarif", "contact", "horaire"]);
        let chunks = vec![
            "Nos tarifs commencent à 10€".to_string(),
            "Contact: support@wozif.com".to_string(),
            "Horaires: 8h-18h".to_string(),
        ];
        let index = VectorIndex::build(chunks, &embedder, None).await.unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.retrieve("Quels sont vos tarifs ?", &embedder, 1).await.unwrap();
        assert_eq!(hits, vec!["Nos tarifs commencent à 10€"]);
    }

    #[tokio::test]
    async fn test_build_reuses_cache() {
        let cache = EmbeddingCache::in_memory().unwrap();
        let embedder = KeywordEmbedder::new(vec!["a"]);
        let chunks = vec!["a".to_string(), "b".to_string()];

        VectorIndex::build(chunks.clone(), &embedder, Some(&cache)).await.unwrap();
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 2);

        let mut more = chunks;
        more.push("c".to_string());
        let index = VectorIndex::build(more, &embedder, Some(&cache)).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_search_ties_keep_order() {
        let index = VectorIndex {
            entries: vec![
                ("first".into(), vec![1.0, 0.0]),
                ("second".into(), vec![1.0, 0.0]),
                ("third".into(), vec![0.0, 1.0]),
            ],
        };
        assert_eq!(index.search(&[1.0, 0.0], 2), vec!["first", "second"]);
        assert_eq!(index.search(&[1.0, 0.0], 10).len(), 3);
    }
}
