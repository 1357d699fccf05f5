//! Chunk, context and response models
//!
//! Shapes shared by ingestion, retrieval and the HTTP surface. The index
//! payload keeps the short field names (`text`, `source`, `page`) so vectors
//! written by other clients of the same index stay readable.

use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A bounded span of source text plus its embedding and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique identifier (UUID v4)
    pub chunk_id: String,
    
    /// Chunk content, never empty or whitespace-only
    pub chunk_text: String,
    
    /// Filename the chunk was extracted from
    pub source_filename: String,
    
    /// 1-based page number (always 1 for non-paginated formats)
    pub page_number: u32,
    
    /// Dense embedding of `chunk_text`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Create a chunk with a fresh id and no embedding yet
    pub fn new(chunk_text: String, source_filename: &str, page_number: u32) -> Self {
        Self {
            chunk_id: Uuid::new_v4().to_string(),
            chunk_text,
            source_filename: source_filename.to_string(),
            page_number,
            embedding: Vec::new(),
        }
    }
    
    /// Metadata stored alongside the vector in the index
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            text: self.chunk_text.clone(),
            source: self.source_filename.clone(),
            page: self.page_number,
        }
    }
    
    /// Build the index record for this chunk
    pub fn to_record(&self) -> IndexRecord {
        IndexRecord {
            id: self.chunk_id.clone(),
            values: self.embedding.clone(),
            metadata: self.metadata(),
        }
    }
}

/// Payload stored with each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub text: String,
    pub source: String,
    #[serde(deserialize_with = "deserialize_page")]
    pub page: u32,
}

/// Index metadata stores numbers as floats; accept `3` and `3.0` alike
fn deserialize_page<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
        return Err(de::Error::custom(format!("invalid page number: {}", value)));
    }
    Ok(value as u32)
}

/// `(id, vector, metadata)` triple accepted by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Ranked match returned by an index query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    pub id: String,
    /// Similarity, higher is better
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Chunk returned for a query, with its first-stage and rerank scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub chunk_id: String,
    pub chunk_text: String,
    pub source_filename: String,
    pub page_number: u32,
    
    /// Similarity score from the index
    pub score: f32,
    
    /// Cross-encoder relevance, set by the rerank stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl From<IndexMatch> for RetrievedContext {
    fn from(m: IndexMatch) -> Self {
        Self {
            chunk_id: m.id,
            chunk_text: m.metadata.text,
            source_filename: m.metadata.source,
            page_number: m.metadata.page,
            score: m.score,
            rerank_score: None,
        }
    }
}

/// Full answer to a query, cached verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    
    /// Contexts shown to the model, in final rerank order
    pub sources: Vec<RetrievedContext>,
    
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_chunk_ids_are_unique() {
        let a = Chunk::new("text".into(), "a.txt", 1);
        let b = Chunk::new("text".into(), "a.txt", 1);
        assert_ne!(a.chunk_id, b.chunk_id);
        assert!(Uuid::parse_str(&a.chunk_id).is_ok());
    }
    
    #[test]
    fn test_match_to_context() {
        let m = IndexMatch {
            id: "c1".into(),
            score: 0.9,
            metadata: ChunkMetadata {
                text: "The sky is blue.".into(),
                source: "a.txt".into(),
                page: 1,
            },
        };
        let ctx = RetrievedContext::from(m);
        assert_eq!(ctx.chunk_id, "c1");
        assert_eq!(ctx.source_filename, "a.txt");
        assert_eq!(ctx.page_number, 1);
        assert!(ctx.rerank_score.is_none());
    }
    
    #[test]
    fn test_rerank_score_omitted_when_absent() {
        let ctx = RetrievedContext {
            chunk_id: "c1".into(),
            chunk_text: "t".into(),
            source_filename: "a.txt".into(),
            page_number: 2,
            score: 0.5,
            rerank_score: None,
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert!(json.get("rerank_score").is_none());
        assert_eq!(json["page_number"], 2);
    }
    
    #[test]
    fn test_page_accepts_float_payload() {
        let meta: ChunkMetadata =
            serde_json::from_str(r#"{"text": "t", "source": "a.pdf", "page": 4.0}"#).unwrap();
        assert_eq!(meta.page, 4);
        assert!(serde_json::from_str::<ChunkMetadata>(r#"{"text": "t", "source": "a", "page": 0}"#).is_err());
    }
    
    #[test]
    fn test_metadata_field_names() {
        let chunk = Chunk::new("hello".into(), "doc.pdf", 3);
        let json = serde_json::to_value(chunk.metadata()).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["source"], "doc.pdf");
        assert_eq!(json["page"], 3);
    }
}
