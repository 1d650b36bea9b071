// src/retrieval/dense_index.rs
// Dense similarity index over Qdrant (§4.B) — one collection per named
// corpus, L2-normalized embeddings scored by cosine similarity (equivalent
// to inner product over normalized vectors). Grounded on the teacher's
// memory/storage/qdrant collection-management and search code.

use anyhow::{Context, Result};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    Vectors,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;

pub struct DenseCandidate {
    pub id: String,
    pub score: f32,
}

pub struct DenseIndex {
    client: Qdrant,
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector.to_vec()
    } else {
        vector.iter().map(|v| v / norm).collect()
    }
}

impl DenseIndex {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .context("failed to build qdrant client")?;
        Ok(Self { client })
    }

    pub async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()> {
        let exists = self.client.collection_exists(name).await.unwrap_or(false);
        if exists {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
            )
            .await
            .context("failed to create qdrant collection")?;
        Ok(())
    }

    pub async fn upsert(
        &self,
        collection: &str,
        id: &str,
        embedding: Vec<f32>,
        content: &str,
        metadata_json: &str,
    ) -> Result<()> {
        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert("doc_id".to_string(), id.into());
        payload.insert("content".to_string(), content.into());
        payload.insert("metadata".to_string(), metadata_json.into());

        let point = PointStruct {
            id: Some(id.to_string().into()),
            vectors: Some(Vectors::from(normalize(&embedding))),
            payload,
            ..Default::default()
        };

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .context("failed to upsert qdrant point")?;
        Ok(())
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(vec![id.to_string()]))
            .await
            .context("failed to delete qdrant point")?;
        Ok(())
    }

    pub async fn search(
        &self,
        collection: &str,
        query_embedding: Vec<f32>,
        limit: usize,
        filter_field: Option<(&str, &str)>,
    ) -> Result<Vec<DenseCandidate>> {
        let mut builder = SearchPointsBuilder::new(collection, normalize(&query_embedding), limit as u64)
            .with_payload(true);

        if let Some((field, value)) = filter_field {
            builder = builder.filter(Filter::must([Condition::matches(field, value.to_string())]));
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .context("qdrant search failed")?;

        Ok(response
            .result
            .into_iter()
            .filter_map(Self::candidate_from_point)
            .collect())
    }

    fn candidate_from_point(point: ScoredPoint) -> Option<DenseCandidate> {
        let id = point
            .payload
            .get("doc_id")
            .and_then(|v| v.as_str().map(|s| s.to_string()))?;
        Some(DenseCandidate { id, score: point.score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        let len = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn normalize_zero_vector_is_unchanged() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
