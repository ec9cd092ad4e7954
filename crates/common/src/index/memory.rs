//! In-process brute-force cosine index

use super::{IndexFilter, IndexPoint, ScoredPayload, VectorIndex};
use crate::errors::{AppError, Result};
use crate::models::ChunkPayload;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Vector index kept in memory, ordered by point id
#[derive(Default)]
pub struct InMemoryIndex {
    points: RwLock<BTreeMap<u64, IndexPoint>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn poisoned() -> AppError {
    AppError::Internal {
        message: "in-memory index lock poisoned".to_string(),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        let mut guard = self.points.write().map_err(|_| poisoned())?;
        for point in points {
            guard.insert(point.id, point);
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut guard = self.points.write().map_err(|_| poisoned())?;
        guard.retain(|_, p| p.payload.document_id != document_id);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &IndexFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPayload>> {
        let guard = self.points.read().map_err(|_| poisoned())?;

        let mut hits: Vec<ScoredPayload> = guard
            .values()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| ScoredPayload {
                score: cosine(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scan(&self, filter: &IndexFilter, limit: usize) -> Result<Vec<ChunkPayload>> {
        let guard = self.points.read().map_err(|_| poisoned())?;
        Ok(guard
            .values()
            .filter(|p| filter.matches(&p.payload))
            .take(limit)
            .map(|p| p.payload.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
