//! Cross-document identifier resolution

use super::RetrievalClient;
use crate::errors::Result;
use crate::models::{Citation, ComponentId, CrossReferenceMap, DocumentType};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of resolving a set of identifiers
#[derive(Debug, Clone, Default)]
pub struct CrossReferenceResolution {
    /// Every hit, per identifier and document type
    pub map: CrossReferenceMap,
    /// Capped selection to append to the evidence pool
    pub evidence: Vec<Citation>,
}

/// Finds one component across the document-type partitions of the corpus
pub struct CrossReferenceResolver {
    retrieval: Arc<RetrievalClient>,
    lookup_limit: usize,
}

impl CrossReferenceResolver {
    pub fn new(retrieval: Arc<RetrievalClient>, lookup_limit: usize) -> Self {
        Self {
            retrieval,
            lookup_limit,
        }
    }

    /// Exact lookup of one identifier, grouped by document type
    pub async fn resolve(
        &self,
        component_id: &ComponentId,
    ) -> Result<BTreeMap<DocumentType, Vec<Citation>>> {
        let citations = self
            .retrieval
            .lookup_by_component(component_id, self.lookup_limit)
            .await?;
        Ok(partition(citations))
    }

    /// Resolve every identifier. Identifiers without hits are left out of
    /// the map; at most `per_type_cap` citations per type and identifier
    /// make it into the evidence.
    #[instrument(skip(self, component_ids), fields(components = component_ids.len()))]
    pub async fn resolve_all(
        &self,
        component_ids: &BTreeSet<ComponentId>,
        per_type_cap: usize,
    ) -> Result<CrossReferenceResolution> {
        let mut resolution = CrossReferenceResolution::default();

        for component_id in component_ids {
            let by_type = self.resolve(component_id).await?;
            if by_type.is_empty() {
                continue;
            }

            for citations in by_type.values() {
                resolution
                    .evidence
                    .extend(citations.iter().take(per_type_cap).cloned());
            }

            debug!(
                component = %component_id,
                document_types = by_type.len(),
                "Component cross-referenced"
            );
            resolution.map.insert(component_id.clone(), by_type);
        }

        Ok(resolution)
    }
}

/// Group citations by document type, keeping relative order inside each group
pub fn partition(citations: Vec<Citation>) -> BTreeMap<DocumentType, Vec<Citation>> {
    let mut by_type: BTreeMap<DocumentType, Vec<Citation>> = BTreeMap::new();
    for citation in citations {
        by_type
            .entry(citation.document_type.clone())
            .or_default()
            .push(citation);
    }
    by_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, Page};

    fn citation(doc_type: &str, page: u32) -> Citation {
        Citation {
            document_id: "d".to_string(),
            filename: "d.pdf".to_string(),
            page_number: page,
            document_type: DocumentType::new(doc_type).unwrap(),
            relevance_score: 1.0,
            snippet: None,
        }
    }

    #[test]
    fn test_partition_preserves_order() {
        let grouped = partition(vec![
            citation("layout", 7),
            citation("schematic", 1),
            citation("layout", 3),
        ]);
        assert_eq!(grouped.len(), 2);
        let pages: Vec<u32> = grouped[&DocumentType::new("layout").unwrap()]
            .iter()
            .map(|c| c.page_number)
            .collect();
        assert_eq!(pages, vec![7, 3]);
    }

    #[tokio::test]
    async fn test_resolve_all_caps_per_type() {
        let fx = fixture(&[
            Page::new("a", "schematic.pdf", 1, "electrical_schematic", "K102 coil"),
            Page::new("a", "schematic.pdf", 2, "electrical_schematic", "K102 contacts"),
            Page::new("a", "schematic.pdf", 3, "electrical_schematic", "K102 supply"),
            Page::new("b", "layout.pdf", 1, "media_layout", "Cabinet with K102"),
        ])
        .await;

        let resolver = CrossReferenceResolver::new(fx.retrieval.clone(), 50);
        let ids: BTreeSet<ComponentId> = [ComponentId::from_indexed("K102"), ComponentId::from_indexed("Z999")]
            .into_iter()
            .collect();

        let resolution = resolver.resolve_all(&ids, 2).await.unwrap();

        assert_eq!(resolution.map.len(), 1);
        let by_type = &resolution.map[&ComponentId::from_indexed("K102")];
        assert_eq!(by_type.len(), 2);
        assert_eq!(by_type[&DocumentType::new("electrical_schematic").unwrap()].len(), 3);
        assert_eq!(resolution.evidence.len(), 3);
    }
}
