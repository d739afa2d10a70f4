//! The gene panel read model and the factory computing it.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::{
    err::PanelError,
    vocab::{VocabularyManager, VocabularyTerm, ASSOCIATED_GENES, ENSEMBL_GENE_ID, HGNC},
};

use super::{
    adapter::{Patient, PatientDataAdapter},
    terms_for_gene::{TermsForGene, TermsForGeneBuilder},
};

/// Genes ranked by how many of the present terms they explain.
///
/// A panel is immutable once built and can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct GenePanel {
    present_terms: IndexSet<VocabularyTerm>,
    absent_terms: IndexSet<VocabularyTerm>,
    terms_for_gene_list: Vec<TermsForGene>,
}

impl GenePanel {
    pub fn present_terms(&self) -> &IndexSet<VocabularyTerm> {
        &self.present_terms
    }

    /// The absent terms; stored with the panel but not used for ranking.
    pub fn absent_terms(&self) -> &IndexSet<VocabularyTerm> {
        &self.absent_terms
    }

    /// The genes in relevance order.
    pub fn terms_for_gene_list(&self) -> &[TermsForGene] {
        &self.terms_for_gene_list
    }

    /// Number of genes in the panel.
    pub fn size(&self) -> usize {
        self.terms_for_gene_list.len()
    }

    /// JSON document with all rows.
    pub fn to_json(&self) -> serde_json::Value {
        self.rows_json(&self.terms_for_gene_list)
    }

    /// JSON document with the rows in `[from_index, to_index)` only.
    pub fn to_json_range(
        &self,
        from_index: usize,
        to_index: usize,
    ) -> Result<serde_json::Value, PanelError> {
        if to_index > self.size() || from_index > to_index {
            return Err(PanelError::IndexOutOfBounds {
                from: from_index as i64,
                to: to_index as i64,
                size: self.size(),
            });
        }
        Ok(self.rows_json(&self.terms_for_gene_list[from_index..to_index]))
    }

    fn rows_json(&self, rows: &[TermsForGene]) -> serde_json::Value {
        let mut result = serde_json::Map::new();
        result.insert("returnedrows".into(), rows.len().into());
        result.insert(
            "rows".into(),
            rows.iter()
                .map(TermsForGene::to_json)
                .collect::<Vec<_>>()
                .into(),
        );
        result.insert("totalrows".into(), self.size().into());
        serde_json::Value::Object(result)
    }
}

/// Creates gene panels from resolved vocabulary terms.
pub trait GenePanelFactory: Send + Sync {
    /// Build the panel for the given present terms, absent terms and rejected
    /// genes.
    fn build(
        &self,
        present_terms: IndexSet<VocabularyTerm>,
        absent_terms: IndexSet<VocabularyTerm>,
        rejected_genes: IndexSet<VocabularyTerm>,
    ) -> Result<GenePanel, anyhow::Error>;
}

/// Factory that resolves gene identifiers in the HGNC vocabulary.
#[derive(Clone)]
pub struct DefaultGenePanelFactory {
    vocabulary_manager: Arc<dyn VocabularyManager>,
}

impl DefaultGenePanelFactory {
    pub fn new(vocabulary_manager: Arc<dyn VocabularyManager>) -> Self {
        Self { vocabulary_manager }
    }

    /// Build a panel from present term identifiers only.
    ///
    /// Identifiers that cannot be resolved are skipped.
    pub fn build_from_ids<I, S>(&self, present_term_ids: I) -> GenePanel
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let present_terms = present_term_ids
            .into_iter()
            .filter_map(|id| self.vocabulary_manager.resolve_term(id.as_ref()))
            .collect();
        self.make_panel(present_terms, IndexSet::new(), IndexSet::new())
    }

    /// Build a panel from the features of a patient record.
    ///
    /// Rejected genes are excluded only if `with_rejected_genes` is set.
    pub fn build_from_patient(&self, patient: &Patient, with_rejected_genes: bool) -> GenePanel {
        let mut builder = PatientDataAdapter::builder(patient, self.vocabulary_manager.as_ref());
        if with_rejected_genes {
            builder = builder.with_rejected_genes();
        }
        let adapter = builder.build();
        self.make_panel(
            adapter.present_terms().clone(),
            adapter.absent_terms().clone(),
            adapter.rejected_genes().clone(),
        )
    }

    /// Run the aggregation.
    pub fn make_panel(
        &self,
        present_terms: IndexSet<VocabularyTerm>,
        absent_terms: IndexSet<VocabularyTerm>,
        rejected_genes: IndexSet<VocabularyTerm>,
    ) -> GenePanel {
        let mut builder = TermsForGeneBuilder::new(&rejected_genes);
        for term in &present_terms {
            let gene_symbols = term.get_list(ASSOCIATED_GENES);
            for gene_symbol in gene_symbols.iter().filter(|s| !s.trim().is_empty()) {
                let result = if builder.contains(gene_symbol) {
                    builder.update(gene_symbol, term)
                } else {
                    let gene_id = self.gene_id(gene_symbol);
                    builder.add(gene_symbol, &gene_id, term)
                };
                if let Err(e) = result {
                    tracing::warn!("skipping gene {} for term {}: {}", gene_symbol, term.id, e);
                }
            }
        }

        GenePanel {
            present_terms,
            absent_terms,
            terms_for_gene_list: builder.build(),
        }
    }

    /// The preferred identifier for `gene_symbol`, or the symbol itself.
    fn gene_id(&self, gene_symbol: &str) -> String {
        self.vocabulary_manager
            .get_vocabulary(HGNC)
            .and_then(|hgnc| hgnc.get_term(gene_symbol))
            .and_then(|term| {
                term.get_list(ENSEMBL_GENE_ID)
                    .into_iter()
                    .find(|id| !id.trim().is_empty())
            })
            .unwrap_or_else(|| gene_symbol.to_string())
    }
}

impl GenePanelFactory for DefaultGenePanelFactory {
    fn build(
        &self,
        present_terms: IndexSet<VocabularyTerm>,
        absent_terms: IndexSet<VocabularyTerm>,
        rejected_genes: IndexSet<VocabularyTerm>,
    ) -> Result<GenePanel, anyhow::Error> {
        Ok(self.make_panel(present_terms, absent_terms, rejected_genes))
    }
}
