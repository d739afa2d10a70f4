//! Per-gene aggregation of matching phenotype terms.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use crate::{
    err::PanelError,
    vocab::{VocabularyTerm, ALIAS_SYMBOL, ENSEMBL_GENE_ID, SYMBOL},
};

/// The present terms that are associated with one gene.
///
/// Terms are kept ordered by display name, then identifier.  A term is
/// stored at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermsForGene {
    gene_symbol: String,
    gene_id: String,
    terms: Vec<VocabularyTerm>,
}

impl TermsForGene {
    /// Create a new record for `gene_symbol`, seeded with `term`.
    pub fn new(gene_symbol: &str, gene_id: &str, term: &VocabularyTerm) -> Result<Self, PanelError> {
        check_not_blank(gene_symbol, "gene symbol")?;
        check_not_blank(gene_id, "gene id")?;
        Ok(Self {
            gene_symbol: gene_symbol.to_string(),
            gene_id: gene_id.to_string(),
            terms: vec![term.clone()],
        })
    }

    /// Add a term; returns `false` if it was already stored.
    fn add_term(&mut self, term: &VocabularyTerm) -> bool {
        if self.terms.iter().any(|t| t.id == term.id) {
            return false;
        }
        let pos = self
            .terms
            .partition_point(|t| term_order(t, term) == Ordering::Less);
        self.terms.insert(pos, term.clone());
        true
    }

    pub fn gene_symbol(&self) -> &str {
        &self.gene_symbol
    }

    /// The preferred gene identifier, or the symbol if none is known.
    pub fn gene_id(&self) -> &str {
        &self.gene_id
    }

    /// The matching terms, ordered by display name.
    pub fn terms(&self) -> &[VocabularyTerm] {
        &self.terms
    }

    /// Number of matching terms.
    pub fn count(&self) -> usize {
        self.terms.len()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "count": self.count(),
            "gene_id": self.gene_id,
            "gene_symbol": self.gene_symbol,
            "terms": self.terms.iter().map(VocabularyTerm::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Order in which terms are kept within one `TermsForGene`.
fn term_order(lhs: &VocabularyTerm, rhs: &VocabularyTerm) -> Ordering {
    lhs.display_name()
        .cmp(rhs.display_name())
        .then_with(|| lhs.id.cmp(&rhs.id))
}

/// Relevance order of genes in a panel.
///
/// More matching terms rank first.  Equal counts are broken by comparing the
/// term display names pairwise, then by gene symbol.
pub fn compare_by_relevance(lhs: &TermsForGene, rhs: &TermsForGene) -> Ordering {
    rhs.count()
        .cmp(&lhs.count())
        .then_with(|| compare_term_lists(&lhs.terms, &rhs.terms))
        .then_with(|| lhs.gene_symbol.cmp(&rhs.gene_symbol))
}

/// Compare two term lists element by element; a common prefix compares equal.
fn compare_term_lists(lhs: &[VocabularyTerm], rhs: &[VocabularyTerm]) -> Ordering {
    lhs.iter()
        .zip(rhs.iter())
        .map(|(l, r)| l.display_name().cmp(r.display_name()))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn check_not_blank(value: &str, what: &str) -> Result<(), PanelError> {
    if value.trim().is_empty() {
        Err(PanelError::invalid_argument(format!("{} must not be blank", what)))
    } else {
        Ok(())
    }
}

/// Collect all names under which the given rejected genes may appear.
///
/// This is the term identifier plus its `symbol`, `ensembl_gene_id`, and
/// `alias_symbol` values.
pub fn gene_exclusions<'a, I>(rejected_genes: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a VocabularyTerm>,
{
    rejected_genes
        .into_iter()
        .flat_map(|gene| {
            std::iter::once(gene.id.clone())
                .chain(gene.get_list(SYMBOL))
                .chain(gene.get_list(ENSEMBL_GENE_ID))
                .chain(gene.get_list(ALIAS_SYMBOL))
        })
        .filter(|name| !name.trim().is_empty())
        .collect()
}

/// Accumulates `TermsForGene` records, skipping rejected genes.
///
/// Gene symbols are compared case-sensitively.
#[derive(Debug, Default)]
pub struct TermsForGeneBuilder {
    exclusions: HashSet<String>,
    terms_for_genes: HashMap<String, TermsForGene>,
}

impl TermsForGeneBuilder {
    /// Construct with the genes that must never be added.
    pub fn new<'a, I>(rejected_genes: I) -> Self
    where
        I: IntoIterator<Item = &'a VocabularyTerm>,
    {
        Self {
            exclusions: gene_exclusions(rejected_genes),
            terms_for_genes: HashMap::new(),
        }
    }

    /// Whether a record for `gene_symbol` has been stored.
    pub fn contains(&self, gene_symbol: &str) -> bool {
        !gene_symbol.trim().is_empty() && self.terms_for_genes.contains_key(gene_symbol)
    }

    /// Store a new record for `gene_symbol` seeded with `term`.
    ///
    /// Replaces any previous record for the same symbol.  Nothing happens if
    /// the symbol or the identifier belongs to a rejected gene.
    pub fn add(
        &mut self,
        gene_symbol: &str,
        gene_id: &str,
        term: &VocabularyTerm,
    ) -> Result<(), PanelError> {
        let terms_for_gene = TermsForGene::new(gene_symbol, gene_id, term)?;
        if self.exclusions.contains(gene_symbol) || self.exclusions.contains(gene_id) {
            tracing::trace!("skipping rejected gene {} ({})", gene_symbol, gene_id);
            return Ok(());
        }
        self.terms_for_genes
            .insert(gene_symbol.to_string(), terms_for_gene);
        Ok(())
    }

    /// Add `term` to the record stored for `gene_symbol`.
    ///
    /// Fails with `PanelError::UnknownGene` if `contains(gene_symbol)` is false.
    pub fn update(&mut self, gene_symbol: &str, term: &VocabularyTerm) -> Result<(), PanelError> {
        check_not_blank(gene_symbol, "gene symbol")?;
        let terms_for_gene = self
            .terms_for_genes
            .get_mut(gene_symbol)
            .ok_or_else(|| PanelError::UnknownGene(gene_symbol.to_string()))?;
        terms_for_gene.add_term(term);
        Ok(())
    }

    /// Finish aggregation and return the records in relevance order.
    pub fn build(self) -> Vec<TermsForGene> {
        let mut result = self.terms_for_genes.into_values().collect::<Vec<_>>();
        result.sort_by(compare_by_relevance);
        result
    }
}
