//! Per-term gene counts.

use std::cmp::Ordering;

use indexmap::IndexSet;

use crate::vocab::{VocabularyTerm, ASSOCIATED_GENES};

use super::terms_for_gene::gene_exclusions;

/// One present term with the genes it is associated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCount {
    term: VocabularyTerm,
    genes: IndexSet<String>,
}

impl MatchCount {
    /// Gene symbols are trimmed; blank and duplicate ones are dropped.
    pub fn new<I, S>(term: VocabularyTerm, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let genes = genes
            .into_iter()
            .map(|gene| gene.as_ref().trim().to_string())
            .filter(|gene| !gene.is_empty())
            .collect();
        Self { term, genes }
    }

    pub fn term(&self) -> &VocabularyTerm {
        &self.term
    }

    pub fn genes(&self) -> &IndexSet<String> {
        &self.genes
    }

    /// Number of distinct genes.
    pub fn count(&self) -> usize {
        self.genes.len()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "count": self.count(),
            "genes": self.genes.iter().collect::<Vec<_>>(),
            "id": self.term.id,
            "name": self.term.display_name(),
        })
    }
}

impl Ord for MatchCount {
    /// Most genes first, then by display name.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .count()
            .cmp(&self.count())
            .then_with(|| self.term.display_name().cmp(other.term.display_name()))
            .then_with(|| self.term.id.cmp(&other.term.id))
    }
}

impl PartialOrd for MatchCount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Collects match counts; each term is expected to be added once.
#[derive(Debug, Default)]
pub struct MatchCountBuilder {
    match_counts: Vec<MatchCount>,
}

impl MatchCountBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I, S>(&mut self, term: VocabularyTerm, genes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.match_counts.push(MatchCount::new(term, genes));
    }

    /// The match counts in ranking order.
    pub fn build(self) -> Vec<MatchCount> {
        let mut result = self.match_counts;
        result.sort();
        result
    }
}

/// One match count per present term with at least one non-rejected gene.
pub fn build_match_counts<'a, P, R>(present_terms: P, rejected_genes: R) -> Vec<MatchCount>
where
    P: IntoIterator<Item = &'a VocabularyTerm>,
    R: IntoIterator<Item = &'a VocabularyTerm>,
{
    let exclusions = gene_exclusions(rejected_genes);
    let mut builder = MatchCountBuilder::new();
    for term in present_terms {
        let genes = term
            .get_list(ASSOCIATED_GENES)
            .into_iter()
            .filter(|gene| !exclusions.contains(gene))
            .collect::<Vec<_>>();
        if genes.iter().any(|gene| !gene.trim().is_empty()) {
            builder.add(term.clone(), genes);
        }
    }
    builder.build()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{build_match_counts, MatchCount, MatchCountBuilder};
    use crate::vocab::VocabularyTerm;

    fn term(id: &str, name: Option<&str>) -> VocabularyTerm {
        VocabularyTerm::new(id, name.map(str::to_string))
    }

    #[test]
    fn genes_deduplicated_and_filtered() {
        let match_count = MatchCount::new(term("HP:1", Some("a")), ["G1", "", "G2", "G1", "  "]);

        assert_eq!(match_count.count(), 2);
        assert_eq!(
            match_count.genes().iter().collect::<Vec<_>>(),
            vec!["G1", "G2"]
        );
    }

    #[test]
    fn genes_deduplicated_after_trimming() {
        let match_count = MatchCount::new(term("HP:1", Some("a")), ["G1", " G1", "G1 ", " G2 "]);

        assert_eq!(match_count.count(), 2);
        assert_eq!(
            match_count.genes().iter().collect::<Vec<_>>(),
            vec!["G1", "G2"]
        );
    }

    #[test]
    fn builder_orders_by_count_then_name() {
        let mut builder = MatchCountBuilder::new();
        builder.add(term("HP:3", Some("c")), ["G1"]);
        builder.add(term("HP:1", Some("b")), ["G1", "G2"]);
        builder.add(term("HP:2", None), ["G3"]);
        builder.add(term("HP:4", Some("a")), ["G4"]);

        let result = builder.build();

        assert_eq!(
            result.iter().map(|m| m.term().id.as_str()).collect::<Vec<_>>(),
            vec!["HP:1", "HP:2", "HP:4", "HP:3"]
        );
    }

    #[test]
    fn build_match_counts_excludes_rejected() {
        let present = vec![
            term("HP:001", Some("Term one")).with_list("associated_genes", ["GENE_A", "GENE_B"]),
            term("HP:002", Some("Term two")).with_list("associated_genes", ["GENE_B"]),
            term("HP:003", Some("Term three")),
        ];
        let rejected = vec![term("HGNC:2", None).with_list("symbol", ["GENE_B"])];

        let result = build_match_counts(&present, &rejected);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].term().id, "HP:001");
        assert_eq!(result[0].count(), 1);
    }

    #[test]
    fn to_json() {
        let match_count = MatchCount::new(term("HP:001", None), ["GENE_A", "GENE_B"]);

        insta::assert_json_snapshot!(match_count.to_json(), @r###"
        {
          "count": 2,
          "genes": [
            "GENE_A",
            "GENE_B"
          ],
          "id": "HP:001",
          "name": "HP:001"
        }
        "###);
    }
}
