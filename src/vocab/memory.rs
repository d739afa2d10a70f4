//! In-memory vocabularies loaded from the HPO and HGNC flat files.

use std::{collections::HashMap, path::Path, sync::Arc, time::Instant};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::common::io::open_read_maybe_gz;

use super::{
    Vocabulary, VocabularyManager, VocabularyTerm, ALIAS_SYMBOL, ASSOCIATED_GENES,
    ENSEMBL_GENE_ID, HGNC, HPO, PREV_SYMBOL, SYMBOL,
};

/// A vocabulary that keeps all of its terms in memory.
///
/// Besides the primary identifier, terms can be found by their `symbol`
/// property and, with lower priority, by `alias_symbol`/`prev_symbol`.
#[derive(Debug, Default)]
pub struct MemoryVocabulary {
    identifier: String,
    terms: HashMap<String, VocabularyTerm>,
    symbols: HashMap<String, String>,
    aliases: HashMap<String, String>,
}

impl MemoryVocabulary {
    /// Construct from a list of terms; later duplicates of an identifier win.
    pub fn from_terms<I>(identifier: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = VocabularyTerm>,
    {
        let mut result = Self {
            identifier: identifier.to_string(),
            ..Default::default()
        };
        for term in terms {
            result.insert(term);
        }
        result
    }

    fn insert(&mut self, term: VocabularyTerm) {
        for symbol in term.get_list(SYMBOL) {
            self.symbols.insert(symbol, term.id.clone());
        }
        for alias in term
            .get_list(ALIAS_SYMBOL)
            .into_iter()
            .chain(term.get_list(PREV_SYMBOL))
        {
            self.aliases.entry(alias).or_insert_with(|| term.id.clone());
        }
        self.terms.insert(term.id.clone(), term);
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Load the HPO vocabulary from a `phenotype_to_genes.txt` file.
    pub fn load_hpo<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        info!("Loading HPO terms from {:?}...", path.as_ref());
        let before_loading = Instant::now();

        let mut names: IndexMap<String, Option<String>> = IndexMap::new();
        let mut genes: HashMap<String, IndexSet<String>> = HashMap::new();
        let mut reader = tsv_reader(open_read_maybe_gz(path.as_ref())?);
        for (lineno, record) in reader.deserialize::<PhenotypeToGenesRecord>().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping malformed HPO row {}: {}", lineno + 1, e);
                    continue;
                }
            };
            let hpo_id = record.hpo_id.trim();
            if hpo_id.is_empty() {
                warn!("skipping HPO row {} without identifier", lineno + 1);
                continue;
            }
            names
                .entry(hpo_id.to_string())
                .or_insert_with(|| record.hpo_name.filter(|n| !n.trim().is_empty()));
            let entry = genes.entry(hpo_id.to_string()).or_default();
            if let Some(symbol) = record.gene_symbol.filter(|s| !s.trim().is_empty()) {
                entry.insert(symbol.trim().to_string());
            }
        }

        let result = Self::from_terms(
            HPO,
            names.into_iter().map(|(id, name)| {
                let associated = genes.remove(&id).unwrap_or_default();
                VocabularyTerm::new(id, name).with_list(ASSOCIATED_GENES, associated)
            }),
        );
        info!(
            "...done loading {} HPO terms in {:?}",
            result.len(),
            before_loading.elapsed()
        );
        Ok(result)
    }

    /// Load the HGNC vocabulary from a `hgnc_complete_set.txt` file.
    pub fn load_hgnc<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        info!("Loading HGNC genes from {:?}...", path.as_ref());
        let before_loading = Instant::now();

        let mut terms = Vec::new();
        let mut reader = tsv_reader(open_read_maybe_gz(path.as_ref())?);
        for (lineno, record) in reader.deserialize::<HgncRecord>().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping malformed HGNC row {}: {}", lineno + 1, e);
                    continue;
                }
            };
            if record.hgnc_id.trim().is_empty() {
                warn!("skipping HGNC row {} without identifier", lineno + 1);
                continue;
            }
            terms.push(record.into_term());
        }

        let result = Self::from_terms(HGNC, terms);
        info!(
            "...done loading {} HGNC genes in {:?}",
            result.len(),
            before_loading.elapsed()
        );
        Ok(result)
    }
}

impl Vocabulary for MemoryVocabulary {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn get_term(&self, id: &str) -> Option<VocabularyTerm> {
        let id = id.trim();
        let key = if self.terms.contains_key(id) {
            id
        } else if let Some(key) = self.symbols.get(id) {
            key.as_str()
        } else {
            self.aliases.get(id)?.as_str()
        };
        self.terms.get(key).cloned()
    }
}

/// Create a tab-separated reader that skips `#` comment lines.
fn tsv_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader)
}

/// One row of `phenotype_to_genes.txt`.
#[derive(Deserialize, Debug)]
struct PhenotypeToGenesRecord {
    hpo_id: String,
    #[serde(default)]
    hpo_name: Option<String>,
    #[serde(default)]
    gene_symbol: Option<String>,
}

/// One row of `hgnc_complete_set.txt`; only the used columns.
#[derive(Deserialize, Debug)]
struct HgncRecord {
    hgnc_id: String,
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    alias_symbol: Option<String>,
    #[serde(default)]
    prev_symbol: Option<String>,
    #[serde(default)]
    ensembl_gene_id: Option<String>,
}

impl HgncRecord {
    fn into_term(self) -> VocabularyTerm {
        let split = |value: Option<String>| -> Vec<String> {
            value
                .unwrap_or_default()
                .split('|')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        VocabularyTerm::new(
            self.hgnc_id.trim(),
            self.name.filter(|n| !n.trim().is_empty()),
        )
        .with_list(SYMBOL, [self.symbol.trim().to_string()])
        .with_list(ALIAS_SYMBOL, split(self.alias_symbol))
        .with_list(PREV_SYMBOL, split(self.prev_symbol))
        .with_list(ENSEMBL_GENE_ID, split(self.ensembl_gene_id))
    }
}

/// A `VocabularyManager` over a fixed set of vocabularies.
#[derive(Default)]
pub struct MemoryVocabularyManager {
    vocabularies: IndexMap<String, Arc<dyn Vocabulary>>,
}

impl MemoryVocabularyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vocabulary under its identifier, replacing any previous one.
    pub fn with_vocabulary(mut self, vocabulary: Arc<dyn Vocabulary>) -> Self {
        debug!("registering vocabulary {:?}", vocabulary.identifier());
        self.vocabularies
            .insert(vocabulary.identifier().to_string(), vocabulary);
        self
    }

    /// Load HPO and HGNC from the given files.
    pub fn load<P, Q>(path_hpo: P, path_hgnc: Q) -> Result<Self, anyhow::Error>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let hpo = MemoryVocabulary::load_hpo(path_hpo)?;
        let hgnc = MemoryVocabulary::load_hgnc(path_hgnc)?;
        Ok(Self::new()
            .with_vocabulary(Arc::new(hpo))
            .with_vocabulary(Arc::new(hgnc)))
    }
}

impl VocabularyManager for MemoryVocabularyManager {
    fn get_vocabulary(&self, name: &str) -> Option<Arc<dyn Vocabulary>> {
        self.vocabularies.get(name).cloned()
    }

    fn vocabulary_names(&self) -> Vec<String> {
        self.vocabularies.keys().cloned().collect()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::{MemoryVocabulary, MemoryVocabularyManager};
    use crate::vocab::{Vocabulary, VocabularyManager, VocabularyTerm, HGNC, HPO};

    pub const PATH_HPO: &str = "tests/data/vocab/phenotype_to_genes.txt";
    pub const PATH_HGNC: &str = "tests/data/vocab/hgnc_complete_set.txt";

    /// Manager over the small test vocabularies in `tests/data/vocab`.
    pub fn test_manager() -> MemoryVocabularyManager {
        MemoryVocabularyManager::load(PATH_HPO, PATH_HGNC).expect("test vocabularies must load")
    }

    #[test]
    fn load_hpo() -> Result<(), anyhow::Error> {
        let hpo = MemoryVocabulary::load_hpo(PATH_HPO)?;
        assert_eq!(hpo.identifier(), HPO);
        assert_eq!(hpo.len(), 4);

        let term = hpo.get_term("HP:0001250").expect("term must exist");
        assert_eq!(term.name.as_deref(), Some("Seizure"));
        assert_eq!(
            term.get_list("associated_genes"),
            vec!["SCN1A".to_string(), "KCNQ2".to_string()]
        );

        let term = hpo.get_term("HP:0000118").expect("term must exist");
        assert!(term.get_list("associated_genes").is_empty());

        Ok(())
    }

    #[test]
    fn load_hgnc_lookups() -> Result<(), anyhow::Error> {
        let hgnc = MemoryVocabulary::load_hgnc(PATH_HGNC)?;
        assert_eq!(hgnc.identifier(), HGNC);
        assert_eq!(hgnc.len(), 4);

        let by_id = hgnc.get_term("HGNC:10585").expect("by id");
        let by_symbol = hgnc.get_term("SCN1A").expect("by symbol");
        let by_alias = hgnc.get_term("Nav1.1").expect("by alias");
        assert_eq!(by_id, by_symbol);
        assert_eq!(by_id, by_alias);
        assert_eq!(
            by_id.get_list("ensembl_gene_id"),
            vec!["ENSG00000144285".to_string()]
        );
        assert!(hgnc.get_term("NOPE").is_none());

        Ok(())
    }

    #[test]
    fn symbols_win_over_aliases() {
        let vocabulary = MemoryVocabulary::from_terms(
            HGNC,
            [
                VocabularyTerm::new("HGNC:1", None)
                    .with_list("symbol", ["AAA"])
                    .with_list("alias_symbol", ["BBB"]),
                VocabularyTerm::new("HGNC:2", None).with_list("symbol", ["BBB"]),
            ],
        );
        assert_eq!(vocabulary.get_term("BBB").map(|t| t.id), Some("HGNC:2".into()));
    }

    #[rstest::rstest]
    #[case("HP:0001250", Some("HP:0001250"))]
    #[case("HGNC:10585", Some("HGNC:10585"))]
    #[case("SCN1A", Some("HGNC:10585"))]
    #[case("HP:9999999", None)]
    #[case("  ", None)]
    fn resolve_term(#[case] id: &str, #[case] expected: Option<&str>) {
        let manager = test_manager();
        assert_eq!(
            manager.resolve_term(id).map(|t| t.id),
            expected.map(str::to_string)
        );
    }

    #[test]
    fn manager_vocabularies() {
        let manager = MemoryVocabularyManager::new()
            .with_vocabulary(Arc::new(MemoryVocabulary::from_terms(HPO, Vec::<VocabularyTerm>::new())));
        assert_eq!(manager.vocabulary_names(), vec![HPO.to_string()]);
        assert!(manager.get_vocabulary(HPO).is_some());
        assert!(manager.get_vocabulary(HGNC).is_none());
    }
}
