//! Caching of computed gene panels.

use std::{collections::BTreeSet, sync::Arc, time::Instant};

use dashmap::DashMap;
use indexmap::IndexSet;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::{
    err::LoadError,
    vocab::{VocabularyManager, VocabularyTerm, HGNC},
};

use super::panel::{GenePanel, GenePanelFactory};

/// Cache key: the identifiers a panel is computed from.
///
/// Each part is a set, so the order in which identifiers are given does not
/// matter.  Blank identifiers are dropped.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelData {
    #[serde(default)]
    present_terms: BTreeSet<String>,
    #[serde(default)]
    absent_terms: BTreeSet<String>,
    #[serde(default)]
    rejected_genes: BTreeSet<String>,
}

fn normalize<I, S>(ids: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

impl PanelData {
    pub fn new<P, A, R, S1, S2, S3>(present_terms: P, absent_terms: A, rejected_genes: R) -> Self
    where
        P: IntoIterator<Item = S1>,
        A: IntoIterator<Item = S2>,
        R: IntoIterator<Item = S3>,
        S1: AsRef<str>,
        S2: AsRef<str>,
        S3: AsRef<str>,
    {
        Self {
            present_terms: normalize(present_terms),
            absent_terms: normalize(absent_terms),
            rejected_genes: normalize(rejected_genes),
        }
    }

    pub fn present_terms(&self) -> &BTreeSet<String> {
        &self.present_terms
    }

    pub fn absent_terms(&self) -> &BTreeSet<String> {
        &self.absent_terms
    }

    pub fn rejected_genes(&self) -> &BTreeSet<String> {
        &self.rejected_genes
    }

    /// Whether neither present nor absent terms were given.
    pub fn has_no_terms(&self) -> bool {
        self.present_terms.is_empty() && self.absent_terms.is_empty()
    }

    /// Resolve the identifiers into present terms, absent terms and rejected
    /// genes.
    ///
    /// Terms are resolved in any vocabulary, genes in HGNC only.  Identifiers
    /// that do not resolve are skipped.
    pub fn resolve(&self, vocabulary_manager: &dyn VocabularyManager) -> ResolvedPanelData {
        let resolve = |ids: &BTreeSet<String>| -> IndexSet<VocabularyTerm> {
            ids.iter()
                .filter_map(|id| vocabulary_manager.resolve_term(id))
                .collect()
        };
        let rejected_genes = match vocabulary_manager.get_vocabulary(HGNC) {
            Some(hgnc) => self
                .rejected_genes
                .iter()
                .filter_map(|id| hgnc.get_term(id))
                .collect(),
            None => IndexSet::new(),
        };
        ResolvedPanelData {
            present_terms: resolve(&self.present_terms),
            absent_terms: resolve(&self.absent_terms),
            rejected_genes,
        }
    }
}

/// The vocabulary terms behind a `PanelData`.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPanelData {
    pub present_terms: IndexSet<VocabularyTerm>,
    pub absent_terms: IndexSet<VocabularyTerm>,
    pub rejected_genes: IndexSet<VocabularyTerm>,
}

impl From<Vec<String>> for PanelData {
    fn from(present_terms: Vec<String>) -> Self {
        Self::new(present_terms, Vec::<String>::new(), Vec::<String>::new())
    }
}

impl From<Vec<&str>> for PanelData {
    fn from(present_terms: Vec<&str>) -> Self {
        Self::new(present_terms, Vec::<String>::new(), Vec::<String>::new())
    }
}

type Cell = Arc<OnceCell<Arc<GenePanel>>>;

/// Computes gene panels on demand and keeps them until invalidated.
///
/// Concurrent requests for the same key wait for a single computation.
pub struct GenePanelLoader {
    factory: Arc<dyn GenePanelFactory>,
    vocabulary_manager: Arc<dyn VocabularyManager>,
    cache: DashMap<PanelData, Cell>,
}

impl GenePanelLoader {
    pub fn new(
        factory: Arc<dyn GenePanelFactory>,
        vocabulary_manager: Arc<dyn VocabularyManager>,
    ) -> Self {
        Self {
            factory,
            vocabulary_manager,
            cache: DashMap::new(),
        }
    }

    /// Return the cached panel for `key`, computing it if necessary.
    ///
    /// Failed computations are not cached.
    pub fn get(&self, key: &PanelData) -> Result<Arc<GenePanel>, LoadError> {
        let cell: Cell = self
            .cache
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        match cell.get_or_try_init(|| self.compute(key)) {
            Ok(panel) => Ok(panel.clone()),
            Err(e) => {
                self.cache
                    .remove_if(key, |_, cached| Arc::ptr_eq(cached, &cell));
                Err(e)
            }
        }
    }

    fn compute(&self, key: &PanelData) -> Result<Arc<GenePanel>, LoadError> {
        let before = Instant::now();
        tracing::debug!("computing gene panel for {:?}", key);

        let resolved = key.resolve(self.vocabulary_manager.as_ref());
        let panel = self.factory.build(
            resolved.present_terms,
            resolved.absent_terms,
            resolved.rejected_genes,
        )?;
        tracing::debug!(
            "... done computing gene panel with {} genes in {:?}",
            panel.size(),
            before.elapsed()
        );

        if panel.size() == 0 {
            Err(LoadError::Empty)
        } else {
            Ok(Arc::new(panel))
        }
    }

    /// Drop the cached panel for `key`, if any.
    pub fn invalidate(&self, key: impl Into<PanelData>) {
        let key: PanelData = key.into();
        self.cache.remove(&key);
    }

    /// Drop all cached panels.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Number of cached panels.
    pub fn size(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }
}
