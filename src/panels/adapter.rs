//! Translation of patient records into vocabulary terms.

use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::vocab::{VocabularyManager, VocabularyTerm, HGNC};

/// Known values of a patient gene's status.
#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Debug,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GeneStatus {
    Candidate,
    RejectedCandidate,
    Rejected,
    Solved,
    CarrierCandidate,
}

impl GeneStatus {
    pub fn is_rejected(self) -> bool {
        matches!(self, GeneStatus::Rejected | GeneStatus::RejectedCandidate)
    }
}

/// A phenotypic feature of a patient.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// The term identifier, e.g., `HP:0001250`.
    pub id: String,
    /// `"yes"` or `"no"`.
    #[serde(default = "default_observed")]
    pub observed: String,
}

fn default_observed() -> String {
    "yes".to_string()
}

impl Feature {
    /// Whether the feature was observed in the patient.
    pub fn is_present(&self) -> bool {
        self.observed != "no"
    }
}

/// A gene annotated on the patient record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    /// Gene symbol or identifier.
    pub id: String,
    /// Annotation status, e.g., `"candidate"` or `"rejected"`.
    #[serde(default)]
    pub status: Option<String>,
}

impl Gene {
    /// Whether the status is `rejected` or `rejected_candidate`.
    ///
    /// Unknown status values count as not rejected.
    pub fn is_rejected(&self) -> bool {
        self.status
            .as_deref()
            .and_then(|status| GeneStatus::from_str(status.trim()).ok())
            .map(GeneStatus::is_rejected)
            .unwrap_or(false)
    }
}

/// The parts of a patient record that are relevant for gene panels.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Patient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Qualifier name to term identifiers, e.g., age of onset.
    #[serde(default)]
    pub global_qualifiers: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub genes: Vec<Gene>,
}

impl Patient {
    /// Load a patient record from a JSON file, which may be gzip-compressed.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, anyhow::Error> {
        let reader = crate::common::io::open_read_maybe_gz(path.as_ref())?;
        serde_json::from_reader(reader).map_err(|e| {
            anyhow::anyhow!("could not parse patient JSON {:?}: {}", path.as_ref(), e)
        })
    }
}

/// Present terms, absent terms and rejected genes of one patient.
#[derive(Debug, Clone, Default)]
pub struct PatientDataAdapter {
    present_terms: IndexSet<VocabularyTerm>,
    absent_terms: IndexSet<VocabularyTerm>,
    rejected_genes: IndexSet<VocabularyTerm>,
}

impl PatientDataAdapter {
    pub fn builder<'a>(
        patient: &'a Patient,
        vocabulary_manager: &'a dyn VocabularyManager,
    ) -> AdapterBuilder<'a> {
        AdapterBuilder::new(patient, vocabulary_manager)
    }

    pub fn present_terms(&self) -> &IndexSet<VocabularyTerm> {
        &self.present_terms
    }

    pub fn absent_terms(&self) -> &IndexSet<VocabularyTerm> {
        &self.absent_terms
    }

    /// Empty unless the adapter was built `with_rejected_genes()`.
    pub fn rejected_genes(&self) -> &IndexSet<VocabularyTerm> {
        &self.rejected_genes
    }
}

/// Builds a `PatientDataAdapter`; terms that do not resolve are skipped.
pub struct AdapterBuilder<'a> {
    patient: &'a Patient,
    vocabulary_manager: &'a dyn VocabularyManager,
    rejected_genes: IndexSet<VocabularyTerm>,
}

impl<'a> AdapterBuilder<'a> {
    pub fn new(patient: &'a Patient, vocabulary_manager: &'a dyn VocabularyManager) -> Self {
        Self {
            patient,
            vocabulary_manager,
            rejected_genes: IndexSet::new(),
        }
    }

    /// Also collect the genes that were rejected for the patient.
    pub fn with_rejected_genes(mut self) -> Self {
        let hgnc = match self.vocabulary_manager.get_vocabulary(HGNC) {
            Some(hgnc) => hgnc,
            None => {
                tracing::warn!("no HGNC vocabulary available, ignoring rejected genes");
                return self;
            }
        };
        self.rejected_genes = self
            .patient
            .genes
            .iter()
            .filter(|gene| gene.is_rejected())
            .filter_map(|gene| {
                let term = hgnc.get_term(gene.id.trim());
                if term.is_none() {
                    tracing::debug!("could not resolve rejected gene {}", &gene.id);
                }
                term
            })
            .collect();
        self
    }

    pub fn build(self) -> PatientDataAdapter {
        let mut present_terms = IndexSet::new();
        let mut absent_terms = IndexSet::new();
        for feature in &self.patient.features {
            match self.vocabulary_manager.resolve_term(&feature.id) {
                Some(term) if feature.is_present() => {
                    present_terms.insert(term);
                }
                Some(term) => {
                    absent_terms.insert(term);
                }
                None => tracing::debug!("could not resolve feature {}", &feature.id),
            }
        }
        for (qualifier, ids) in &self.patient.global_qualifiers {
            for id in ids {
                match self.vocabulary_manager.resolve_term(id) {
                    Some(term) => {
                        present_terms.insert(term);
                    }
                    None => tracing::debug!("could not resolve {} qualifier {}", qualifier, id),
                }
            }
        }

        PatientDataAdapter {
            present_terms,
            absent_terms,
            rejected_genes: self.rejected_genes,
        }
    }
}
