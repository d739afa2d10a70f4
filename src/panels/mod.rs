//! Ranking of candidate genes by the phenotype terms they explain.
//!
//! A `GenePanel` is computed from the present terms of a patient: every gene
//! associated with one of the terms is listed together with the terms it
//! matches, genes matching more terms first.  Rejected genes never appear.

pub mod adapter;
pub mod cli;
pub mod loader;
pub mod match_count;
pub mod paging;
pub mod panel;
pub mod terms_for_gene;

pub use loader::{GenePanelLoader, PanelData};
pub use panel::{DefaultGenePanelFactory, GenePanel, GenePanelFactory};
