//! Code implementing the `panels query` sub command.

use std::{io::Write, sync::Arc, time::Instant};

use clap::Parser;
use tracing::info;

use crate::{
    common::{io::open_write_maybe_gz, trace_rss_now},
    conf::Conf,
    err::LoadError,
};

use super::{
    adapter::Patient,
    loader::{GenePanelLoader, PanelData},
    paging::page_panel,
    panel::DefaultGenePanelFactory,
};

/// Command line arguments for `panels query` sub command.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Compute a gene panel", long_about = None)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(long, required = true)]
    pub path_conf: String,
    /// Path to a patient JSON file to take terms and rejected genes from.
    #[arg(long, conflicts_with_all = ["present_term", "absent_term", "rejected_gene"])]
    pub path_patient_json: Option<String>,
    /// Identifier of a present term, may be given multiple times.
    #[arg(long)]
    pub present_term: Vec<String>,
    /// Identifier of an absent term, may be given multiple times.
    #[arg(long)]
    pub absent_term: Vec<String>,
    /// Symbol or identifier of a rejected gene, may be given multiple times.
    #[arg(long)]
    pub rejected_gene: Vec<String>,
    /// 1-based page to return.
    #[arg(long)]
    pub start_page: Option<i64>,
    /// Number of genes per page, all genes if not given.
    #[arg(long)]
    pub limit: Option<i64>,
    /// Path to the output JSON file, stdout if not given.
    #[arg(long)]
    pub path_output: Option<String>,
}

/// Compute the panel JSON for `args`.
///
/// Returns `None` if the panel is empty.
pub fn query(
    loader: &GenePanelLoader,
    factory: &DefaultGenePanelFactory,
    args: &Args,
) -> Result<Option<serde_json::Value>, anyhow::Error> {
    let panel = if let Some(path_patient_json) = &args.path_patient_json {
        info!("Reading patient from {}...", path_patient_json);
        let patient = Patient::load(path_patient_json)?;
        let panel = factory.build_from_patient(&patient, true);
        if panel.size() == 0 {
            return Ok(None);
        }
        Arc::new(panel)
    } else {
        let key = PanelData::new(&args.present_term, &args.absent_term, &args.rejected_gene);
        if key.has_no_terms() {
            anyhow::bail!("No content provided.");
        }
        match loader.get(&key) {
            Ok(panel) => panel,
            Err(LoadError::Empty) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    };

    Ok(Some(page_panel(&panel, args.start_page, args.limit)?))
}

/// Main entry point for `panels query` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    let conf = Conf::load(&args.path_conf)?;
    let vocabulary_manager = conf.load_vocabularies()?;
    trace_rss_now();

    let factory = Arc::new(DefaultGenePanelFactory::new(vocabulary_manager.clone()));
    let loader = GenePanelLoader::new(factory.clone(), vocabulary_manager);

    info!("Computing gene panel...");
    let before_query = Instant::now();
    let result = query(&loader, &factory, args)?;
    info!("...done computing gene panel in {:?}", before_query.elapsed());

    let result = match result {
        Some(result) => result,
        None => {
            tracing::warn!("No genes are associated with the given terms.");
            serde_json::json!({"rows": [], "returnedrows": 0, "totalrows": 0})
        }
    };

    if let Some(path_output) = &args.path_output {
        let mut writer = open_write_maybe_gz(path_output)?;
        serde_json::to_writer_pretty(&mut writer, &result)?;
        writeln!(writer)?;
        writer.flush()?;
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
