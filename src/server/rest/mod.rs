//! Code supporting the `server rest` sub command.

use std::{sync::Arc, time::Instant};

use actix_web::web::Data;
use clap::Parser;
use tracing::info;

use crate::{
    common::{init_env_logger, trace_rss_now},
    conf::Conf,
    panels::{DefaultGenePanelFactory, GenePanelLoader},
    vocab::VocabularyManager,
};

pub mod actix_server;

/// Default IP to listen on.
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
/// Default port to listen on.
pub const DEFAULT_LISTEN_PORT: u16 = 8081;

/// Data to keep in the web server.
pub struct WebServerData {
    pub loader: GenePanelLoader,
    pub vocabulary_manager: Arc<dyn VocabularyManager>,
}

impl WebServerData {
    /// Construct with a `DefaultGenePanelFactory` over `vocabulary_manager`.
    pub fn new(vocabulary_manager: Arc<dyn VocabularyManager>) -> Self {
        let factory = Arc::new(DefaultGenePanelFactory::new(vocabulary_manager.clone()));
        Self {
            loader: GenePanelLoader::new(factory, vocabulary_manager.clone()),
            vocabulary_manager,
        }
    }
}

/// Command line arguments for `server rest` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run gene panel REST API server", long_about = None)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(long, required = true)]
    pub path_conf: String,
    /// IP to listen on, overrides the configuration file.
    #[arg(long)]
    pub listen_host: Option<String>,
    /// Port to listen on, overrides the configuration file.
    #[arg(long)]
    pub listen_port: Option<u16>,
}

/// Main entry point for `server rest` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    init_env_logger(args_common);

    info!("Loading configuration...");
    let conf = Conf::load(&args.path_conf)?;
    let listen_host = args
        .listen_host
        .clone()
        .or_else(|| conf.top.server.listen_host.clone())
        .unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string());
    let listen_port = args
        .listen_port
        .or(conf.top.server.listen_port)
        .unwrap_or(DEFAULT_LISTEN_PORT);

    let before_loading = Instant::now();
    let vocabulary_manager = conf.load_vocabularies()?;
    let data = Data::new(WebServerData::new(vocabulary_manager));
    info!("...done setting up in {:?}", before_loading.elapsed());

    trace_rss_now();

    info!("Launching server on {}:{} ...", &listen_host, listen_port);
    actix_server::main(&listen_host, listen_port, data)?;

    info!("All done. Have a nice day!");
    Ok(())
}
