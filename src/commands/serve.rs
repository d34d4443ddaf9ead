use std::{error::Error, net::IpAddr, path::PathBuf, time::Duration};
use clap::Args;
use ramlmockserver::{
    config::{
        manager::MockManager,
        options::{MockOptions, ServeOptions},
    },
    filewatcher::watcher,
    http::server,
    raml::loader::raml_path_cwd,
};
use tracing::info;

/// Run the mock HTTP server (with optional file-watcher).
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// RAML file to mock
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Add permissive CORS headers and answer preflight requests
    #[arg(long)]
    pub cors: bool,

    /// Serve the RAML source at this path
    #[arg(long, value_name = "PATH")]
    pub docs: Option<String>,

    /// Delay every response body by this many milliseconds
    #[arg(short, long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Ignore the Mock-Preferred-Responses request header
    #[arg(long)]
    pub ignore_preferred_responses: bool,

    /// Disable file-watching
    #[arg(long)]
    pub no_watch: bool,
}

impl ServeArgs {
    fn into_options(self) -> ServeOptions {
        let mut options = ServeOptions::new(raml_path_cwd(&self.file.to_string_lossy()));
        options.host = self.host;
        options.port = self.port;
        options.cors = self.cors;
        options.docs_path = self.docs;
        options.watch = !self.no_watch;
        options.mock = MockOptions {
            delay: self.delay.filter(|ms| *ms > 0).map(Duration::from_millis),
            ignore_preferred_responses: self.ignore_preferred_responses,
        };
        options
    }
}

pub async fn run(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let options = args.into_options();
    info!(
        file = %options.raml_path.display(),
        watch_enabled = options.watch,
        "serving RAML mock"
    );

    // Load errors abort here, before anything is bound.
    let manager = MockManager::new(
        options.raml_path.clone(),
        options.docs_path.as_deref(),
        options.mock.clone(),
    )?;

    if options.watch {
        watcher::spawn_watcher(manager.clone())?;
    }

    let addr = format!("{}:{}", options.host, options.port);
    info!(%addr, cors = options.cors, "starting HTTP server");

    server::run(&addr, manager.routes_handle(), options.cors).await?;

    Ok(())
}
