#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use {
    std::{path::PathBuf, sync::Arc},
    tracing::{info, warn},
    clap::{Parser, Subcommand},
    anyhow::Context,
    fx_core::{EventEnvelope, HttpRequest, InvocationRequest},
    fx_emulator::{
        EmulatorConfig,
        InMemoryCatalog,
        Router,
        TriggerCatalog,
        classifier,
        logs::init_logging,
    },
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = "fx-emulator.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists configured functions with the service each one is emulated by.
    Triggers,
    /// Shows which function an event would be delivered to.
    Route {
        #[arg(long)]
        event_type: String,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        service: Option<String>,
    },
    /// Shows whether an http request to the function id would be accepted.
    RouteHttp {
        trigger_id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = std::env::current_dir()
        .context("failed to resolve working directory")?
        .join(&args.config);
    let config = EmulatorConfig::load(config_path.clone()).await
        .with_context(|| format!("failed to load config from {config_path:?}"))?;

    init_logging(config.logger.as_ref());
    info!(functions = config.functions.len(), mode = ?config.execution_mode, "loaded config from {config_path:?}");

    let catalog = Arc::new(InMemoryCatalog::new(config.functions));
    let router = Router::new(catalog.clone());

    match args.command {
        Command::Triggers => {
            for trigger in catalog.triggers() {
                let service = match classifier::classify(&trigger) {
                    Some(v) => v.to_string(),
                    None => {
                        warn!(trigger_id = trigger.id.as_str(), "unable to determine service for trigger, it may not be emulated");
                        "unknown".to_owned()
                    },
                };
                println!("{}\t{}\t{}", trigger.id, trigger.kind.as_str(), service);
            }
        },
        Command::Route { event_type, resource, service } => {
            let mut event = EventEnvelope::new(event_type, resource);
            if let Some(service) = service {
                event = event.with_service(service);
            }
            let route = router.resolve(&InvocationRequest::Event(event))?;
            println!("{}", route.trigger.id);
            let mut params: Vec<_> = route.params.into_iter().collect();
            params.sort();
            for (name, value) in params {
                println!("  {name} = {value}");
            }
        },
        Command::RouteHttp { trigger_id } => {
            let request = HttpRequest::new(trigger_id, http::Method::POST, http::Uri::from_static("/"));
            let route = router.resolve(&InvocationRequest::Http(request))?;
            println!("{}", route.trigger.id);
        },
    }

    Ok(())
}
