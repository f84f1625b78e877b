use concentrate_bench::client::ConcentrateClient;
use concentrate_bench::experiments::ExperimentRunner;
use concentrate_bench::settings::Settings;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    // Initialize logging first
    init_logging();

    dotenv::dotenv().ok();
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    let client = match ConcentrateClient::new(&settings) {
        Ok(client) => client,
        Err(e) => {
            error!("failed to initialize client: {}", e);
            std::process::exit(1);
        }
    };
    info!("client initialized");

    info!("testing API connection...");
    if !client.probe().await {
        error!("API connection failed. Please check your API key.");
        std::process::exit(1);
    }
    info!("API connection successful");

    let mut runner = ExperimentRunner::new(client, &settings);

    // Race the phase sequence against Ctrl-C so an interrupted run still
    // persists whatever records accumulated before the interrupt.
    let outcome = tokio::select! {
        outcome = runner.run_all() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let saved = match outcome {
        Some(Ok(())) => {
            runner.log_summary();
            info!("all experiments completed");
            runner.save_results(None)
        }
        Some(Err(e)) => {
            error!("error during experiments: {}", e);
            runner.save_errored()
        }
        None => {
            warn!("experiments interrupted by user");
            runner.save_interrupted()
        }
    };

    if let Err(e) = saved {
        error!("failed to save results: {}", e);
        std::process::exit(1);
    }
}
