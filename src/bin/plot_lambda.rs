use lambda_runtime::{service_fn, Error, LambdaEvent};
use plot_pipeline::assets::S3AssetStore;
use plot_pipeline::handlers::{PlotHandler, PlotServices};
use plot_pipeline::models::{PlotConfig, PlotOutput};
use plot_pipeline::plot::FacetPlotter;
use plot_pipeline::telemetry::{self, LogFormat};
use serde_json::Value;

async fn handle_request(
    handler: &PlotHandler,
    event: LambdaEvent<Value>,
) -> Result<PlotOutput, Error> {
    tracing::info!(request_id = %event.context.request_id, "Plot invocation");
    Ok(handler.handle(event.payload).await?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init(LogFormat::Json);

    let config = PlotConfig::from_env()?;
    let store = S3AssetStore::from_env(config.bucket_name.clone()).await;
    tracing::info!("Plot function writing to bucket {}", store.bucket());
    let handler = PlotHandler::with_services(
        PlotServices {
            renderer: Box::new(FacetPlotter::default()),
            store: Box::new(store),
        },
        &config,
    );

    lambda_runtime::run(service_fn(|event| handle_request(&handler, event))).await
}
