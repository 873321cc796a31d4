use lambda_runtime::{service_fn, Error, LambdaEvent};
use plot_pipeline::handlers::{NotificationHandler, NotificationServices};
use plot_pipeline::models::{NotificationConfig, NotificationReceipt};
use plot_pipeline::secrets::SecretsManagerStore;
use plot_pipeline::slack::SlackClient;
use plot_pipeline::telemetry::{self, LogFormat};
use serde_json::Value;
use std::time::Duration;

async fn handle_request(
    handler: &NotificationHandler,
    event: LambdaEvent<Value>,
) -> Result<NotificationReceipt, Error> {
    tracing::info!(request_id = %event.context.request_id, "Notification invocation");
    Ok(handler.handle_value(event.payload).await?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init(LogFormat::Json);

    let config = NotificationConfig::from_env()?;
    let mut slack = SlackClient::new(Duration::from_secs(10))?;
    if let Some(base_url) = config.slack_api_base_url.clone() {
        slack = slack.with_base_url(base_url);
    }

    let handler = NotificationHandler::with_services(
        NotificationServices {
            secrets: Box::new(SecretsManagerStore::from_env().await),
            notifier: Box::new(slack),
        },
        &config,
    );

    lambda_runtime::run(service_fn(|event| handle_request(&handler, event))).await
}
