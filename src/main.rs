use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plot_pipeline::assets::{MockAssetStore, S3AssetStore};
use plot_pipeline::dataset::anscombe;
use plot_pipeline::handlers::{
    NotificationHandler, NotificationServices, PlotHandler, PlotServices,
};
use plot_pipeline::models::{NotificationConfig, PlotConfig};
use plot_pipeline::plot::{FacetPlotter, PlotRenderer};
use plot_pipeline::secrets::{MockSecretStore, SecretsManagerStore};
use plot_pipeline::slack::{MockNotifier, SlackClient};
use plot_pipeline::telemetry::{self, LogFormat};
use plot_pipeline::topology::{Topology, TopologyNames, PLOT_TIMEOUT_SECONDS};
use plot_pipeline::workflow::LocalExecution;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "plot-pipeline")]
#[command(about = "Render the quartet plot and announce it in Slack")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the plot to a local PNG file.
    Render {
        #[arg(long, short, default_value = "sample.png")]
        output: PathBuf,
    },
    /// Execute the plot -> notify workflow in-process.
    Run {
        /// Use in-memory stand-ins for S3, Secrets Manager and Slack.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the validated topology manifest and state machine definition.
    Describe {
        #[arg(long)]
        state_machine_only: bool,
    },
}

const DRY_RUN_SECRET_ID: &str = "dry-run-slack-credentials";

fn dry_run_default(key: &str) -> Option<String> {
    let value = match key {
        "S3_BUCKET_NAME" => "dry-run-bucket",
        "SLACK_CREDENTIALS_SECRET_ID" => DRY_RUN_SECRET_ID,
        "CLOUD_FRONT_DISTRIBUTION_URL" => "https://dry-run.cloudfront.net",
        _ => return None,
    };
    Some(value.to_string())
}

async fn render(output: PathBuf) -> Result<()> {
    let png = FacetPlotter::default().render(&anscombe()).await?;
    std::fs::write(&output, &png)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote {} bytes to {}", png.len(), output.display());
    Ok(())
}

async fn run(dry_run: bool) -> Result<()> {
    let names = TopologyNames::default();

    let (plot, notification) = if dry_run {
        info!("Dry run: S3, Secrets Manager and Slack are replaced by mocks");
        let lookup = |key: &str| std::env::var(key).ok().or_else(|| dry_run_default(key));
        let plot_config = PlotConfig::from_lookup(lookup)?;
        let notification_config = NotificationConfig::from_lookup(lookup)?;

        let plot = PlotHandler::with_services(
            PlotServices {
                renderer: Box::new(FacetPlotter::default()),
                store: Box::new(MockAssetStore::new()),
            },
            &plot_config,
        );
        let notification = NotificationHandler::with_services(
            NotificationServices {
                secrets: Box::new(MockSecretStore::new().with_slack_credentials(
                    &notification_config.secret_id,
                    "xoxb-dry-run",
                    "C0DRYRUN",
                )),
                notifier: Box::new(MockNotifier::new()),
            },
            &notification_config,
        );
        (plot, notification)
    } else {
        let plot_config = PlotConfig::from_env()?;
        let notification_config = NotificationConfig::from_env()?;

        let mut slack = SlackClient::new(Duration::from_secs(10))?;
        if let Some(base_url) = notification_config.slack_api_base_url.clone() {
            slack = slack.with_base_url(base_url);
        }

        let plot = PlotHandler::with_services(
            PlotServices {
                renderer: Box::new(FacetPlotter::default()),
                store: Box::new(S3AssetStore::from_env(plot_config.bucket_name.clone()).await),
            },
            &plot_config,
        );
        let notification = NotificationHandler::with_services(
            NotificationServices {
                secrets: Box::new(SecretsManagerStore::from_env().await),
                notifier: Box::new(slack),
            },
            &notification_config,
        );
        (plot, notification)
    };

    let topology = Topology::declare(names.clone());
    topology.validate()?;

    let report = LocalExecution::new(&topology.workflow)
        .register(
            &names.plot_function,
            &plot,
            Some(Duration::from_secs(PLOT_TIMEOUT_SECONDS.into())),
        )
        .register(&names.notification_function, &notification, None)
        .run(serde_json::json!({}))
        .await?;

    for step in &report.steps {
        info!("[{}] output: {}", step.state_name, step.output);
    }
    println!("{}", serde_json::to_string_pretty(&report.output)?);
    Ok(())
}

fn describe(state_machine_only: bool) -> Result<()> {
    let topology = Topology::declare(TopologyNames::default());
    topology.validate()?;

    if state_machine_only {
        println!("{}", topology.workflow.to_json()?);
        return Ok(());
    }

    println!("{}", topology.to_json()?);
    for field in topology.placeholder_fields() {
        warn!(
            "Secret {} field {} holds a placeholder; set it after deployment",
            topology.secret.id, field
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init(LogFormat::Pretty);

    let args = CliArgs::parse();

    let result = match args.command {
        Command::Render { output } => render(output).await,
        Command::Run { dry_run } => run(dry_run).await,
        Command::Describe { state_machine_only } => describe(state_machine_only),
    };

    if let Err(e) = result {
        error!("plot-pipeline failed: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
