//! eskube - Elasticsearch on Kubernetes validation webhook and node set renderer

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kube::{Client, CustomResourceExt};

use eskube::render::{render_cluster, RenderOptions};
use eskube::webhook::{webhook_router, WebhookState};
use eskube_common::crd::Elasticsearch;
use eskube_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use eskube_common::DEFAULT_WEBHOOK_PORT;
use eskube_nodeset::{ClusterStateStore, InMemoryStore, KubeStore};
use eskube_settings::PolicyConfig;

/// eskube - admission and build core for Elasticsearch clusters on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "eskube", version, about, long_about = None)]
struct Cli {
    /// OTLP endpoint for trace export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the validating admission webhook
    Webhook(WebhookArgs),

    /// Print the Elasticsearch CRD and exit
    Crd,

    /// Validate a manifest and print the resources of every node set
    Render(RenderArgs),
}

/// Webhook server arguments
#[derive(Parser, Debug)]
struct WebhookArgs {
    /// Address the webhook listens on
    #[arg(long, env = "ESKUBE_WEBHOOK_ADDR", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_WEBHOOK_PORT)))]
    webhook_addr: SocketAddr,

    /// Directory holding the serving certificate as tls.crt and tls.key
    #[arg(
        long,
        env = "ESKUBE_WEBHOOK_CERT_DIR",
        default_value = "/tmp/k8s-webhook-server/serving-certs"
    )]
    cert_dir: PathBuf,

    /// Namespaces whose resources are validated, all when empty
    #[arg(long, env = "ESKUBE_MANAGED_NAMESPACES", value_delimiter = ',')]
    managed_namespaces: Vec<String>,
}

/// Render arguments
#[derive(Parser, Debug)]
struct RenderArgs {
    /// Path to the Elasticsearch manifest
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Path to an operator policy document
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Apply the default pod security context on versions running as non-root
    #[arg(long, env = "ESKUBE_SET_DEFAULT_SECURITY_CONTEXT", default_value_t = true, action = clap::ArgAction::Set)]
    set_default_security_context: bool,

    /// Print the desired nodes as JSON instead of the manifests
    #[arg(long)]
    desired_nodes: bool,

    /// Read live StatefulSets and claims from the current cluster
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The webhook serves TLS through rustls; pin the aws-lc-rs provider
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install the aws-lc-rs crypto provider");
    }

    let cli = Cli::parse();
    let log_format = match cli.command {
        Commands::Webhook(_) => LogFormat::Json,
        _ => LogFormat::Text,
    };
    let provider = init_telemetry(TelemetryConfig {
        otlp_endpoint: cli.otlp_endpoint.clone(),
        log_format,
        ..Default::default()
    })?;

    let result = match cli.command {
        Commands::Webhook(args) => run_webhook(args).await,
        Commands::Crd => {
            let crd = serde_yaml::to_string(&Elasticsearch::crd())
                .context("failed to serialize CRD")?;
            println!("{crd}");
            Ok(())
        }
        Commands::Render(args) => run_render(args).await,
    };

    if let Some(provider) = provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("failed to flush traces: {e}");
        }
    }
    result
}

/// Serve the validating webhook until the process is stopped
async fn run_webhook(args: WebhookArgs) -> anyhow::Result<()> {
    let cert = args.cert_dir.join("tls.crt");
    let key = args.cert_dir.join("tls.key");
    let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key)
        .await
        .with_context(|| format!("failed to load serving certificate from {:?}", args.cert_dir))?;

    let state = Arc::new(WebhookState::new(args.managed_namespaces));
    let router = webhook_router(state.clone());

    tracing::info!(
        addr = %args.webhook_addr,
        managed_namespaces = ?state.managed_namespaces,
        "starting validating webhook"
    );
    axum_server::bind_rustls(args.webhook_addr, tls_config)
        .serve(router.into_make_service())
        .await
        .context("webhook server failed")
}

/// Validate a manifest and print what would be applied
async fn run_render(args: RenderArgs) -> anyhow::Result<()> {
    let manifest = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read manifest {:?}", args.file))?;
    let es: Elasticsearch =
        serde_yaml::from_str(&manifest).context("failed to parse Elasticsearch manifest")?;

    let policy = match &args.policy {
        Some(path) => {
            let doc = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read policy {path:?}"))?;
            PolicyConfig::from_yaml(&doc)?
        }
        None => PolicyConfig::default(),
    };

    let store: Box<dyn ClusterStateStore> = if args.live {
        let client = Client::try_default()
            .await
            .context("failed to create Kubernetes client")?;
        Box::new(KubeStore::new(client))
    } else {
        Box::new(InMemoryStore::new())
    };

    let options = RenderOptions {
        policy,
        set_default_security_context: args.set_default_security_context,
    };
    let rendered = render_cluster(&es, store.as_ref(), &options).await?;

    if args.desired_nodes {
        let desired = rendered.desired_nodes(store.as_ref(), &es.spec.version).await?;
        if desired.requeue {
            tracing::warn!("storage of some nodes is not known yet, sizes are estimates");
        }
        let out = serde_json::to_string_pretty(&serde_json::json!({"nodes": desired.nodes}))?;
        println!("{out}");
    } else {
        print!("{}", rendered.to_yaml()?);
    }
    Ok(())
}
