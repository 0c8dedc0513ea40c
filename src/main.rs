//! lessgo - example function host
//!
//! Serves a hello-world HTTP function, or an echoing CloudEvents function
//! with `--events`.

use clap::Parser;
use lessgo::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lessgo")]
#[command(about = "Host a single function over HTTP or CloudEvents", long_about = None)]
struct Cli {
    /// Port to listen on; falls back to the `port` environment variable.
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Serve the CloudEvents echo function instead of hello-world.
    #[arg(long)]
    events: bool,
}

/// Example "Hello World" function.
struct HelloFunction;

#[async_trait]
impl ContextFunction for HelloFunction {
    async fn handle(
        &self,
        ctx: FunctionContext,
        request: Request,
    ) -> Result<Response, FunctionError> {
        let name = request
            .get_header("X-Name")
            .cloned()
            .unwrap_or_else(|| "World".to_string());

        let response_body = serde_json::json!({
            "message": format!("Hello, {}!", name),
            "method": request.method.to_string(),
            "path": request.url,
            "request_id": ctx.request_id,
        });

        Response::json(&response_body).map_err(|e| FunctionError::new(e.to_string()))
    }
}

/// Echo function - answers every event with a copy of its data.
struct EchoFunction;

#[async_trait]
impl EventFunction for EchoFunction {
    async fn receive(
        &self,
        ctx: FunctionContext,
        event: Event,
    ) -> Result<Option<Event>, FunctionError> {
        tracing::info!(
            request_id = %ctx.request_id,
            event_id = %event.id(),
            event_type = %event.ty(),
            "echoing event"
        );

        let mut reply = EventBuilderV10::new()
            .id(format!("{}-echo", event.id()))
            .source("/lessgo/echo")
            .ty(format!("{}.echo", event.ty()));
        if let Some(data) = event.data() {
            let content_type = event
                .datacontenttype()
                .unwrap_or("application/octet-stream");
            reply = reply.data(content_type, data.clone());
        }

        reply
            .build()
            .map(Some)
            .map_err(|e| FunctionError::new(e.to_string()))
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let function = if cli.events {
        Function::event(EchoFunction)
    } else {
        Function::contextual(HelloFunction)
    };

    tracing::info!(variant = ?function.variant(), "Starting lessgo function host...");

    let host = FunctionHost::new(HostConfig::new().port(cli.port));
    if let Err(err) = host.run(Some(function)).await {
        tracing::error!(error = %err, "function host failed");
        std::process::exit(1);
    }
}
