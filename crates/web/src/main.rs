use axum::http::StatusCode;
use sparks_core::Properties;
use sparks_core::properties::BIND_ADDRESS_PROPERTY;
use sparks_infra::{ApplicationContext, ContextRef};
use sparks_observability::LoggingConfig;
use sparks_web::router::{ActionRouter, ActionTableBuilder, WebProcessor};
use sparks_web::{HttpRequest, HttpResponse, transport};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Built-in status endpoints.
struct StatusProcessor {
    context: ContextRef,
}

impl StatusProcessor {
    fn health(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        Ok(HttpResponse::text(StatusCode::OK, "ok"))
    }

    fn properties(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let context = self.context.upgrade()?;
        let keys: Vec<String> = context.properties().iter().map(|(k, _)| k.to_string()).collect();
        Ok(HttpResponse::json(StatusCode::OK, &keys)?)
    }
}

impl WebProcessor for StatusProcessor {
    fn create(context: ContextRef) -> anyhow::Result<Self> {
        Ok(Self { context })
    }

    fn actions(table: &mut ActionTableBuilder<Self>) {
        table
            .action("health", Self::health)
            .action("properties", Self::properties);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let properties = Properties::from_env_prefix("SPARKS_");
    sparks_observability::tracing::init(&LoggingConfig::from_properties(&properties));

    let address = properties
        .get(BIND_ADDRESS_PROPERTY)
        .unwrap_or(DEFAULT_BIND_ADDRESS)
        .to_string();

    let context = ApplicationContext::with_properties(properties);
    context.register_processor::<ActionRouter<StatusProcessor>>();
    context.start()?;

    let listener = tokio::net::TcpListener::bind(&address).await?;
    transport::serve(listener, context).await?;
    Ok(())
}
