use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use receipt_intake::api::{self, AppContext};
use receipt_intake::config::{self, ServerConfig};
use receipt_intake::credentials::{
    CredentialProvider, ServiceAccountCredentials, StaticCredentials,
};
use receipt_intake::pipeline::extraction::pdfium::PdfiumRenderer;
use receipt_intake::pipeline::extraction::{ExtractionAdapter, OpenAiVisionClient};
use receipt_intake::pipeline::sinks::{
    AutomationSink, DriveArchiveSink, GmailNotificationSink, WebhookAutomationSink,
};
use receipt_intake::pipeline::IntakePipeline;
use receipt_intake::settings::JsonFileSettings;

fn main() -> anyhow::Result<()> {
    receipt_intake::init_tracing();
    let config = ServerConfig::parse();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    // Blocking HTTP clients are built (and later dropped) outside the runtime.
    let ctx = build_context(&config)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime
        .block_on(api::serve(ctx.clone(), config.bind))
        .with_context(|| format!("Failed to serve on {}", config.bind))?;
    drop(runtime);

    tracing::info!("Shut down cleanly");
    Ok(())
}

fn build_context(config: &ServerConfig) -> anyhow::Result<AppContext> {
    if config.vision_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; vision requests will be rejected");
    }
    let vision = OpenAiVisionClient::new(
        &config.vision_base_url,
        &config.vision_api_key,
        &config.vision_model,
        config.vision_timeout_secs,
    )?;
    let renderer = PdfiumRenderer::new().context("PDFium is required to read PDF receipts")?;
    let extractor = ExtractionAdapter::new(Arc::new(vision), Arc::new(renderer));

    let sender = config.sender_email.clone().unwrap_or_default();
    let credentials: Arc<dyn CredentialProvider> = match &config.service_account_file {
        Some(path) => Arc::new(
            ServiceAccountCredentials::from_file(path, &sender)
                .with_context(|| format!("Invalid service account {}", path.display()))?,
        ),
        None => {
            tracing::warn!("No service account configured; archive and mail will fail");
            Arc::new(StaticCredentials::unavailable())
        }
    };

    let archive = DriveArchiveSink::new(credentials.clone(), &config.archive_folder_id)?;
    let notifier = GmailNotificationSink::new(credentials, &sender)?;
    let automation: Option<Arc<dyn AutomationSink>> = match config.automation_url() {
        Some(url) => Some(Arc::new(WebhookAutomationSink::new(url)?)),
        None => {
            tracing::info!("No automation webhook configured");
            None
        }
    };

    let pipeline = IntakePipeline::new(
        extractor,
        Arc::new(archive),
        Arc::new(notifier),
        automation,
        config.upload_dir(),
    );
    let settings = JsonFileSettings::new(config.settings_file());
    tracing::info!(
        settings = %settings.path().display(),
        uploads = %config.upload_dir().display(),
        "Configuration loaded"
    );

    Ok(AppContext::new(Arc::new(pipeline), Arc::new(settings)))
}
