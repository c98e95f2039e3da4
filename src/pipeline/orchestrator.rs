//! Intake pipeline: one uploaded receipt through every sink.
//!
//! Stages run strictly in order:
//! received → archived → extracted → routed → notified → automated → cleaned.
//!
//! Archive and automation failures are recorded in the report and the run
//! carries on. Extraction failures degrade the record instead of stopping the
//! run. An unknown category or a failed notification ends the run. Whatever
//! happens, the run's staging directory is removed before `run` returns.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::pipeline::extraction::{ExtractedRecord, ExtractionAdapter};
use crate::pipeline::report::{self, Submission};
use crate::pipeline::sinks::{
    ArchiveReference, ArchiveSink, AutomationEvent, AutomationSink, MessageId, Notification,
    NotificationSink, SendError, SinkOutcome,
};
use crate::pipeline::staging::StagingScope;
use crate::settings::SettingsSnapshot;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The request itself is unusable. Raised before any side effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientInputError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No file uploaded")]
    NoFile,

    #[error("No file selected")]
    NoFileSelected,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("No recipient configured for category '{0}'")]
    UnknownCategory(String),
}

/// Failures that end a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    ClientInput(#[from] ClientInputError),

    #[error("Failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Failed to send notification: {0}")]
    Send(#[from] SendError),
}

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One intake submission as received from the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub category: String,
    pub reason: String,
    pub submitter: String,
}

impl UploadRequest {
    /// Check the required fields, returning the attached file on success.
    pub fn validate(&self) -> Result<&UploadedFile, ClientInputError> {
        for (name, value) in [
            ("category", &self.category),
            ("reason", &self.reason),
            ("submitter", &self.submitter),
        ] {
            if value.trim().is_empty() {
                return Err(ClientInputError::MissingField(name));
            }
        }
        let file = self.file.as_ref().ok_or(ClientInputError::NoFile)?;
        if file.filename.trim().is_empty() {
            return Err(ClientInputError::NoFileSelected);
        }
        Ok(file)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkSummary {
    pub archive: SinkOutcome<ArchiveReference>,
    pub notification: SinkOutcome<MessageId>,
    pub automation: SinkOutcome<()>,
}

/// Per-run summary returned to the caller, complete or partial.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ExtractedRecord>,
    pub archive_reference: Option<ArchiveReference>,
    pub archive_url: Option<String>,
    pub notified: bool,
    pub automation_ran: bool,
    pub sinks: SinkSummary,
}

const NOT_REACHED: &str = "Run ended before this stage";

impl RunReport {
    /// Summary of a run that has not reached any sink yet.
    pub fn pending() -> Self {
        Self {
            message: String::new(),
            record: None,
            archive_reference: None,
            archive_url: None,
            notified: false,
            automation_ran: false,
            sinks: SinkSummary {
                archive: SinkOutcome::skipped(NOT_REACHED),
                notification: SinkOutcome::skipped(NOT_REACHED),
                automation: SinkOutcome::skipped(NOT_REACHED),
            },
        }
    }
}

/// A fatal error together with everything the run managed before it.
#[derive(Debug)]
pub struct RunFailure {
    pub error: PipelineError,
    pub report: RunReport,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct IntakePipeline {
    extractor: ExtractionAdapter,
    archive: Arc<dyn ArchiveSink>,
    notifier: Arc<dyn NotificationSink>,
    automation: Option<Arc<dyn AutomationSink>>,
    upload_root: PathBuf,
}

impl IntakePipeline {
    pub fn new(
        extractor: ExtractionAdapter,
        archive: Arc<dyn ArchiveSink>,
        notifier: Arc<dyn NotificationSink>,
        automation: Option<Arc<dyn AutomationSink>>,
        upload_root: PathBuf,
    ) -> Self {
        Self {
            extractor,
            archive,
            notifier,
            automation,
            upload_root,
        }
    }

    /// Process one submission with the given settings snapshot.
    pub fn run(
        &self,
        request: UploadRequest,
        settings: SettingsSnapshot,
    ) -> Result<RunReport, RunFailure> {
        let mut report = RunReport::pending();

        let file = match request.validate() {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Rejected upload");
                return Err(RunFailure {
                    error: e.into(),
                    report,
                });
            }
        };
        info!(
            stage = "received",
            filename = %file.filename,
            size = file.bytes.len(),
            category = %request.category,
            submitter = %request.submitter,
            "Upload received"
        );

        let mut scope = match StagingScope::create(&self.upload_root) {
            Ok(scope) => scope,
            Err(e) => {
                error!(error = %e, "Failed to create staging directory");
                return Err(RunFailure {
                    error: e.into(),
                    report,
                });
            }
        };

        let outcome = self.run_stages(&request, file, &settings, &mut scope, &mut report);

        if let Err(e) = scope.close() {
            error!(error = %e, "Temporary file cleanup failed");
        }
        info!(stage = "cleaned", "Temporary files released");

        match outcome {
            Ok(()) => {
                report.message = report::status_message(&settings.toggles);
                info!(
                    stage = "responded",
                    notified = report.notified,
                    automation_ran = report.automation_ran,
                    archived = report.archive_reference.is_some(),
                    "Run complete"
                );
                Ok(report)
            }
            Err(error) => {
                report.message = error.to_string();
                error!(error = %error, "Run failed");
                Err(RunFailure { error, report })
            }
        }
    }

    fn run_stages(
        &self,
        request: &UploadRequest,
        file: &UploadedFile,
        settings: &SettingsSnapshot,
        scope: &mut StagingScope,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let staged = scope.stage_upload(&file.filename, &file.bytes)?;
        let display_name = staged
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.filename.clone());

        // Archive (best effort)
        match self.archive.archive(&staged, &display_name) {
            Ok(reference) => {
                info!(stage = "archived", file_id = %reference.file_id, "Archived upload");
                report.sinks.archive = SinkOutcome::succeeded(reference);
            }
            Err(e) => {
                warn!(stage = "archived", error = %e, "Archive failed, continuing without reference");
                report.sinks.archive = SinkOutcome::failed(&e);
            }
        }
        report.archive_reference = report.sinks.archive.reference().cloned();
        report.archive_url = report.archive_reference.as_ref().map(ArchiveReference::view_url);

        // Extract (degrades, never aborts)
        let record = match self.extractor.extract_upload(&file.bytes, &file.filename, scope) {
            Ok(fields) => ExtractedRecord::from(fields),
            Err(e) => {
                warn!(stage = "extracted", error = %e, "Extraction failed, using degraded record");
                ExtractedRecord::from(&e)
            }
        };
        info!(stage = "extracted", degraded = record.is_degraded(), "Record ready");
        report.record = Some(record.clone());

        // Route
        let recipient = settings
            .routing
            .recipient_for(&request.category)
            .ok_or_else(|| RoutingError::UnknownCategory(request.category.clone()))?;
        info!(stage = "routed", recipient, "Category resolved");

        let submission = Submission {
            submitter: &request.submitter,
            category: &request.category,
            reason: &request.reason,
        };

        // Notify
        if settings.toggles.notifications_enabled {
            let subject = report::subject(&record);
            let body = report::body(&record, &submission);
            let notification = Notification {
                record: &record,
                attachment: &staged,
                recipient,
                cc: &settings.routing.always_cc,
                subject: &subject,
                body: &body,
            };
            match self.notifier.notify(&notification) {
                Ok(id) => {
                    info!(stage = "notified", message_id = %id.0, "Notification sent");
                    report.sinks.notification = SinkOutcome::succeeded(id);
                }
                Err(e) => {
                    report.sinks.notification = SinkOutcome::failed(&e);
                    return Err(e.into());
                }
            }
        } else {
            info!(stage = "notified", "Notifications disabled, skipping");
            report.sinks.notification = SinkOutcome::skipped("Notifications are disabled");
        }
        report.notified = report.sinks.notification.is_succeeded();

        // Automate (best effort)
        report.sinks.automation = match (settings.toggles.automation_enabled, &self.automation) {
            (false, _) => {
                info!(stage = "automated", "Automation disabled, skipping");
                SinkOutcome::skipped("Automation is disabled")
            }
            (true, None) => {
                warn!(stage = "automated", "No automation endpoint configured, skipping");
                SinkOutcome::skipped("No automation endpoint configured")
            }
            (true, Some(sink)) => {
                let event = AutomationEvent::new(
                    &record.fields,
                    report.archive_url.as_deref(),
                    &request.category,
                    &request.reason,
                    &request.submitter,
                );
                match sink.notify_automation(&event) {
                    Ok(()) => {
                        info!(stage = "automated", "Automation event delivered");
                        SinkOutcome::succeeded(())
                    }
                    Err(e) => {
                        error!(stage = "automated", error = %e, "Automation failed, continuing");
                        SinkOutcome::failed(&e)
                    }
                }
            }
        };
        report.automation_ran = report.sinks.automation.is_succeeded();

        Ok(())
    }

    /// Extraction only: no sinks, same staging and cleanup discipline.
    pub fn analyze(&self, file: &UploadedFile) -> Result<ExtractedRecord, PipelineError> {
        let mut scope = StagingScope::create(&self.upload_root)?;
        let staged = scope.stage_upload(&file.filename, &file.bytes);

        let record = match staged {
            Ok(_) => match self.extractor.extract_upload(&file.bytes, &file.filename, &mut scope) {
                Ok(fields) => Ok(ExtractedRecord::from(fields)),
                Err(e) => {
                    warn!(error = %e, "Extraction failed, using degraded record");
                    Ok(ExtractedRecord::from(&e))
                }
            },
            Err(e) => Err(PipelineError::Staging(e)),
        };

        if let Err(e) = scope.close() {
            error!(error = %e, "Temporary file cleanup failed");
        }
        record
    }
}
