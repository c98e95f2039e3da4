//! Shared state for the intake API.

use std::sync::Arc;

use crate::pipeline::IntakePipeline;
use crate::settings::SettingsProvider;

/// State handed to every handler: the pipeline plus the settings source it
/// is run against.
#[derive(Clone)]
pub struct AppContext {
    pub pipeline: Arc<IntakePipeline>,
    pub settings: Arc<dyn SettingsProvider>,
}

impl AppContext {
    pub fn new(pipeline: Arc<IntakePipeline>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { pipeline, settings }
    }
}
