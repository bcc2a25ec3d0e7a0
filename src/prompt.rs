//! System prompt templating

use crate::dates::TodayContext;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Template shipped with the binary, used when no template file exists
pub const DEFAULT_TEMPLATE: &str = include_str!("../prompts/system_prompt.txt");

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Read the template at `path`, falling back to the built-in one if the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(template) => Ok(Self::new(template)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No prompt template at {}, using built-in default",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(Error::file_access(path, e)),
        }
    }

    /// Substitute `{{TODAY}}`, `{{WEEKDAY}}`, `{{TOMORROW_DATE}}` and `{{FRIDAY_DATE}}`
    pub fn render(&self, ctx: &TodayContext) -> String {
        self.template
            .replace("{{TODAY}}", &ctx.today)
            .replace("{{WEEKDAY}}", &ctx.weekday)
            .replace("{{TOMORROW_DATE}}", &ctx.tomorrow)
            .replace("{{FRIDAY_DATE}}", &ctx.friday)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}
