use std::sync::{Arc, RwLock};

use crate::error::{AppError, AppResult};

/// HeadlineState
///
/// The site-wide headline: one process-wide string, many readers, one writer at a
/// time. Initialized from configuration at startup and not persisted.
#[derive(Clone, Debug)]
pub struct HeadlineState {
    text: Arc<RwLock<String>>,
}

impl HeadlineState {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            text: Arc::new(RwLock::new(initial.into())),
        }
    }

    pub fn get(&self) -> String {
        self.text
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("headline lock was poisoned, recovering");
                poisoned.into_inner()
            })
            .clone()
    }

    /// Replaces the headline with the trimmed `text`. Blank text is rejected.
    pub fn set(&self, text: &str) -> AppResult<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Headline text is required".to_string()));
        }

        let mut guard = self.text.write().unwrap_or_else(|poisoned| {
            tracing::error!("headline lock was poisoned, recovering");
            poisoned.into_inner()
        });
        *guard = trimmed.to_string();
        Ok(guard.clone())
    }
}
