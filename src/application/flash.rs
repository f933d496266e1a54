//! One-shot messages carried across a redirect.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashCategory {
    Info,
    Success,
    Warning,
    Danger,
}

impl FlashCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashCategory::Info => "info",
            FlashCategory::Success => "success",
            FlashCategory::Warning => "warning",
            FlashCategory::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub category: FlashCategory,
    pub text: String,
}

impl FlashMessage {
    pub fn new(category: FlashCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.category.as_str()
    }
}
