use serde::{Deserialize, Serialize};

pub type ModuleId = i64;

/// A module (course unit) students enroll in.
/// The surrogate id is assigned by the repository on insert; the module code
/// is the human-facing unique key (e.g. "CS301").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub title: String,
    pub module_code: String,
    pub description: String,
}

impl Module {
    /// Create a new module. The id is set by the repository.
    pub fn new(
        title: impl Into<String>,
        module_code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: 0, // Will be set by repository
            title: title.into(),
            module_code: module_code.into(),
            description: description.into(),
        }
    }

    pub fn apply(&mut self, update: ModuleUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(module_code) = update.module_code {
            self.module_code = module_code;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
    }
}

/// Partial update: `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleUpdate {
    pub title: Option<String>,
    pub module_code: Option<String>,
    pub description: Option<String>,
}

impl ModuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.module_code.is_none() && self.description.is_none()
    }
}
