//! Problems reported while loading the project model.

use std::sync::Arc;

use crate::model::ModelLoadIssue;
use crate::property::{MutableProperty, PropertySource};

/// Observable list of model load issues, oldest first.
#[derive(Debug)]
pub struct ProjectIssueManager {
    issues: Arc<MutableProperty<Vec<ModelLoadIssue>>>,
}

impl ProjectIssueManager {
    pub fn new() -> Self {
        Self {
            issues: Arc::new(MutableProperty::new(Vec::new())),
        }
    }

    pub fn report(&self, issue: ModelLoadIssue) {
        tracing::warn!(
            project = %issue.project_dir.display(),
            message = %issue.message,
            "model load issue"
        );
        self.issues.update(|current| {
            let mut next = current.clone();
            next.push(issue.clone());
            next
        });
    }

    /// Drop every issue. Returns how many there were.
    pub fn clear(&self) -> usize {
        let count = self.issues.snapshot().len();
        if count > 0 {
            self.issues.set_value(Vec::new());
        }
        count
    }

    pub fn issues(&self) -> Vec<ModelLoadIssue> {
        self.issues.get_value()
    }

    pub fn source(&self) -> Arc<dyn PropertySource<Vec<ModelLoadIssue>>> {
        self.issues.clone()
    }
}

impl Default for ProjectIssueManager {
    fn default() -> Self {
        Self::new()
    }
}
