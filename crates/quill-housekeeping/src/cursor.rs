//! Round-robin cursor over the project ordering
//!
//! A cursor means "resume listing strictly after this project". Each sweep
//! loop owns one cursor and threads it through successive sweeps by value.

use quill_domain::{ProjectId, ProjectInfo};
use std::fmt;

/// Resumable position in the project ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    after: ProjectId,
}

impl Cursor {
    /// The start of a cycle: resume from the first project
    pub fn start() -> Self {
        Self {
            after: ProjectId::DEFAULT,
        }
    }

    /// Resume strictly after `project_id`
    pub fn after_project(project_id: ProjectId) -> Self {
        Self { after: project_id }
    }

    /// Project id to list strictly after
    pub fn after(&self) -> ProjectId {
        self.after
    }

    /// Whether this cursor is at the start of a cycle
    pub fn is_start(&self) -> bool {
        self.after == ProjectId::DEFAULT
    }

    /// Next cursor after a page of `fetched` projects was listed with `page_size`
    ///
    /// A short page means the end of the project set, so the cycle restarts.
    /// A full page resumes after its last project.
    pub fn advance(fetched: &[ProjectInfo], page_size: usize) -> Self {
        match fetched.last() {
            Some(last) if fetched.len() >= page_size => Self::after_project(last.id),
            _ => Self::start(),
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_start() {
            f.write_str("start")
        } else {
            write!(f, "after {}", self.after)
        }
    }
}
