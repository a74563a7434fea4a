//! Roles and the capability table that drives authorization.
//!
//! Roles are a closed set: request handlers match on `Capability`, never
//! on role strings, so adding a role means touching exactly one table
//! here and nothing else.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every account role the platform knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Parent,
    Teacher,
    DiagnosticTeacher,
    SchoolAdmin,
    Researcher,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Parent => write!(f, "parent"),
            Role::Teacher => write!(f, "teacher"),
            Role::DiagnosticTeacher => write!(f, "diagnostic_teacher"),
            Role::SchoolAdmin => write!(f, "school_admin"),
            Role::Researcher => write!(f, "researcher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "teacher" => Ok(Role::Teacher),
            "diagnostic_teacher" => Ok(Role::DiagnosticTeacher),
            "school_admin" => Ok(Role::SchoolAdmin),
            "researcher" => Ok(Role::Researcher),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A discrete thing a request is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Start, answer, and submit the caller's own attempts.
    AttemptOwn,
    /// Read the caller's own published reports.
    ViewOwnReports,
    /// Read published reports of the caller's linked children.
    ViewChildReports,
    /// Read any attempt, response, summary, or report.
    ViewAllAttempts,
    /// Record rubric levels on constructed responses.
    GradeResponses,
    /// Trigger the scoring evaluator.
    RunScoring,
    /// Trigger report generation and section regeneration.
    GenerateReports,
    /// Publish and unpublish reports.
    PublishReports,
    /// Create and edit items, rubrics, forms, and stimuli.
    AuthorItems,
    /// Upload item-bank files.
    ImportItems,
    /// Download item-bank exports and templates.
    ExportItems,
    /// Inspect background job records.
    ViewJobs,
    /// Create and manage accounts.
    ManageUsers,
}

impl Role {
    /// The full capability set for this role.
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Student => &[AttemptOwn, ViewOwnReports],
            Role::Parent => &[ViewChildReports],
            Role::Teacher => &[ViewAllAttempts, GradeResponses, RunScoring, GenerateReports],
            Role::DiagnosticTeacher => &[
                ViewAllAttempts,
                GradeResponses,
                RunScoring,
                GenerateReports,
                PublishReports,
            ],
            Role::SchoolAdmin => &[ViewAllAttempts],
            Role::Researcher => &[AuthorItems, ImportItems, ExportItems],
            Role::Admin => &[
                AttemptOwn,
                ViewOwnReports,
                ViewChildReports,
                ViewAllAttempts,
                GradeResponses,
                RunScoring,
                GenerateReports,
                PublishReports,
                AuthorItems,
                ImportItems,
                ExportItems,
                ViewJobs,
                ManageUsers,
            ],
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}
