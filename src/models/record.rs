//! Tracker rows and the drafts callers submit to create or update them.

use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorCode, TrackerError, TrackerResult},
    keys,
};

/// Canonical column order of the tracker CSV. Fixed and versionless.
pub const CSV_HEADERS: [&str; 18] = [
    "job_key",
    "job_id",
    "company",
    "position",
    "location",
    "job_url",
    "status",
    "saved_at",
    "applied_at",
    "interview_at",
    "rejected_at",
    "ghosted_at",
    "round1_pass",
    "round2_pass",
    "round3_pass",
    "notes",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Saved,
    Applied,
    Interview,
    Rejected,
    Ghosted,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Saved,
        JobStatus::Applied,
        JobStatus::Interview,
        JobStatus::Rejected,
        JobStatus::Ghosted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Saved => "Saved",
            JobStatus::Applied => "Applied",
            JobStatus::Interview => "Interview",
            JobStatus::Rejected => "Rejected",
            JobStatus::Ghosted => "Ghosted",
        }
    }

    /// Lenient parse: surrounding whitespace and letter case are ignored, and
    /// anything unrecognized becomes `Saved`.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .unwrap_or(JobStatus::Saved)
    }
}

/// A round-pass flag as callers may send it: `true`, `1`, `"1"`, `"yes"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoundInput {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl RoundInput {
    pub fn is_pass(&self) -> bool {
        match self {
            RoundInput::Bool(value) => *value,
            RoundInput::Int(value) => *value == 1,
            RoundInput::Float(value) => *value == 1.0,
            RoundInput::Text(value) => {
                let value = value.trim();
                value == "1" || value.eq_ignore_ascii_case("yes")
            }
        }
    }

    /// Canonical on-disk form, `"1"` or `"0"`.
    pub fn canonical(&self) -> &'static str {
        if self.is_pass() {
            "1"
        } else {
            "0"
        }
    }
}

impl From<bool> for RoundInput {
    fn from(value: bool) -> Self {
        RoundInput::Bool(value)
    }
}

impl From<&str> for RoundInput {
    fn from(value: &str) -> Self {
        RoundInput::Text(value.to_string())
    }
}

/// Normalize a stored cell to `"0"`/`"1"`.
pub fn normalize_round_cell(cell: &str) -> &'static str {
    RoundInput::Text(cell.to_string()).canonical()
}

/// One row of the tracker CSV. Every field is a plain string on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRecord {
    pub job_key: String,
    pub job_id: String,
    pub company: String,
    pub position: String,
    pub location: String,
    pub job_url: String,
    pub status: String,
    pub saved_at: String,
    pub applied_at: String,
    pub interview_at: String,
    pub rejected_at: String,
    pub ghosted_at: String,
    pub round1_pass: String,
    pub round2_pass: String,
    pub round3_pass: String,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TrackerRecord {
    /// Build a record from cells in canonical column order. Missing trailing
    /// cells become empty strings; extra cells are ignored.
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |index: usize| cells.get(index).cloned().unwrap_or_default();
        Self {
            job_key: cell(0),
            job_id: cell(1),
            company: cell(2),
            position: cell(3),
            location: cell(4),
            job_url: cell(5),
            status: cell(6),
            saved_at: cell(7),
            applied_at: cell(8),
            interview_at: cell(9),
            rejected_at: cell(10),
            ghosted_at: cell(11),
            round1_pass: cell(12),
            round2_pass: cell(13),
            round3_pass: cell(14),
            notes: cell(15),
            created_at: cell(16),
            updated_at: cell(17),
        }
    }

    /// Cells in canonical column order.
    pub fn cells(&self) -> [&str; 18] {
        [
            self.job_key.as_str(),
            self.job_id.as_str(),
            self.company.as_str(),
            self.position.as_str(),
            self.location.as_str(),
            self.job_url.as_str(),
            self.status.as_str(),
            self.saved_at.as_str(),
            self.applied_at.as_str(),
            self.interview_at.as_str(),
            self.rejected_at.as_str(),
            self.ghosted_at.as_str(),
            self.round1_pass.as_str(),
            self.round2_pass.as_str(),
            self.round3_pass.as_str(),
            self.notes.as_str(),
            self.created_at.as_str(),
            self.updated_at.as_str(),
        ]
    }

    /// The transition timestamp column belonging to `status`.
    pub fn status_timestamp_mut(&mut self, status: JobStatus) -> &mut String {
        match status {
            JobStatus::Saved => &mut self.saved_at,
            JobStatus::Applied => &mut self.applied_at,
            JobStatus::Interview => &mut self.interview_at,
            JobStatus::Rejected => &mut self.rejected_at,
            JobStatus::Ghosted => &mut self.ghosted_at,
        }
    }

    pub fn status_timestamp(&self, status: JobStatus) -> &str {
        match status {
            JobStatus::Saved => &self.saved_at,
            JobStatus::Applied => &self.applied_at,
            JobStatus::Interview => &self.interview_at,
            JobStatus::Rejected => &self.rejected_at,
            JobStatus::Ghosted => &self.ghosted_at,
        }
    }

    /// Key this row answers to: its `job_key` cell, or one derived from its
    /// own id/url when the cell is empty.
    pub fn effective_key(&self) -> Option<String> {
        let stored = self.job_key.trim();
        if !stored.is_empty() {
            return Some(stored.to_string());
        }
        keys::derive_key(None, Some(&self.job_id), Some(&self.job_url))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Overwrite the latest matching row in place.
    Replace,
    /// Always add a new row, keeping earlier rows for the key as history.
    Append,
}

/// Caller-supplied fields for an upsert. Empty or absent fields fall back to
/// whatever the existing row holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordDraft {
    pub job_key: Option<String>,
    pub job_id: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub location: Option<String>,
    pub job_url: Option<String>,
    pub status: Option<String>,
    pub round1_pass: Option<RoundInput>,
    pub round2_pass: Option<RoundInput>,
    pub round3_pass: Option<RoundInput>,
    pub notes: Option<String>,
}

impl RecordDraft {
    /// Check the required-oneof constraint and derive the record key.
    pub fn validate(self) -> TrackerResult<ValidDraft> {
        let key = keys::derive_key(
            self.job_key.as_deref(),
            self.job_id.as_deref(),
            self.job_url.as_deref(),
        )
        .ok_or_else(|| {
            TrackerError::new(
                ErrorCode::InvalidInput,
                "draft needs a job key, job id, or job url",
            )
        })?;
        Ok(ValidDraft { key, draft: self })
    }
}

/// A draft that passed validation, paired with its derived key.
#[derive(Debug, Clone)]
pub struct ValidDraft {
    pub key: String,
    pub draft: RecordDraft,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_inputs_normalize() {
        for pass in [
            RoundInput::Bool(true),
            RoundInput::Int(1),
            RoundInput::from("1"),
            RoundInput::from("yes"),
            RoundInput::from("YES"),
        ] {
            assert_eq!(pass.canonical(), "1", "{pass:?}");
        }
        for fail in [
            RoundInput::Bool(false),
            RoundInput::Int(2),
            RoundInput::from("0"),
            RoundInput::from("true"),
            RoundInput::from(""),
        ] {
            assert_eq!(fail.canonical(), "0", "{fail:?}");
        }
    }

    #[test]
    fn round_inputs_deserialize_from_json_scalars() {
        let draft: RecordDraft = serde_json::from_str(
            r#"{"job_id":"1","round1_pass":true,"round2_pass":1,"round3_pass":"yes"}"#,
        )
        .unwrap();
        assert_eq!(draft.round1_pass.unwrap().canonical(), "1");
        assert_eq!(draft.round2_pass.unwrap().canonical(), "1");
        assert_eq!(draft.round3_pass.unwrap().canonical(), "1");
    }

    #[test]
    fn unknown_status_is_saved() {
        assert_eq!(JobStatus::normalize("Bogus"), JobStatus::Saved);
        assert_eq!(JobStatus::normalize(""), JobStatus::Saved);
        assert_eq!(JobStatus::normalize(" applied "), JobStatus::Applied);
        assert_eq!(JobStatus::normalize("Ghosted"), JobStatus::Ghosted);
    }

    #[test]
    fn cells_follow_canonical_order() {
        let record = TrackerRecord {
            job_key: "k".into(),
            notes: "n".into(),
            updated_at: "u".into(),
            ..Default::default()
        };
        let cells = record.cells();
        assert_eq!(cells.len(), CSV_HEADERS.len());
        assert_eq!(cells[0], "k");
        assert_eq!(cells[15], "n");
        assert_eq!(cells[17], "u");

        let owned: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        assert_eq!(TrackerRecord::from_cells(&owned), record);
    }

    #[test]
    fn draft_without_identity_is_invalid() {
        let err = RecordDraft {
            company: Some("Acme".into()),
            job_id: Some("   ".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}
