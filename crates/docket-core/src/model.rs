//! Domain records for users, cases, rulings, bias checks and audit entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::response::plain_explanation;

pub type UserId = i64;
pub type CaseId = i64;
pub type RulingId = i64;
pub type BiasCheckId = i64;
pub type AuditEntryId = i64;

/// Fixed verdict label set offered to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Innocent,
    Guilty,
    Dismissed,
    Upheld,
    Reduced,
    Settlement,
    Mistrial,
    Other,
}

impl Verdict {
    pub const ALL: [Verdict; 8] = [
        Verdict::Innocent,
        Verdict::Guilty,
        Verdict::Dismissed,
        Verdict::Upheld,
        Verdict::Reduced,
        Verdict::Settlement,
        Verdict::Mistrial,
        Verdict::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Innocent => "innocent",
            Verdict::Guilty => "guilty",
            Verdict::Dismissed => "dismissed",
            Verdict::Upheld => "upheld",
            Verdict::Reduced => "reduced",
            Verdict::Settlement => "settlement",
            Verdict::Mistrial => "mistrial",
            Verdict::Other => "other",
        }
    }

    /// Match a label case-insensitively, ignoring surrounding whitespace
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|verdict| verdict.as_str().eq_ignore_ascii_case(label))
    }

    /// Comma-separated label list as embedded in prompts
    pub fn label_list() -> String {
        Self::ALL
            .iter()
            .map(Verdict::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown verdict label '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCase {
    pub title: String,
    pub narrative: String,
    pub locale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub owner_id: UserId,
    pub title: String,
    pub narrative: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
}

impl Case {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }
}

/// Replaceable content of a ruling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulingFields {
    pub verdict: Verdict,
    pub rationale: String,
    pub citations: Vec<String>,
    pub risk_flags: Vec<String>,
    pub model_name: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// The current ruling of a case. Exactly one per case; re-ruling overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruling {
    pub id: RulingId,
    pub case_id: CaseId,
    pub verdict: Verdict,
    pub rationale: String,
    pub citations: Vec<String>,
    pub risk_flags: Vec<String>,
    pub model_name: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ruling {
    pub fn create(id: RulingId, case_id: CaseId, fields: RulingFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            case_id,
            verdict: fields.verdict,
            rationale: fields.rationale,
            citations: fields.citations,
            risk_flags: fields.risk_flags,
            model_name: fields.model_name,
            tokens_in: fields.tokens_in,
            tokens_out: fields.tokens_out,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace content in place, keeping identity and creation time
    pub fn overwrite(&mut self, fields: RulingFields, now: DateTime<Utc>) {
        self.verdict = fields.verdict;
        self.rationale = fields.rationale;
        self.citations = fields.citations;
        self.risk_flags = fields.risk_flags;
        self.model_name = fields.model_name;
        self.tokens_in = fields.tokens_in;
        self.tokens_out = fields.tokens_out;
        self.updated_at = now;
    }

    pub fn plain_explanation(&self) -> String {
        plain_explanation(&self.rationale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasFields {
    pub bias_score: f64,
    pub notes: Vec<String>,
}

/// Fairness audit of a ruling. At most one per ruling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasCheck {
    pub id: BiasCheckId,
    pub ruling_id: RulingId,
    pub bias_score: f64,
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BiasCheck {
    pub fn create(id: BiasCheckId, ruling_id: RulingId, fields: BiasFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            ruling_id,
            bias_score: fields.bias_score,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn overwrite(&mut self, fields: BiasFields, now: DateTime<Utc>) {
        self.bias_score = fields.bias_score;
        self.notes = fields.notes;
        self.updated_at = now;
    }
}

/// A case with its current ruling and bias check, if any
#[derive(Debug, Clone, PartialEq)]
pub struct CaseDetail {
    pub case: Case,
    pub ruling: Option<Ruling>,
    pub bias_check: Option<BiasCheck>,
}

/// Audit record as handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: UserId,
    pub action: String,
    pub metadata: serde_json::Value,
}

/// Persisted, append-only audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub user_id: UserId,
    pub action: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
