//! Profile snapshot and the write payloads accepted by the profile endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identity fields of the authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserIdentity {
    /// Full name, or the username when no name is set.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Degree the user is applying for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegreeLevel {
    #[default]
    Bachelor,
    Master,
    Phd,
}

/// Application preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub applying_for: DegreeLevel,
    #[serde(default)]
    pub fields_of_interest: Vec<String>,
    #[serde(default)]
    pub preferred_ranking_min: i32,
    #[serde(default = "default_ranking_max")]
    pub preferred_ranking_max: i32,
    /// 0 = none, 1 = partial, 2 = full
    #[serde(default)]
    pub need_financial_aid: u8,
}

fn default_ranking_max() -> i32 {
    500
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            applying_for: DegreeLevel::Bachelor,
            fields_of_interest: Vec::new(),
            preferred_ranking_min: 0,
            preferred_ranking_max: default_ranking_max(),
            need_financial_aid: 0,
        }
    }
}

impl Preferences {
    /// Form-level checks mirrored from the Account Service.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.preferred_ranking_min < 0 || self.preferred_ranking_min > self.preferred_ranking_max {
            return Err(ValidationError::Field {
                field: "preferred_ranking",
                reason: format!(
                    "ranking range {}..{} is invalid",
                    self.preferred_ranking_min, self.preferred_ranking_max
                ),
            });
        }
        if self.need_financial_aid > 2 {
            return Err(ValidationError::Field {
                field: "need_financial_aid",
                reason: "must be 0 (none), 1 (partial) or 2 (full)".to_string(),
            });
        }
        Ok(())
    }
}

/// Academic record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicInfo {
    #[serde(default)]
    pub high_school_name: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<i32>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub gpa_scale: Option<String>,
    #[serde(default)]
    pub sat_score: Option<i32>,
    #[serde(default)]
    pub act_score: Option<i32>,
    #[serde(default)]
    pub toefl_score: Option<i32>,
    #[serde(default)]
    pub ielts_score: Option<f64>,
    #[serde(default)]
    pub class_rank: Option<i32>,
    #[serde(default)]
    pub class_size: Option<i32>,
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &'static str,
    value: Option<T>,
    min: T,
    max: T,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < min || v > max => Err(ValidationError::Field {
            field,
            reason: format!("{} is outside {}..={}", v, min, max),
        }),
        _ => Ok(()),
    }
}

impl AcademicInfo {
    /// Score ranges and class rank, as enforced by the Account Service.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("gpa", self.gpa, 0.0, 4.0)?;
        check_range("sat_score", self.sat_score, 400, 1600)?;
        check_range("act_score", self.act_score, 1, 36)?;
        check_range("toefl_score", self.toefl_score, 0, 120)?;
        check_range("ielts_score", self.ielts_score, 0.0, 9.0)?;
        if let (Some(rank), Some(size)) = (self.class_rank, self.class_size) {
            if rank > size {
                return Err(ValidationError::Field {
                    field: "class_rank",
                    reason: "class rank cannot be greater than class size".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Full profile as held by the current session.
///
/// Replaced wholesale on every successful fetch; never patched in place.
/// `saved_university_ids` is merged in by the client from the saved-ids
/// endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub user: UserIdentity,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub preferences: Option<Preferences>,
    #[serde(default)]
    pub academic_info: Option<AcademicInfo>,
    #[serde(default)]
    pub saved_university_ids: Vec<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileSnapshot {
    pub fn is_saved(&self, university_id: i64) -> bool {
        self.saved_university_ids.contains(&university_id)
    }
}

/// Partial update of identity and contact fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
    }
}

/// Response of the saved-university toggle endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedToggle {
    pub saved: bool,
    #[serde(default)]
    pub message: String,
}
