//! Result shapes returned by the model, plus the boundary checks that keep
//! malformed model output from reaching callers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub roles: Vec<String>,
    pub achievements: Vec<String>,
    pub impact: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degrees: Vec<String>,
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
}

/// Structured feedback for one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeAnalysisResult {
    pub personal_info: PersonalInfo,
    pub work_experience: WorkExperience,
    pub education: Education,
    pub skills: Vec<String>,
    /// Between 0 and 100 inclusive.
    pub ats_score: f64,
    /// Between 0 and 100 inclusive.
    pub readability_score: f64,
    pub suggestions: Suggestions,
}

/// How well a resume covers one job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMatchResult {
    /// Between 0 and 100 inclusive.
    pub percentage: f64,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub suggestions: Vec<String>,
}

/// A shape check that JSON parsing alone cannot express.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

impl Validate for ResumeAnalysisResult {
    fn validate(&self) -> Result<(), String> {
        check_score("atsScore", self.ats_score)?;
        check_score("readabilityScore", self.readability_score)
    }
}

impl Validate for JobMatchResult {
    fn validate(&self) -> Result<(), String> {
        check_score("percentage", self.percentage)?;

        let matching: HashSet<String> = self
            .matching_skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .collect();
        let overlap: Vec<&str> = self
            .missing_skills
            .iter()
            .filter(|s| matching.contains(&s.trim().to_lowercase()))
            .map(String::as_str)
            .collect();

        if overlap.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "skills listed as both matching and missing: {}",
                overlap.join(", ")
            ))
        }
    }
}

fn check_score(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be within 0..=100, got {value}"))
    }
}
