//! # Artifact Types
//!
//! Structured values produced by the agents and threaded through the
//! pipeline. Every type here is parsed straight out of a model completion,
//! so each derives `JsonSchema` for the structured-output instruction.
//!
//! Review, QA and content outputs carry an open `extra` map: fields the
//! model adds beyond the required contract are kept instead of rejected.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

/// Open extension map for model-added fields
pub type Extra = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Planning & Design
// ============================================================================

/// Project brief produced by the Planner from the raw request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectBrief {
    /// One sentence summary
    pub summary: String,
    /// Target audience
    pub target_users: String,
    /// Ordered list of features to build
    pub key_features: Vec<String>,
    /// Suggested technology stack
    pub tech_stack: String,
}

/// Design system produced by the Designer from the brief
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UiDesign {
    /// Description of the page layout
    pub layout: String,
    /// Palette as color codes, e.g. "#1a1a2e"
    pub colors: Vec<String>,
    /// Font recommendations
    pub typography: String,
    /// Components needed, e.g. "Header", "Hero"
    pub components: Vec<String>,
}

// ============================================================================
// Code
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[serde(alias = "ts", alias = "tsx", alias = "TypeScript")]
    Typescript,
    #[serde(alias = "py", alias = "Python")]
    Python,
    #[serde(alias = "CSS")]
    Css,
    #[serde(alias = "JSON")]
    Json,
}

/// A generated source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CodeFile {
    /// Relative path, unique within its collection
    pub path: String,
    pub content: String,
    pub language: Language,
}

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureBlurb {
    pub title: String,
    pub desc: String,
}

/// Website copy produced by the Writer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentBundle {
    #[serde(default)]
    pub hero_headline: String,
    #[serde(default)]
    pub hero_subheadline: String,
    #[serde(default)]
    pub cta_text: String,
    #[serde(default)]
    pub about_text: String,
    #[serde(default)]
    pub features_content: Vec<FeatureBlurb>,
    #[serde(flatten)]
    pub extra: Extra,
}

// ============================================================================
// Review & QA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "High", alias = "HIGH", alias = "critical", alias = "Critical")]
    High,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Low", alias = "LOW")]
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewIssue {
    pub severity: Severity,
    #[serde(default)]
    pub file: String,
    pub issue: String,
    #[serde(default)]
    pub suggestion: String,
}

/// Code review produced by the Reviewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewReport {
    /// Overall score, 0 to 100
    pub score: u32,
    pub issues: Vec<ReviewIssue>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ReviewReport {
    pub fn high_severity_issues(&self) -> Vec<&ReviewIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum QaStatus {
    #[serde(rename = "PASS", alias = "pass", alias = "Pass")]
    Pass,
    #[serde(rename = "FAIL", alias = "fail", alias = "Fail")]
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QaBug {
    pub severity: Severity,
    pub issue: String,
    #[serde(default)]
    pub suggestion: String,
}

/// Simulated test report produced by the QA agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QaReport {
    pub status: QaStatus,
    #[serde(default)]
    pub bugs: Vec<QaBug>,
    #[serde(flatten)]
    pub extra: Extra,
}

// ============================================================================
// Validation
// ============================================================================

/// How structurally valid but semantically empty answers are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPolicy {
    /// Accept anything that parses and meets the required contract
    #[default]
    Accept,
    /// Also reject empty lists/headlines and non-hex colors
    RejectEmpty,
}

/// Post-parse checks on a model output.
///
/// The required contract is always enforced; emptiness checks only apply
/// under [`ContentPolicy::RejectEmpty`].
pub trait Validate {
    fn validate(&self, policy: ContentPolicy) -> Result<(), String>;
}

fn hex_color() -> &'static Regex {
    static HEX: OnceLock<Regex> = OnceLock::new();
    HEX.get_or_init(|| {
        Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
            .expect("hex color pattern is valid")
    })
}

/// True for `#rgb`, `#rgba`, `#rrggbb` and `#rrggbbaa`.
pub fn is_hex_color(value: &str) -> bool {
    hex_color().is_match(value.trim())
}

fn require_non_empty(policy: ContentPolicy, field: &str, empty: bool) -> Result<(), String> {
    if policy == ContentPolicy::RejectEmpty && empty {
        return Err(format!("`{}` must not be empty", field));
    }
    Ok(())
}

impl Validate for ProjectBrief {
    fn validate(&self, policy: ContentPolicy) -> Result<(), String> {
        require_non_empty(policy, "summary", self.summary.trim().is_empty())?;
        require_non_empty(policy, "key_features", self.key_features.is_empty())
    }
}

impl Validate for UiDesign {
    fn validate(&self, policy: ContentPolicy) -> Result<(), String> {
        require_non_empty(policy, "colors", self.colors.is_empty())?;
        require_non_empty(policy, "components", self.components.is_empty())?;
        if policy == ContentPolicy::RejectEmpty {
            if let Some(bad) = self.colors.iter().find(|c| !is_hex_color(c)) {
                return Err(format!("color `{}` is not a hex code", bad));
            }
        }
        Ok(())
    }
}

impl Validate for [CodeFile] {
    fn validate(&self, policy: ContentPolicy) -> Result<(), String> {
        require_non_empty(policy, "files", self.is_empty())?;
        let mut seen = HashSet::new();
        for file in self {
            if file.path.trim().is_empty() {
                return Err("file with empty path".to_string());
            }
            if !seen.insert(file.path.as_str()) {
                return Err(format!("duplicate file path `{}`", file.path));
            }
        }
        Ok(())
    }
}

impl Validate for ContentBundle {
    fn validate(&self, policy: ContentPolicy) -> Result<(), String> {
        require_non_empty(policy, "hero_headline", self.hero_headline.trim().is_empty())
    }
}

impl Validate for ReviewReport {
    fn validate(&self, _policy: ContentPolicy) -> Result<(), String> {
        if self.score > 100 {
            return Err(format!("score {} is outside 0-100", self.score));
        }
        Ok(())
    }
}

impl Validate for QaReport {
    fn validate(&self, _policy: ContentPolicy) -> Result<(), String> {
        Ok(())
    }
}
