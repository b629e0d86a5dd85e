//! Idea input model: deserialization, validation, and the closed enums for
//! application types and deployment targets.
//!
//! Deserialization is deliberately lenient (every field defaulted) so that a
//! malformed idea reaches [`Idea::validate`] and fails with a message naming
//! the offending field, instead of dying inside serde before the run has a
//! chance to report anything.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Enums ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    WebApp,
    MobileApp,
    DesktopApp,
    Api,
    CliTool,
    Library,
    Other,
}

impl ApplicationType {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationType::WebApp => "web_app",
            ApplicationType::MobileApp => "mobile_app",
            ApplicationType::DesktopApp => "desktop_app",
            ApplicationType::Api => "api",
            ApplicationType::CliTool => "cli_tool",
            ApplicationType::Library => "library",
            ApplicationType::Other => "other",
        }
    }

    /// Human-readable form for prompts: `web_app` → `Web App`.
    pub fn humanized(self) -> String {
        self.as_str()
            .split('_')
            .map(|w| {
                let mut c = w.chars();
                match c.next() {
                    Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentTarget {
    Vercel,
    Netlify,
    Aws,
    Azure,
    Gcp,
    Heroku,
    DigitalOcean,
    GithubPages,
    Custom,
}

impl DeploymentTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentTarget::Vercel => "vercel",
            DeploymentTarget::Netlify => "netlify",
            DeploymentTarget::Aws => "aws",
            DeploymentTarget::Azure => "azure",
            DeploymentTarget::Gcp => "gcp",
            DeploymentTarget::Heroku => "heroku",
            DeploymentTarget::DigitalOcean => "digital_ocean",
            DeploymentTarget::GithubPages => "github_pages",
            DeploymentTarget::Custom => "custom",
        }
    }
}

impl std::fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown target identifiers are rejected distinctly from supported targets
/// whose backend routine happens to be a stub.
#[derive(Debug, Error, PartialEq)]
#[error("unsupported deployment target: {0}")]
pub struct UnsupportedTarget(pub String);

impl FromStr for DeploymentTarget {
    type Err = UnsupportedTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vercel" => Ok(DeploymentTarget::Vercel),
            "netlify" => Ok(DeploymentTarget::Netlify),
            "aws" => Ok(DeploymentTarget::Aws),
            "azure" => Ok(DeploymentTarget::Azure),
            "gcp" => Ok(DeploymentTarget::Gcp),
            "heroku" => Ok(DeploymentTarget::Heroku),
            "digital_ocean" => Ok(DeploymentTarget::DigitalOcean),
            "github_pages" => Ok(DeploymentTarget::GithubPages),
            "custom" => Ok(DeploymentTarget::Custom),
            other => Err(UnsupportedTarget(other.to_string())),
        }
    }
}

// ─── Idea input ──────────────────────────────────────────────────────────────

/// Raw idea as submitted over the wire (CLI file or HTTP body).
///
/// Deployment targets stay as strings in submitted order; they are parsed
/// per-target at dispatch time, so an unsupported identifier is a per-target
/// deployment failure rather than an ingestion failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub application_type: Option<ApplicationType>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "deploymentTargets")]
    pub deployment_target: Vec<String>,
    #[serde(default)]
    pub deployment_settings: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Error, PartialEq)]
pub enum IdeaError {
    #[error("idea name must be a non-empty string")]
    MissingName,
    #[error("idea description must be a non-empty string")]
    MissingDescription,
    #[error("idea applicationType is required")]
    MissingApplicationType,
    #[error("idea features must contain at least one entry")]
    EmptyFeatures,
}

/// A validated idea. Constructed once at ingestion, immutable for the rest
/// of the run.
#[derive(Debug, Clone, Serialize)]
pub struct Idea {
    pub name: String,
    pub title: String,
    pub description: String,
    pub application_type: ApplicationType,
    pub features: Vec<String>,
    pub technologies: Vec<String>,
    pub dependencies: Vec<String>,
    /// Submitted order is dispatch order.
    pub deployment_targets: Vec<String>,
    pub deployment_settings: HashMap<String, serde_json::Value>,
}

impl Idea {
    /// Structural validation of a raw idea.
    ///
    /// Policy: `features` must be non-empty. The legacy lenient path that
    /// accepted an empty feature list is gone.
    pub fn validate(input: IdeaInput) -> Result<Self, IdeaError> {
        if input.name.trim().is_empty() {
            return Err(IdeaError::MissingName);
        }
        if input.description.trim().is_empty() {
            return Err(IdeaError::MissingDescription);
        }
        let application_type = input
            .application_type
            .ok_or(IdeaError::MissingApplicationType)?;
        if input.features.is_empty() {
            return Err(IdeaError::EmptyFeatures);
        }

        let title = match input.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => input.name.clone(),
        };

        Ok(Idea {
            name: input.name,
            title,
            description: input.description,
            application_type,
            features: input.features,
            technologies: input.technologies,
            dependencies: input.dependencies,
            deployment_targets: input.deployment_target,
            deployment_settings: input.deployment_settings,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
