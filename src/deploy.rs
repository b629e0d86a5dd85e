//! Deployment dispatcher.
//!
//! Given a built project directory and one target identifier, produce a
//! publicly reachable URL or fail distinctly per target. Only the Vercel and
//! Netlify routines are real (provider CLI subprocess + URL extraction from
//! its output); every other supported target is an acknowledged stub that
//! returns a canned placeholder URL; callers must not treat those URLs as
//! genuine deployments.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::DeploymentSettings;
use crate::idea::{DeploymentTarget, UnsupportedTarget};

static VERCEL_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://[a-zA-Z0-9.-]+\.vercel\.app").expect("valid regex"));
static NETLIFY_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://[a-zA-Z0-9.-]+\.netlify\.app").expect("valid regex"));

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedTarget),
    #[error("command `{command}` failed with {status}: {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },
    #[error("could not extract deployment URL from {provider} output")]
    NoUrl { provider: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ─── Framework detection ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    NextJs,
    React,
    Vue,
    Angular,
    Express,
    NestJs,
    Static,
    Unknown,
}

/// Dependency-name markers checked in order against the package manifest.
const FRAMEWORK_MARKERS: &[(&str, Framework)] = &[
    ("next", Framework::NextJs),
    ("react", Framework::React),
    ("vue", Framework::Vue),
    ("angular", Framework::Angular),
    ("express", Framework::Express),
    ("@nestjs/core", Framework::NestJs),
];

impl Framework {
    pub fn as_str(self) -> &'static str {
        match self {
            Framework::NextJs => "nextjs",
            Framework::React => "react",
            Framework::Vue => "vue",
            Framework::Angular => "angular",
            Framework::Express => "express",
            Framework::NestJs => "nestjs",
            Framework::Static => "static",
            Framework::Unknown => "unknown",
        }
    }

    /// Static sites and unrecognized projects skip the build step entirely.
    pub fn needs_build(self) -> bool {
        !matches!(self, Framework::Static | Framework::Unknown)
    }

    /// Directory handed to `netlify deploy --dir`.
    pub fn publish_dir(self) -> &'static str {
        match self {
            Framework::NextJs => ".next",
            Framework::Vue | Framework::Angular => "dist",
            _ => "build",
        }
    }
}

/// Inspect well-known manifest files to classify the project.
///
/// Absent a `package.json`, an `index.html` marks a static site; anything
/// else is unknown.
pub fn detect_framework(project_dir: &Path) -> Framework {
    let manifest = project_dir.join("package.json");
    if manifest.exists() {
        let deps = read_dependency_names(&manifest);
        for (marker, framework) in FRAMEWORK_MARKERS {
            if deps.contains_key(*marker) {
                return *framework;
            }
        }
    }
    if project_dir.join("index.html").exists() {
        return Framework::Static;
    }
    Framework::Unknown
}

fn read_dependency_names(manifest: &Path) -> HashMap<String, serde_json::Value> {
    let parsed: serde_json::Value = std::fs::read_to_string(manifest)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();

    let mut deps = HashMap::new();
    for key in ["dependencies", "devDependencies"] {
        if let Some(map) = parsed.get(key).and_then(|v| v.as_object()) {
            for (name, version) in map {
                deps.insert(name.clone(), version.clone());
            }
        }
    }
    deps
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

pub struct DeploymentDispatcher {
    settings: DeploymentSettings,
}

impl DeploymentDispatcher {
    pub fn new(settings: DeploymentSettings) -> Self {
        Self { settings }
    }

    /// Deploy `project_dir` to one target, returning the deployment URL.
    ///
    /// Unknown identifiers fail with [`UnsupportedTarget`]; supported but
    /// unimplemented targets return their placeholder immediately, without
    /// packaging; there is nothing real to deploy. No retries at this layer.
    pub async fn deploy(&self, project_dir: &Path, target: &str) -> Result<String, DeployError> {
        let target: DeploymentTarget = target.parse()?;
        info!(%target, dir = %project_dir.display(), "deploying");

        match target {
            DeploymentTarget::Vercel => {
                let framework = self.package(project_dir).await?;
                self.deploy_vercel(project_dir, framework).await
            }
            DeploymentTarget::Netlify => {
                let framework = self.package(project_dir).await?;
                self.deploy_netlify(project_dir, framework).await
            }
            stub => {
                let url = placeholder_url(stub);
                warn!(target = %stub, %url, "deployment routine is a stub; placeholder URL");
                Ok(url)
            }
        }
    }

    /// Package the project: install dependencies, then a framework-appropriate
    /// build. A failure here aborts the target; no artifact exists to deploy.
    async fn package(&self, project_dir: &Path) -> Result<Framework, DeployError> {
        let framework = detect_framework(project_dir);
        info!(framework = framework.as_str(), "packaging application");

        run_checked("npm", &["install"], project_dir).await?;
        if framework.needs_build() {
            run_checked("npm", &["run", "build"], project_dir).await?;
        }
        Ok(framework)
    }

    async fn deploy_vercel(
        &self,
        project_dir: &Path,
        _framework: Framework,
    ) -> Result<String, DeployError> {
        run_checked("npm", &["install", "-g", "vercel"], project_dir).await?;
        let output = self.run_provider("vercel", &["--prod"], project_dir).await?;
        extract_url(&VERCEL_URL, &output, "vercel")
    }

    async fn deploy_netlify(
        &self,
        project_dir: &Path,
        framework: Framework,
    ) -> Result<String, DeployError> {
        run_checked("npm", &["install", "-g", "netlify-cli"], project_dir).await?;
        let output = self
            .run_provider(
                "netlify",
                &["deploy", "--dir", framework.publish_dir(), "--prod"],
                project_dir,
            )
            .await?;
        extract_url(&NETLIFY_URL, &output, "netlify")
    }

    /// Provider CLIs pick up credentials from the environment (VERCEL_TOKEN,
    /// NETLIFY_AUTH_TOKEN, …); the configured credential map is injected
    /// uppercased into each provider subprocess.
    async fn run_provider(
        &self,
        command: &str,
        args: &[&str],
        cwd: &Path,
    ) -> Result<String, DeployError> {
        let envs: Vec<(String, String)> = self
            .settings
            .credentials
            .iter()
            .map(|(k, v)| (k.to_uppercase(), v.clone()))
            .collect();
        run_with_env(command, args, cwd, &envs).await
    }
}

fn extract_url(pattern: &Regex, output: &str, provider: &'static str) -> Result<String, DeployError> {
    pattern
        .find(output)
        .map(|m| m.as_str().to_string())
        .ok_or(DeployError::NoUrl { provider })
}

/// Fixed placeholder URLs for the unimplemented provider routines.
fn placeholder_url(target: DeploymentTarget) -> String {
    let tag = match target {
        DeploymentTarget::DigitalOcean => "digitalocean",
        DeploymentTarget::GithubPages => "github-pages",
        other => other.as_str(),
    };
    format!("https://example-{tag}-deployment.com")
}

/// Run a subprocess to completion, combining stdout and stderr. Non-zero exit
/// fails with the combined output attached.
async fn run_checked(command: &str, args: &[&str], cwd: &Path) -> Result<String, DeployError> {
    run_with_env(command, args, cwd, &[]).await
}

async fn run_with_env(
    command: &str,
    args: &[&str],
    cwd: &Path,
    envs: &[(String, String)],
) -> Result<String, DeployError> {
    let output = Command::new(command)
        .args(args)
        .current_dir(cwd)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .output()
        .await?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(combined)
    } else {
        Err(DeployError::CommandFailed {
            command: format!("{command} {}", args.join(" ")),
            status: output.status.to_string(),
            output: combined,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
