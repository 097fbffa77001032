//! Framework detection over a cloned workspace.
//!
//! Classification is manifest-driven and purely read-only. Candidates are
//! collected at the workspace root and one level deep: the children of
//! recognised mono-repo container directories plus any direct child that
//! carries a manifest of its own. When child services exist, a root
//! manifest is treated as the workspace manifest and not emitted as a
//! service.

mod node;
mod python;
mod systems;

use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Container directories scanned one level deep.
const MONOREPO_CONTAINERS: &[&str] = &["apps", "packages", "services"];

/// Directories never considered as service candidates.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "target",
    "vendor",
    "__pycache__",
];

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("no buildable service found")]
    NoBuildableService,

    #[error("failed to scan workspace: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognised framework families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameworkKind {
    NextJs,
    ViteReact,
    Express,
    NestJs,
    CreateReactApp,
    Nuxt,
    Node,
    Django,
    Flask,
    FastApi,
    Python,
    Go,
    Laravel,
    Php,
    Rails,
    Ruby,
    SpringBoot,
    Jvm,
    Rust,
}

impl FrameworkKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            FrameworkKind::NextJs => "Next.js",
            FrameworkKind::ViteReact => "Vite + React",
            FrameworkKind::Express => "Express.js",
            FrameworkKind::NestJs => "NestJS",
            FrameworkKind::CreateReactApp => "Create React App",
            FrameworkKind::Nuxt => "Nuxt.js",
            FrameworkKind::Node => "Node.js",
            FrameworkKind::Django => "Django",
            FrameworkKind::Flask => "Flask",
            FrameworkKind::FastApi => "FastAPI",
            FrameworkKind::Python => "Python",
            FrameworkKind::Go => "Go",
            FrameworkKind::Laravel => "Laravel",
            FrameworkKind::Php => "PHP",
            FrameworkKind::Rails => "Ruby on Rails",
            FrameworkKind::Ruby => "Ruby",
            FrameworkKind::SpringBoot => "Spring Boot",
            FrameworkKind::Jvm => "Java",
            FrameworkKind::Rust => "Rust",
        }
    }

    pub fn runtime(&self) -> &'static str {
        match self {
            FrameworkKind::NextJs | FrameworkKind::ViteReact => "node:22-alpine",
            FrameworkKind::Express
            | FrameworkKind::NestJs
            | FrameworkKind::CreateReactApp
            | FrameworkKind::Nuxt
            | FrameworkKind::Node => "node:20-alpine",
            FrameworkKind::Django
            | FrameworkKind::Flask
            | FrameworkKind::FastApi
            | FrameworkKind::Python => "python:3.11-slim",
            FrameworkKind::Go => "golang:1.22-alpine",
            FrameworkKind::Laravel | FrameworkKind::Php => "php:8.2-fpm-alpine",
            FrameworkKind::Rails | FrameworkKind::Ruby => "ruby:3.2-alpine",
            FrameworkKind::SpringBoot | FrameworkKind::Jvm => "eclipse-temurin:21-jdk-alpine",
            FrameworkKind::Rust => "rust:1.75-alpine",
        }
    }

    pub fn build_cmd(&self) -> &'static str {
        match self {
            FrameworkKind::NextJs
            | FrameworkKind::ViteReact
            | FrameworkKind::NestJs
            | FrameworkKind::CreateReactApp
            | FrameworkKind::Nuxt => "npm run build",
            FrameworkKind::Express | FrameworkKind::Node => "npm install",
            FrameworkKind::Django
            | FrameworkKind::Flask
            | FrameworkKind::FastApi
            | FrameworkKind::Python => "pip install -r requirements.txt",
            FrameworkKind::Go => "go build",
            FrameworkKind::Laravel | FrameworkKind::Php => "composer install",
            FrameworkKind::Rails | FrameworkKind::Ruby => "bundle install",
            FrameworkKind::SpringBoot | FrameworkKind::Jvm => "mvn clean package",
            FrameworkKind::Rust => "cargo build --release",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            FrameworkKind::ViteReact | FrameworkKind::CreateReactApp => 80,
            FrameworkKind::Django
            | FrameworkKind::FastApi
            | FrameworkKind::Python
            | FrameworkKind::Laravel
            | FrameworkKind::Php => 8000,
            FrameworkKind::Flask => 5000,
            FrameworkKind::Go
            | FrameworkKind::SpringBoot
            | FrameworkKind::Jvm
            | FrameworkKind::Rust => 8080,
            _ => 3000,
        }
    }

    /// Families whose recipe serves static assets through nginx.
    pub fn serves_static(&self) -> bool {
        matches!(self, FrameworkKind::ViteReact | FrameworkKind::CreateReactApp)
    }

    /// Families that render a user-facing frontend; used to order
    /// `depends_on` edges in the composition manifest.
    pub fn is_frontend(&self) -> bool {
        matches!(
            self,
            FrameworkKind::NextJs
                | FrameworkKind::ViteReact
                | FrameworkKind::CreateReactApp
                | FrameworkKind::Nuxt
        )
    }
}

impl fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One buildable service inside the workspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Framework {
    pub kind: FrameworkKind,
    pub name: String,
    pub runtime: String,
    pub build_cmd: String,
    pub port: u16,
    /// Relative path inside the workspace; `.` for the root.
    pub path: String,
}

impl Framework {
    fn at(kind: FrameworkKind, path: &str) -> Self {
        Self {
            kind,
            name: kind.display_name().to_string(),
            runtime: kind.runtime().to_string(),
            build_cmd: kind.build_cmd().to_string(),
            port: kind.default_port(),
            path: path.to_string(),
        }
    }

    /// Logical service identifier derived from the service path.
    pub fn service_name(&self) -> String {
        normalize_service_name(&self.path)
    }

    /// Full registry reference for this service's image.
    pub fn image_tag(&self, namespace: &str, project_id: &str, build_id: &str) -> String {
        format!(
            "{}/{}-{}:{}",
            namespace,
            project_id,
            self.service_name(),
            build_id
        )
    }
}

/// Outcome of a detection pass. `is_monorepo` holds exactly when more
/// than one service was classified.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub frameworks: Vec<Framework>,
    #[serde(rename = "isMonorepo")]
    pub is_monorepo: bool,
}

/// Scans the workspace and classifies every buildable service.
pub fn detect_services(root: &Path) -> Result<DetectionResult, DetectError> {
    let mut frameworks = Vec::new();

    for container in MONOREPO_CONTAINERS {
        let dir = root.join(container);
        if !dir.is_dir() {
            continue;
        }
        for child in sorted_subdirs(&dir)? {
            let name = child.file_name().unwrap_or_default().to_string_lossy();
            if let Some(kind) = classify_dir(&child) {
                frameworks.push(Framework::at(kind, &format!("{}/{}", container, name)));
            }
        }
    }

    for child in sorted_subdirs(root)? {
        let name = child
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        if MONOREPO_CONTAINERS.contains(&name.as_str()) {
            continue;
        }
        if let Some(kind) = classify_dir(&child) {
            frameworks.push(Framework::at(kind, &name));
        }
    }

    if frameworks.is_empty() {
        if let Some(kind) = classify_dir(root) {
            frameworks.push(Framework::at(kind, "."));
        }
    }

    if frameworks.is_empty() {
        return Err(DetectError::NoBuildableService);
    }

    frameworks.sort_by(|a, b| a.path.cmp(&b.path));
    let is_monorepo = frameworks.len() > 1;
    Ok(DetectionResult {
        frameworks,
        is_monorepo,
    })
}

/// Classifies one directory by manifest presence. Family order follows the
/// manifest precedence: Node, Python, Go, PHP, Ruby, JVM, Rust.
fn classify_dir(dir: &Path) -> Option<FrameworkKind> {
    if dir.join("package.json").is_file() {
        return Some(node::classify(dir));
    }
    if dir.join("requirements.txt").is_file() || dir.join("Pipfile").is_file() {
        return Some(python::classify(dir));
    }
    systems::classify(dir)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<std::path::PathBuf>, std::io::Error> {
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || SKIP_DIRS.contains(&name.as_str()) {
            continue;
        }
        subdirs.push(path);
    }
    subdirs.sort();
    Ok(subdirs)
}

/// Maps a service path onto a registry-safe service name. The workspace
/// root maps to `app`.
pub fn normalize_service_name(path: &str) -> String {
    if path == "." || path.is_empty() {
        return "app".to_string();
    }
    let last = path.rsplit('/').next().unwrap_or(path);
    let mut name: String = last
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while name.contains("--") {
        name = name.replace("--", "-");
    }
    name.trim_matches('-').to_string()
}
