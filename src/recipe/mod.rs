//! Container recipe synthesis.
//!
//! Each detected framework maps onto a deterministic multi-stage
//! Dockerfile (builder plus minimal runtime, non-root user, explicit
//! port). Synthesis is skipped for services that already carry a
//! Dockerfile. Multi-service workspaces additionally receive a
//! composition manifest and a README, written into the workspace for the
//! artifact uploader.

pub mod compose;
pub mod nextjs;
mod nginx;
mod node;
mod python;
pub mod readme;
mod systems;

use crate::detect::{DetectionResult, Framework, FrameworkKind};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const README_FILE: &str = "BUILD_README.md";

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("failed to write {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: io::Error,
    },
}

/// What `ensure_dockerfile` did for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeOutcome {
    Generated,
    AlreadyPresent,
}

/// Renders the Dockerfile for a framework. Next.js recipes also adjust
/// the service's framework config on disk.
pub fn generate_dockerfile(framework: &Framework, service_dir: &Path) -> String {
    match framework.kind {
        FrameworkKind::NextJs => nextjs::generate(service_dir),
        FrameworkKind::ViteReact
        | FrameworkKind::CreateReactApp
        | FrameworkKind::Express
        | FrameworkKind::NestJs
        | FrameworkKind::Nuxt
        | FrameworkKind::Node => node::generate(framework.kind),
        FrameworkKind::Django
        | FrameworkKind::Flask
        | FrameworkKind::FastApi
        | FrameworkKind::Python => python::generate(framework.kind),
        _ => systems::generate(framework),
    }
}

/// Materialises the service's Dockerfile unless one is already present,
/// plus the nginx config for recipes that serve static assets.
pub fn ensure_dockerfile(
    framework: &Framework,
    service_dir: &Path,
) -> Result<RecipeOutcome, RecipeError> {
    if framework.kind.serves_static() {
        if let Err(e) = nginx::ensure_config(service_dir) {
            warn!(
                service = %framework.service_name(),
                error = %e,
                "could not materialise nginx config"
            );
        }
    }

    let dockerfile_path = service_dir.join("Dockerfile");
    if dockerfile_path.is_file() {
        return Ok(RecipeOutcome::AlreadyPresent);
    }

    let dockerfile = generate_dockerfile(framework, service_dir);
    std::fs::write(&dockerfile_path, dockerfile).map_err(|source| RecipeError::Write {
        file: dockerfile_path.display().to_string(),
        source,
    })?;
    Ok(RecipeOutcome::Generated)
}

/// Writes the composition manifest and README into the workspace root.
pub fn write_composition(
    workspace: &Path,
    result: &DetectionResult,
    namespace: &str,
    project_id: &str,
    build_id: &str,
) -> Result<(), RecipeError> {
    let manifest = compose::generate(result, namespace, project_id, build_id);
    std::fs::write(workspace.join(COMPOSE_FILE), manifest).map_err(|source| {
        RecipeError::Write {
            file: COMPOSE_FILE.to_string(),
            source,
        }
    })?;

    let instructions = readme::generate(result, project_id, build_id);
    std::fs::write(workspace.join(README_FILE), instructions).map_err(|source| {
        RecipeError::Write {
            file: README_FILE.to_string(),
            source,
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn framework(kind: FrameworkKind, path: &str) -> Framework {
        Framework {
            kind,
            name: kind.display_name().to_string(),
            runtime: kind.runtime().to_string(),
            build_cmd: kind.build_cmd().to_string(),
            port: kind.default_port(),
            path: path.to_string(),
        }
    }

    #[test]
    fn existing_dockerfile_is_preserved() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();

        let outcome = ensure_dockerfile(&framework(FrameworkKind::Express, "."), dir.path()).unwrap();
        assert_eq!(outcome, RecipeOutcome::AlreadyPresent);
        assert_eq!(
            fs::read_to_string(dir.path().join("Dockerfile")).unwrap(),
            "FROM scratch\n"
        );
    }

    #[test]
    fn missing_dockerfile_is_generated() {
        let dir = TempDir::new().unwrap();
        let outcome = ensure_dockerfile(&framework(FrameworkKind::Express, "."), dir.path()).unwrap();
        assert_eq!(outcome, RecipeOutcome::Generated);
        let dockerfile = fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
        assert!(dockerfile.contains("FROM node:20-alpine"));
    }

    #[test]
    fn static_service_gets_an_nginx_config() {
        let dir = TempDir::new().unwrap();
        ensure_dockerfile(&framework(FrameworkKind::ViteReact, "."), dir.path()).unwrap();
        assert!(dir.path().join("nginx.conf").is_file());
    }

    #[test]
    fn composition_artifacts_land_in_the_workspace() {
        let dir = TempDir::new().unwrap();
        let result = DetectionResult {
            frameworks: vec![
                framework(FrameworkKind::Express, "apps/api"),
                framework(FrameworkKind::NextJs, "apps/web"),
            ],
            is_monorepo: true,
        };
        write_composition(dir.path(), &result, "obtura", "p1", "b1").unwrap();

        assert!(dir.path().join(COMPOSE_FILE).is_file());
        assert!(dir.path().join(README_FILE).is_file());
        let compose = fs::read_to_string(dir.path().join(COMPOSE_FILE)).unwrap();
        assert!(compose.contains("obtura/p1-web:b1"));
    }

    #[test]
    fn every_kind_produces_a_nonempty_recipe() {
        let dir = TempDir::new().unwrap();
        for kind in [
            FrameworkKind::NextJs,
            FrameworkKind::ViteReact,
            FrameworkKind::Express,
            FrameworkKind::NestJs,
            FrameworkKind::CreateReactApp,
            FrameworkKind::Nuxt,
            FrameworkKind::Node,
            FrameworkKind::Django,
            FrameworkKind::Flask,
            FrameworkKind::FastApi,
            FrameworkKind::Python,
            FrameworkKind::Go,
            FrameworkKind::Laravel,
            FrameworkKind::Php,
            FrameworkKind::Rails,
            FrameworkKind::Ruby,
            FrameworkKind::SpringBoot,
            FrameworkKind::Jvm,
            FrameworkKind::Rust,
        ] {
            let dockerfile = generate_dockerfile(&framework(kind, "."), dir.path());
            assert!(dockerfile.starts_with("FROM "), "{:?} recipe is odd", kind);
            assert!(dockerfile.contains("EXPOSE "), "{:?} has no port", kind);
        }
    }
}
