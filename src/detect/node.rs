//! Node family classification from package.json.

use super::FrameworkKind;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: HashMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: HashMap<String, String>,
    #[serde(default)]
    scripts: HashMap<String, String>,
}

impl PackageJson {
    fn has_dep(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }

    fn script_mentions(&self, needle: &str) -> bool {
        self.scripts.values().any(|cmd| cmd.contains(needle))
    }
}

/// Distinguishes the Node variants by dependency and script inspection.
/// An unreadable manifest still counts as a plain Node service.
pub(super) fn classify(dir: &Path) -> FrameworkKind {
    let manifest = match std::fs::read_to_string(dir.join("package.json")) {
        Ok(raw) => serde_json::from_str::<PackageJson>(&raw).unwrap_or_default(),
        Err(_) => PackageJson::default(),
    };

    if manifest.has_dep("next") || manifest.script_mentions("next build") {
        return FrameworkKind::NextJs;
    }
    if manifest.has_dep("react") && manifest.has_dep("vite") {
        return FrameworkKind::ViteReact;
    }
    if manifest.has_dep("express") {
        return FrameworkKind::Express;
    }
    if manifest.has_dep("@nestjs/core") {
        return FrameworkKind::NestJs;
    }
    if manifest.has_dep("react-scripts") {
        return FrameworkKind::CreateReactApp;
    }
    if manifest.has_dep("nuxt") {
        return FrameworkKind::Nuxt;
    }
    FrameworkKind::Node
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn classify_manifest(json: &str) -> FrameworkKind {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), json).unwrap();
        classify(dir.path())
    }

    #[test]
    fn next_wins_over_react() {
        let kind = classify_manifest(
            r#"{"dependencies":{"next":"14.0.0","react":"18.0.0","react-dom":"18.0.0"}}"#,
        );
        assert_eq!(kind, FrameworkKind::NextJs);
    }

    #[test]
    fn next_detected_from_build_script() {
        let kind = classify_manifest(r#"{"scripts":{"build":"next build"},"dependencies":{}}"#);
        assert_eq!(kind, FrameworkKind::NextJs);
    }

    #[test]
    fn vite_plus_react() {
        let kind = classify_manifest(
            r#"{"dependencies":{"react":"18.0.0"},"devDependencies":{"vite":"5.0.0"}}"#,
        );
        assert_eq!(kind, FrameworkKind::ViteReact);
    }

    #[test]
    fn react_without_vite_is_not_vite() {
        let kind = classify_manifest(r#"{"dependencies":{"react":"18.0.0"}}"#);
        assert_eq!(kind, FrameworkKind::Node);
    }

    #[test]
    fn express_nest_cra_nuxt() {
        assert_eq!(
            classify_manifest(r#"{"dependencies":{"express":"4.18.0"}}"#),
            FrameworkKind::Express
        );
        assert_eq!(
            classify_manifest(r#"{"dependencies":{"@nestjs/core":"10.0.0"}}"#),
            FrameworkKind::NestJs
        );
        assert_eq!(
            classify_manifest(r#"{"dependencies":{"react":"18","react-scripts":"5"}}"#),
            FrameworkKind::CreateReactApp
        );
        assert_eq!(
            classify_manifest(r#"{"dependencies":{"nuxt":"3.0.0"}}"#),
            FrameworkKind::Nuxt
        );
    }

    #[test]
    fn malformed_manifest_falls_back_to_node() {
        assert_eq!(classify_manifest("{not json"), FrameworkKind::Node);
    }
}
