//! Go, PHP, Ruby, JVM and Rust classification.

use super::FrameworkKind;
use std::path::Path;

pub(super) fn classify(dir: &Path) -> Option<FrameworkKind> {
    if dir.join("go.mod").is_file() {
        return Some(FrameworkKind::Go);
    }
    if dir.join("composer.json").is_file() {
        return Some(classify_php(dir));
    }
    if dir.join("Gemfile").is_file() {
        return Some(classify_ruby(dir));
    }
    if dir.join("pom.xml").is_file() || dir.join("build.gradle").is_file() {
        return Some(classify_jvm(dir));
    }
    if dir.join("Cargo.toml").is_file() {
        return Some(FrameworkKind::Rust);
    }
    None
}

fn classify_php(dir: &Path) -> FrameworkKind {
    match std::fs::read_to_string(dir.join("composer.json")) {
        Ok(content) if content.contains("laravel/framework") => FrameworkKind::Laravel,
        _ => FrameworkKind::Php,
    }
}

fn classify_ruby(dir: &Path) -> FrameworkKind {
    match std::fs::read_to_string(dir.join("Gemfile")) {
        Ok(content)
            if content.lines().any(|l| {
                l.trim_start().starts_with("gem")
                    && (l.contains("'rails'") || l.contains("\"rails\""))
            }) =>
        {
            FrameworkKind::Rails
        }
        _ => FrameworkKind::Ruby,
    }
}

fn classify_jvm(dir: &Path) -> FrameworkKind {
    for manifest in ["pom.xml", "build.gradle"] {
        if let Ok(content) = std::fs::read_to_string(dir.join(manifest)) {
            if content.contains("spring-boot") || content.contains("org.springframework.boot") {
                return FrameworkKind::SpringBoot;
            }
        }
    }
    FrameworkKind::Jvm
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn go_module() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/svc\n").unwrap();
        assert_eq!(classify(dir.path()), Some(FrameworkKind::Go));
    }

    #[test]
    fn laravel_markers_in_composer() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("composer.json"),
            r#"{"require":{"laravel/framework":"^11.0"}}"#,
        )
        .unwrap();
        assert_eq!(classify(dir.path()), Some(FrameworkKind::Laravel));
    }

    #[test]
    fn plain_composer_is_generic_php() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("composer.json"), r#"{"require":{}}"#).unwrap();
        assert_eq!(classify(dir.path()), Some(FrameworkKind::Php));
    }

    #[test]
    fn rails_markers_in_gemfile() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Gemfile"),
            "source 'https://rubygems.org'\ngem 'rails', '~> 7.1'\n",
        )
        .unwrap();
        assert_eq!(classify(dir.path()), Some(FrameworkKind::Rails));
    }

    #[test]
    fn spring_boot_from_pom() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pom.xml"),
            "<project><parent><artifactId>spring-boot-starter-parent</artifactId></parent></project>",
        )
        .unwrap();
        assert_eq!(classify(dir.path()), Some(FrameworkKind::SpringBoot));
    }

    #[test]
    fn gradle_without_markers_is_generic_jvm() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.gradle"), "plugins { id 'java' }\n").unwrap();
        assert_eq!(classify(dir.path()), Some(FrameworkKind::Jvm));
    }

    #[test]
    fn cargo_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"svc\"\n").unwrap();
        assert_eq!(classify(dir.path()), Some(FrameworkKind::Rust));
    }

    #[test]
    fn nothing_recognised() {
        let dir = TempDir::new().unwrap();
        assert_eq!(classify(dir.path()), None);
    }
}
