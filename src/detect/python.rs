//! Python family classification from requirements.txt or Pipfile.

use super::FrameworkKind;
use std::path::Path;

pub(super) fn classify(dir: &Path) -> FrameworkKind {
    let mut deps = String::new();
    for manifest in ["requirements.txt", "Pipfile"] {
        if let Ok(content) = std::fs::read_to_string(dir.join(manifest)) {
            deps.push_str(&content.to_lowercase());
            deps.push('\n');
        }
    }

    if deps.contains("django") || dir.join("manage.py").is_file() {
        FrameworkKind::Django
    } else if deps.contains("fastapi") {
        FrameworkKind::FastApi
    } else if deps.contains("flask") {
        FrameworkKind::Flask
    } else {
        FrameworkKind::Python
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn classify_requirements(content: &str) -> FrameworkKind {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), content).unwrap();
        classify(dir.path())
    }

    #[test]
    fn django_from_requirements() {
        assert_eq!(
            classify_requirements("Django==5.0\npsycopg2-binary==2.9\n"),
            FrameworkKind::Django
        );
    }

    #[test]
    fn django_from_manage_py() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "gunicorn\n").unwrap();
        fs::write(dir.path().join("manage.py"), "#!/usr/bin/env python\n").unwrap();
        assert_eq!(classify(dir.path()), FrameworkKind::Django);
    }

    #[test]
    fn fastapi_and_flask() {
        assert_eq!(
            classify_requirements("fastapi==0.110\nuvicorn\n"),
            FrameworkKind::FastApi
        );
        assert_eq!(
            classify_requirements("Flask==3.0\ngunicorn\n"),
            FrameworkKind::Flask
        );
    }

    #[test]
    fn plain_python_otherwise() {
        assert_eq!(classify_requirements("requests==2.31\n"), FrameworkKind::Python);
    }

    #[test]
    fn pipfile_is_also_consulted() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Pipfile"),
            "[packages]\nflask = \"*\"\n",
        )
        .unwrap();
        assert_eq!(classify(dir.path()), FrameworkKind::Flask);
    }
}
