//! Required-variable validation for Next.js services.
//!
//! A Next.js build bakes `NEXT_PUBLIC_*` values into the client bundle,
//! so a missing variable surfaces as a broken deployment rather than a
//! build failure. This validator fails the build up front instead. The
//! required set is extracted from the first strategy that yields
//! anything: `.env.example`, known env-validation files, `package.json`
//! scripts, then the Next.js config. When nothing can be extracted the
//! build proceeds with a warning.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

const VALIDATION_FILES: &[&str] = &[
    "env.mjs",
    "env.js",
    "env.ts",
    "src/env.mjs",
    "src/env.js",
    "src/env.ts",
    "lib/env.ts",
    "config/env.ts",
];

const VALIDATION_FILE_CAP: u64 = 100 * 1024;
const SMALL_FILE_CAP: u64 = 50 * 1024;

const PUBLIC_PREFIX: &str = "NEXT_PUBLIC_";

/// Result of validating one Next.js service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValidation {
    /// Every required variable is present in the written `.env`.
    Satisfied { required: Vec<String> },
    /// At least one required variable is absent.
    Missing(Vec<String>),
    /// No strategy could determine the required set.
    Undetermined,
}

/// Validates a Next.js service directory against its written `.env`.
pub fn validate_service(service_dir: &Path) -> EnvValidation {
    let required = required_variables(service_dir);
    if required.is_empty() {
        return EnvValidation::Undetermined;
    }

    let provided = provided_variables(&service_dir.join(".env"));
    let missing: Vec<String> = required
        .iter()
        .filter(|var| !provided.contains(*var))
        .cloned()
        .collect();

    if missing.is_empty() {
        EnvValidation::Satisfied { required }
    } else {
        EnvValidation::Missing(missing)
    }
}

/// Extracts the required variable set, trying each strategy in order and
/// accepting the first non-empty result.
pub fn required_variables(service_dir: &Path) -> Vec<String> {
    let strategies: [fn(&Path) -> Vec<String>; 4] = [
        from_env_example,
        from_validation_files,
        from_package_scripts,
        from_next_config,
    ];
    for strategy in strategies {
        let vars = strategy(service_dir);
        if !vars.is_empty() {
            return vars;
        }
    }
    Vec::new()
}

fn from_env_example(service_dir: &Path) -> Vec<String> {
    let content = match read_capped(&service_dir.join(".env.example"), u64::MAX) {
        Some(content) => content,
        None => return Vec::new(),
    };

    let mut vars = BTreeSet::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let key = line.split('=').next().unwrap_or("").trim();
        if key.starts_with(PUBLIC_PREFIX) {
            vars.insert(key.to_string());
        }
    }
    vars.into_iter().collect()
}

fn from_validation_files(service_dir: &Path) -> Vec<String> {
    let re = public_var_regex();
    let mut vars = BTreeSet::new();
    for file in VALIDATION_FILES {
        if let Some(content) = read_capped(&service_dir.join(file), VALIDATION_FILE_CAP) {
            for m in re.find_iter(&content) {
                vars.insert(m.as_str().to_string());
            }
        }
    }
    vars.into_iter().collect()
}

fn from_package_scripts(service_dir: &Path) -> Vec<String> {
    let content = match read_capped(&service_dir.join("package.json"), SMALL_FILE_CAP) {
        Some(content) => content,
        None => return Vec::new(),
    };
    let manifest: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(_) => return Vec::new(),
    };

    let re = public_var_regex();
    let mut vars = BTreeSet::new();
    if let Some(scripts) = manifest.get("scripts").and_then(|s| s.as_object()) {
        for script in scripts.values().filter_map(|v| v.as_str()) {
            for m in re.find_iter(script) {
                vars.insert(m.as_str().to_string());
            }
        }
    }
    vars.into_iter().collect()
}

fn from_next_config(service_dir: &Path) -> Vec<String> {
    let re = Regex::new(r"process\.env\.(NEXT_PUBLIC_[A-Z0-9_]+)").unwrap();
    let mut vars = BTreeSet::new();
    for file in ["next.config.js", "next.config.mjs", "next.config.ts"] {
        if let Some(content) = read_capped(&service_dir.join(file), SMALL_FILE_CAP) {
            for captures in re.captures_iter(&content) {
                vars.insert(captures[1].to_string());
            }
        }
    }
    vars.into_iter().collect()
}

/// Keys present in a written `.env` file.
fn provided_variables(env_path: &Path) -> BTreeSet<String> {
    let mut provided = BTreeSet::new();
    if let Ok(content) = std::fs::read_to_string(env_path) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(key) = line.split('=').next() {
                provided.insert(key.trim().to_string());
            }
        }
    }
    provided
}

fn public_var_regex() -> Regex {
    Regex::new(r"NEXT_PUBLIC_[A-Z0-9_]+").unwrap()
}

fn read_capped(path: &Path, cap: u64) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() > cap {
        return None;
    }
    std::fs::read_to_string(path).ok()
}
