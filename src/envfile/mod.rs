//! Per-service environment file materialisation.
//!
//! Encrypted records are decrypted with the process-wide key and written
//! as `.env` files next to the service they belong to. The record's
//! service name is matched against detected services exactly first, then
//! by substring as a last resort; `shared` always means the workspace
//! root.

pub mod crypto;
pub mod validate;

use crate::detect::Framework;
use crate::store::EnvRecord;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SHARED_SERVICE: &str = "shared";

/// A decrypted env record ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub service_name: String,
    pub content: String,
}

/// Decrypts every record, dropping (with a warning) those that fail.
pub fn decrypt_records(records: &[EnvRecord], key: &[u8; crypto::KEY_LEN]) -> Vec<EnvConfig> {
    let mut configs = Vec::with_capacity(records.len());
    for record in records {
        match crypto::decrypt_env_content(&record.env_content, key) {
            Ok(content) => configs.push(EnvConfig {
                service_name: record.service_name.clone(),
                content,
            }),
            Err(e) => {
                warn!(service = %record.service_name, error = %e, "failed to decrypt env record");
            }
        }
    }
    configs
}

/// What happened to each record during the write pass.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Record service name and the path its `.env` landed at.
    pub written: Vec<(String, PathBuf)>,
    /// Records that matched no detected service.
    pub skipped: Vec<String>,
}

/// Writes `.env` files for every config, mapping records onto detected
/// service directories. Parent directories are created as needed and
/// files land with mode 0644.
pub fn write_env_files(
    workspace: &Path,
    configs: &[EnvConfig],
    frameworks: &[Framework],
) -> io::Result<WriteOutcome> {
    let service_paths: BTreeMap<String, &str> = frameworks
        .iter()
        .map(|f| (f.service_name(), f.path.as_str()))
        .collect();

    let mut outcome = WriteOutcome::default();
    for config in configs {
        let target = if config.service_name == SHARED_SERVICE {
            Some(workspace.join(".env"))
        } else if let Some(path) = service_paths.get(&config.service_name) {
            Some(service_env_path(workspace, path))
        } else {
            service_paths
                .iter()
                .find(|(name, _)| {
                    name.contains(&config.service_name)
                        || config.service_name.contains(name.as_str())
                })
                .map(|(_, path)| service_env_path(workspace, path))
        };

        match target {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &config.content)?;
                set_world_readable(&path)?;
                outcome.written.push((config.service_name.clone(), path));
            }
            None => {
                warn!(service = %config.service_name, "no matching service for env record");
                outcome.skipped.push(config.service_name.clone());
            }
        }
    }
    Ok(outcome)
}

fn service_env_path(workspace: &Path, service_path: &str) -> PathBuf {
    if service_path == "." {
        workspace.join(".env")
    } else {
        workspace.join(service_path).join(".env")
    }
}

#[cfg(unix)]
fn set_world_readable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_world_readable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FrameworkKind;
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

    fn config(service: &str, content: &str) -> EnvConfig {
        EnvConfig {
            service_name: service.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn shared_record_lands_at_the_workspace_root() {
        let dir = TempDir::new().unwrap();
        let frameworks = vec![framework(FrameworkKind::NextJs, "apps/web")];
        let outcome = write_env_files(
            dir.path(),
            &[config("shared", "COMMON=1\n")],
            &frameworks,
        )
        .unwrap();

        assert_eq!(outcome.written.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".env")).unwrap(),
            "COMMON=1\n"
        );
    }

    #[test]
    fn exact_match_lands_in_the_service_directory() {
        let dir = TempDir::new().unwrap();
        let frameworks = vec![framework(FrameworkKind::NextJs, "apps/web")];
        write_env_files(
            dir.path(),
            &[config("web", "NEXT_PUBLIC_API=https://a\n")],
            &frameworks,
        )
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("apps/web/.env")).unwrap(),
            "NEXT_PUBLIC_API=https://a\n"
        );
    }

    #[test]
    fn substring_match_is_a_last_resort() {
        let dir = TempDir::new().unwrap();
        let frameworks = vec![framework(FrameworkKind::Express, "apps/api-server")];
        let outcome =
            write_env_files(dir.path(), &[config("api", "PORT=3000\n")], &frameworks).unwrap();

        assert_eq!(outcome.written.len(), 1);
        assert!(dir.path().join("apps/api-server/.env").is_file());
    }

    #[test]
    fn unmatched_record_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let frameworks = vec![framework(FrameworkKind::NextJs, "apps/web")];
        let outcome =
            write_env_files(dir.path(), &[config("billing", "X=1\n")], &frameworks).unwrap();

        assert!(outcome.written.is_empty());
        assert_eq!(outcome.skipped, vec!["billing".to_string()]);
    }

    #[test]
    fn root_service_env_goes_to_workspace_env() {
        let dir = TempDir::new().unwrap();
        let frameworks = vec![framework(FrameworkKind::NextJs, ".")];
        write_env_files(dir.path(), &[config("app", "A=1\n")], &frameworks).unwrap();
        assert!(dir.path().join(".env").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn env_files_are_written_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let frameworks = vec![framework(FrameworkKind::NextJs, ".")];
        write_env_files(dir.path(), &[config("shared", "A=1\n")], &frameworks).unwrap();
        let mode = std::fs::metadata(dir.path().join(".env"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn decrypt_records_round_trips_through_the_store_shape() {
        use crate::store::EnvRecord;
        let key = [9u8; crypto::KEY_LEN];
        let records = vec![
            EnvRecord {
                service_name: "web".to_string(),
                env_content: crypto::encrypt_env_content("NEXT_PUBLIC_API=https://a\n", &key, [1u8; 12]),
            },
            EnvRecord {
                service_name: "broken".to_string(),
                env_content: "not-even-base64!!!".to_string(),
            },
        ];

        let configs = decrypt_records(&records, &key);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].service_name, "web");
        assert_eq!(configs[0].content, "NEXT_PUBLIC_API=https://a\n");
    }
}
