//! Composition manifest for multi-service workspaces.

use crate::detect::{DetectionResult, Framework};

/// Renders a docker-compose manifest covering every detected service.
/// Frontend services gain `depends_on` edges onto the remaining services
/// so application backends come up first.
pub fn generate(result: &DetectionResult, namespace: &str, project_id: &str, build_id: &str) -> String {
    let backends: Vec<String> = result
        .frameworks
        .iter()
        .filter(|f| !f.kind.is_frontend())
        .map(Framework::service_name)
        .collect();

    let mut out = String::from("version: '3.8'\n\nservices:\n");
    for framework in &result.frameworks {
        let service = framework.service_name();
        out.push_str(&format!("  {}:\n", service));
        out.push_str(&format!(
            "    image: {}\n",
            framework.image_tag(namespace, project_id, build_id)
        ));
        out.push_str("    ports:\n");
        out.push_str(&format!("      - \"{port}:{port}\"\n", port = framework.port));
        out.push_str("    restart: unless-stopped\n");

        if framework.kind.is_frontend() && !backends.is_empty() {
            out.push_str("    depends_on:\n");
            for backend in &backends {
                out.push_str(&format!("      - {}\n", backend));
            }
        }
    }
    out
}
