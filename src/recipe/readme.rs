//! Human-readable deploy instructions for multi-service builds.

use crate::detect::DetectionResult;

pub fn generate(result: &DetectionResult, project_id: &str, build_id: &str) -> String {
    let mut out = String::new();
    out.push_str("# Build Artifacts\n\n");
    out.push_str(&format!(
        "Build `{}` of project `{}` produced {} service image(s).\n\n",
        build_id,
        project_id,
        result.frameworks.len()
    ));

    out.push_str("## Services\n\n");
    out.push_str("| Service | Framework | Path | Port |\n");
    out.push_str("|---------|-----------|------|------|\n");
    for framework in &result.frameworks {
        out.push_str(&format!(
            "| {} | {} | `{}` | {} |\n",
            framework.service_name(),
            framework.name,
            framework.path,
            framework.port
        ));
    }

    out.push_str("\n## Running the stack\n\n");
    out.push_str("All images are already pushed to the registry. Start every service with:\n\n");
    out.push_str("```sh\ndocker compose up -d\n```\n\n");
    out.push_str(
        "Environment files were materialised per service during the build; \
         set the same variables in your deployment environment before starting.\n\n",
    );
    out.push_str("Stop and remove the stack with:\n\n");
    out.push_str("```sh\ndocker compose down\n```\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Framework, FrameworkKind};

    #[test]
    fn lists_every_service_and_the_compose_commands() {
        let result = DetectionResult {
            frameworks: vec![
                Framework {
                    kind: FrameworkKind::Express,
                    name: "Express.js".to_string(),
                    runtime: "node:20-alpine".to_string(),
                    build_cmd: "npm install".to_string(),
                    port: 3000,
                    path: "apps/api".to_string(),
                },
                Framework {
                    kind: FrameworkKind::NextJs,
                    name: "Next.js".to_string(),
                    runtime: "node:22-alpine".to_string(),
                    build_cmd: "npm run build".to_string(),
                    port: 3000,
                    path: "apps/web".to_string(),
                },
            ],
            is_monorepo: true,
        };
        let readme = generate(&result, "p1", "b1");
        assert!(readme.contains("| api | Express.js |"));
        assert!(readme.contains("| web | Next.js |"));
        assert!(readme.contains("docker compose up -d"));
        assert!(readme.contains("2 service image(s)"));
    }
}
