//! Next.js recipe with standalone-output handling.
//!
//! Next.js only emits the self-contained `.next/standalone` server when its
//! config asks for it, so synthesis first rewrites the user's config file
//! to request standalone output. The transformation is total and
//! idempotent: running it twice leaves the file byte-identical.

use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const CONFIG_FILES: &[&str] = &["next.config.js", "next.config.mjs", "next.config.ts"];

const DEFAULT_CONFIG: &str = r#"/** @type {import('next').NextConfig} */
const nextConfig = {
  output: 'standalone',
}

module.exports = nextConfig
"#;

/// How the config file ended up requesting standalone output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandaloneOutcome {
    /// `output: 'standalone'` was already present.
    AlreadyConfigured,
    /// An existing config file was rewritten.
    Updated,
    /// No config file existed; a minimal one was created.
    Created,
}

/// Rewrites (or creates) the Next.js config so the build emits standalone
/// output.
pub fn ensure_standalone_output(service_dir: &Path) -> io::Result<StandaloneOutcome> {
    let config_path = CONFIG_FILES
        .iter()
        .map(|name| service_dir.join(name))
        .find(|path| path.is_file());

    let config_path: PathBuf = match config_path {
        Some(path) => path,
        None => {
            let path = service_dir.join("next.config.js");
            std::fs::write(&path, DEFAULT_CONFIG)?;
            return Ok(StandaloneOutcome::Created);
        }
    };

    let content = std::fs::read_to_string(&config_path)?;
    let ext = config_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("js");

    let (updated, changed) = apply_standalone(&content, ext);
    if !changed {
        return Ok(StandaloneOutcome::AlreadyConfigured);
    }
    std::fs::write(&config_path, updated)?;
    Ok(StandaloneOutcome::Updated)
}

/// Applies `output: 'standalone'` to a Next.js config source, trying in
/// order: no-op when present, rewrite of another `output` value, insertion
/// into a recognised config-object literal, spreading an exported
/// variable, and finally appending a fresh export.
///
/// Returns the resulting source and whether it differs from the input.
pub fn apply_standalone(content: &str, ext: &str) -> (String, bool) {
    let already = Regex::new(r#"output:\s*['"`]standalone['"`]"#).unwrap();
    if already.is_match(content) {
        return (content.to_string(), false);
    }

    let other_output = Regex::new(r#"(output:\s*)['"`][^'"`]+['"`]"#).unwrap();
    if other_output.is_match(content) {
        let updated = other_output
            .replace(content, "${1}'standalone'")
            .into_owned();
        return (updated, true);
    }

    let literal_patterns = [
        r"(const\s+\w+\s*=\s*\{)",
        r"(module\.exports\s*=\s*\{)",
        r"(export\s+default\s+\{)",
    ];
    for pattern in literal_patterns {
        let re = Regex::new(pattern).unwrap();
        if re.is_match(content) {
            let updated = re
                .replace(content, "${1}\n  output: 'standalone',")
                .into_owned();
            return (updated, true);
        }
    }

    if ext == "mjs" || ext == "ts" {
        let export_var = Regex::new(r"export\s+default\s+(\w+)").unwrap();
        if let Some(captures) = export_var.captures(content) {
            let var_name = captures.get(1).unwrap().as_str().to_string();
            let replacement = format!(
                "export default {{\n  ...{},\n  output: 'standalone',\n}}",
                var_name
            );
            let updated = export_var.replace(content, replacement.as_str()).into_owned();
            return (updated, true);
        }
        let updated = format!("{}\n\nexport default {{\n  output: 'standalone',\n}}\n", content);
        return (updated, true);
    }

    let exports_var = Regex::new(r"module\.exports\s*=\s*(\w+)").unwrap();
    if let Some(captures) = exports_var.captures(content) {
        let var_name = captures.get(1).unwrap().as_str().to_string();
        let replacement = format!(
            "module.exports = {{\n  ...{},\n  output: 'standalone',\n}}",
            var_name
        );
        let updated = exports_var.replace(content, replacement.as_str()).into_owned();
        return (updated, true);
    }

    let updated = format!(
        "{}\n\nconst baseConfig = module.exports || {{}}\nmodule.exports = {{\n  ...baseConfig,\n  output: 'standalone',\n}}\n",
        content
    );
    (updated, true)
}

/// Emits the Next.js Dockerfile. The standalone runtime is used when
/// this pass rewrote or created the config, or when a pre-built
/// standalone directory is already on disk; a config that needed no
/// change and an unwritable config both fall back to the non-standalone
/// image unless that directory exists.
pub fn generate(service_dir: &Path) -> String {
    let standalone_dir = service_dir.join(".next/standalone");
    let standalone = match ensure_standalone_output(service_dir) {
        Ok(StandaloneOutcome::Updated) | Ok(StandaloneOutcome::Created) => true,
        Ok(StandaloneOutcome::AlreadyConfigured) => standalone_dir.is_dir(),
        Err(e) => {
            warn!(
                path = %service_dir.display(),
                error = %e,
                "could not ensure standalone output, using fallback recipe"
            );
            standalone_dir.is_dir()
        }
    };

    let mut dockerfile = String::from(BASE_STAGES);
    if standalone {
        dockerfile.push_str(STANDALONE_RUNNER);
    } else {
        dockerfile.push_str(FALLBACK_RUNNER);
    }
    dockerfile
}

const BASE_STAGES: &str = r#"FROM node:20-alpine AS base

FROM base AS deps
RUN apk add --no-cache libc6-compat
WORKDIR /app

COPY package.json package-lock.json* ./
RUN npm ci

FROM base AS builder
WORKDIR /app
COPY --from=deps /app/node_modules ./node_modules
COPY . .

ENV NEXT_TELEMETRY_DISABLED=1
ENV NODE_ENV=production
ENV SKIP_ENV_VALIDATION=1

RUN npm run build || (cat /root/.npm/_logs/*.log 2>/dev/null; exit 1)

FROM base AS runner
WORKDIR /app

ENV NODE_ENV=production
ENV NEXT_TELEMETRY_DISABLED=1

RUN addgroup --system --gid 1001 nodejs
RUN adduser --system --uid 1001 nextjs

"#;

const STANDALONE_RUNNER: &str = r#"COPY --from=builder /app/public ./public

RUN mkdir .next
RUN chown nextjs:nodejs .next

COPY --from=builder --chown=nextjs:nodejs /app/.next/standalone ./
COPY --from=builder --chown=nextjs:nodejs /app/.next/static ./.next/static

USER nextjs

EXPOSE 3000

ENV PORT=3000
ENV HOSTNAME="0.0.0.0"

CMD ["node", "server.js"]
"#;

const FALLBACK_RUNNER: &str = r#"COPY --from=builder /app/public ./public
COPY --from=builder /app/package.json ./package.json
COPY --from=builder --chown=nextjs:nodejs /app/.next ./.next
COPY --from=builder /app/node_modules ./node_modules

USER nextjs

EXPOSE 3000

ENV PORT=3000
ENV HOSTNAME="0.0.0.0"

CMD ["npm", "start"]
"#;
