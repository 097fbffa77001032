//! Default nginx configuration for static-SPA recipes.
//!
//! The Vite and CRA images copy `nginx.conf` into the runtime stage, so a
//! service that does not ship one gets this SPA-friendly default with a
//! fallback to `index.html`.

use std::io;
use std::path::Path;

const DEFAULT_NGINX_CONF: &str = r#"server {
    listen 80;
    server_name _;

    root /usr/share/nginx/html;
    index index.html;

    gzip on;
    gzip_types text/plain text/css application/json application/javascript image/svg+xml;

    location / {
        try_files $uri $uri/ /index.html;
    }

    location ~* \.(js|css|png|jpg|jpeg|gif|ico|svg|woff2?)$ {
        expires 30d;
        add_header Cache-Control "public, immutable";
    }
}
"#;

/// Writes the default nginx config into the service directory unless the
/// service already provides one.
pub fn ensure_config(service_dir: &Path) -> io::Result<bool> {
    let path = service_dir.join("nginx.conf");
    if path.is_file() {
        return Ok(false);
    }
    std::fs::write(&path, DEFAULT_NGINX_CONF)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn writes_default_when_absent() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_config(dir.path()).unwrap());
        let content = fs::read_to_string(dir.path().join("nginx.conf")).unwrap();
        assert!(content.contains("try_files $uri $uri/ /index.html"));
    }

    #[test]
    fn keeps_an_existing_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nginx.conf"), "server {}\n").unwrap();
        assert!(!ensure_config(dir.path()).unwrap());
        assert_eq!(
            fs::read_to_string(dir.path().join("nginx.conf")).unwrap(),
            "server {}\n"
        );
    }
}
