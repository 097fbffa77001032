//! Recipes for the Python variants.

use crate::detect::FrameworkKind;

pub fn generate(kind: FrameworkKind) -> String {
    match kind {
        FrameworkKind::Django => DJANGO.to_string(),
        FrameworkKind::Flask => FLASK.to_string(),
        FrameworkKind::FastApi => FASTAPI.to_string(),
        _ => PLAIN_PYTHON.to_string(),
    }
}

const DJANGO: &str = r#"FROM python:3.11-slim AS base

ENV PYTHONUNBUFFERED=1 \
    PYTHONDONTWRITEBYTECODE=1 \
    PIP_NO_CACHE_DIR=1 \
    PIP_DISABLE_PIP_VERSION_CHECK=1

WORKDIR /app

RUN apt-get update && apt-get install -y \
    gcc \
    postgresql-client \
    && rm -rf /var/lib/apt/lists/*

COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt

COPY . .

RUN python manage.py collectstatic --noinput

RUN useradd -m -u 1001 django && chown -R django:django /app
USER django

EXPOSE 8000

CMD ["gunicorn", "--bind", "0.0.0.0:8000", "--workers", "4", "wsgi:application"]
"#;

const FLASK: &str = r#"FROM python:3.11-slim AS base

ENV PYTHONUNBUFFERED=1 \
    PYTHONDONTWRITEBYTECODE=1 \
    PIP_NO_CACHE_DIR=1

WORKDIR /app

COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt

COPY . .

RUN useradd -m -u 1001 flask && chown -R flask:flask /app
USER flask

EXPOSE 5000

CMD ["gunicorn", "--bind", "0.0.0.0:5000", "--workers", "4", "app:app"]
"#;

const FASTAPI: &str = r#"FROM python:3.11-slim AS base

ENV PYTHONUNBUFFERED=1 \
    PYTHONDONTWRITEBYTECODE=1 \
    PIP_NO_CACHE_DIR=1

WORKDIR /app

COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt

COPY . .

RUN useradd -m -u 1001 fastapi && chown -R fastapi:fastapi /app
USER fastapi

EXPOSE 8000

CMD ["uvicorn", "main:app", "--host", "0.0.0.0", "--port", "8000", "--workers", "4"]
"#;

const PLAIN_PYTHON: &str = r#"FROM python:3.11-slim AS base

ENV PYTHONUNBUFFERED=1 \
    PYTHONDONTWRITEBYTECODE=1 \
    PIP_NO_CACHE_DIR=1

WORKDIR /app

COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt

COPY . .

RUN useradd -m -u 1001 appuser && chown -R appuser:appuser /app
USER appuser

EXPOSE 8000

CMD ["python", "main.py"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_recipes_run_unprivileged_with_a_port() {
        for kind in [
            FrameworkKind::Django,
            FrameworkKind::Flask,
            FrameworkKind::FastApi,
            FrameworkKind::Python,
        ] {
            let dockerfile = generate(kind);
            assert!(dockerfile.contains("USER "), "{:?} runs as root", kind);
            assert!(dockerfile.contains("EXPOSE "), "{:?} has no port", kind);
            assert!(dockerfile.contains("pip install"));
        }
    }

    #[test]
    fn flask_serves_on_its_default_port() {
        assert!(generate(FrameworkKind::Flask).contains("EXPOSE 5000"));
    }
}
