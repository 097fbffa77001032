//! Recipes for the compiled and VM families, plus the generic fallback.

use crate::detect::{Framework, FrameworkKind};

pub fn generate(framework: &Framework) -> String {
    match framework.kind {
        FrameworkKind::Go => GO.to_string(),
        FrameworkKind::Rust => RUST.to_string(),
        FrameworkKind::SpringBoot | FrameworkKind::Jvm => SPRING_BOOT.to_string(),
        FrameworkKind::Laravel => LARAVEL.to_string(),
        FrameworkKind::Rails => RAILS.to_string(),
        _ => generic(framework),
    }
}

/// Single-stage fallback driven by the framework's runtime and build
/// command. Covers plain PHP and Ruby services.
pub fn generic(framework: &Framework) -> String {
    format!(
        r#"FROM {runtime}

WORKDIR /app

COPY . .

RUN {build_cmd}

RUN addgroup -g 1001 -S appgroup && \
    adduser -u 1001 -S appuser -G appgroup && \
    chown -R appuser:appgroup /app

USER appuser

EXPOSE {port}

CMD ["/bin/sh", "-c", "echo 'Please configure your start command'"]
"#,
        runtime = framework.runtime,
        build_cmd = framework.build_cmd,
        port = framework.port,
    )
}

const GO: &str = r#"FROM golang:1.22-alpine AS builder

WORKDIR /app

RUN apk add --no-cache git

COPY go.mod go.sum* ./
RUN go mod download

COPY . .

RUN CGO_ENABLED=0 GOOS=linux go build -a -installsuffix cgo -o main .

FROM alpine:latest

RUN apk --no-cache add ca-certificates tzdata

WORKDIR /home/app

COPY --from=builder /app/main .

RUN addgroup -g 1001 -S appgroup && \
    adduser -u 1001 -S appuser -G appgroup

USER appuser

EXPOSE 8080

CMD ["./main"]
"#;

const RUST: &str = r#"FROM rust:1.75-alpine AS builder

RUN apk add --no-cache musl-dev

WORKDIR /app

COPY Cargo.toml Cargo.lock* ./

RUN mkdir src && \
    echo "fn main() {}" > src/main.rs && \
    cargo build --release && \
    rm -rf src

COPY . .
RUN touch src/main.rs && cargo build --release

FROM alpine:latest

RUN apk --no-cache add ca-certificates

WORKDIR /home/app

COPY --from=builder /app/target/release/* ./

RUN addgroup -g 1001 -S appgroup && \
    adduser -u 1001 -S appuser -G appgroup

USER appuser

EXPOSE 8080

CMD ["./app"]
"#;

const SPRING_BOOT: &str = r#"FROM eclipse-temurin:21-jdk-alpine AS builder

WORKDIR /app

COPY mvnw* pom.xml ./
COPY .mvn .mvn

RUN ./mvnw dependency:go-offline

COPY src ./src
RUN ./mvnw package -DskipTests

FROM eclipse-temurin:21-jre-alpine

WORKDIR /app

COPY --from=builder /app/target/*.jar app.jar

RUN addgroup -g 1001 -S spring && \
    adduser -u 1001 -S spring -G spring

USER spring

EXPOSE 8080

ENTRYPOINT ["java", "-jar", "app.jar"]
"#;

const LARAVEL: &str = r#"FROM php:8.2-fpm-alpine AS base

RUN apk add --no-cache \
    postgresql-dev \
    zip \
    unzip \
    git

RUN docker-php-ext-install pdo pdo_pgsql

COPY --from=composer:latest /usr/bin/composer /usr/bin/composer

WORKDIR /var/www

COPY composer.json composer.lock* ./
RUN composer install --no-dev --no-scripts --no-autoloader

COPY . .

RUN composer dump-autoload --optimize && \
    php artisan config:cache && \
    php artisan route:cache && \
    php artisan view:cache

RUN chown -R www-data:www-data /var/www

USER www-data

EXPOSE 8000

CMD ["php", "artisan", "serve", "--host=0.0.0.0", "--port=8000"]
"#;

const RAILS: &str = r#"FROM ruby:3.2-alpine AS base

RUN apk add --no-cache \
    build-base \
    postgresql-dev \
    nodejs \
    yarn \
    tzdata

WORKDIR /app

COPY Gemfile Gemfile.lock ./
RUN bundle install --without development test

COPY package.json yarn.lock* ./
RUN yarn install --frozen-lockfile

COPY . .

RUN RAILS_ENV=production bundle exec rake assets:precompile

RUN adduser -D -u 1001 rails && chown -R rails:rails /app
USER rails

EXPOSE 3000

CMD ["bundle", "exec", "rails", "server", "-b", "0.0.0.0"]
"#;
