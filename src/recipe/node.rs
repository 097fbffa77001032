//! Recipes for the non-Next.js Node variants.

use crate::detect::FrameworkKind;

pub fn generate(kind: FrameworkKind) -> String {
    match kind {
        FrameworkKind::Express => EXPRESS.to_string(),
        FrameworkKind::NestJs => NESTJS.to_string(),
        FrameworkKind::ViteReact => VITE.to_string(),
        FrameworkKind::CreateReactApp => CRA.to_string(),
        FrameworkKind::Nuxt => NUXT.to_string(),
        _ => PLAIN_NODE.to_string(),
    }
}

const EXPRESS: &str = r#"FROM node:20-alpine AS base

FROM base AS deps
WORKDIR /app
COPY package.json package-lock.json* ./
RUN npm ci --only=production

FROM base AS runner
WORKDIR /app

ENV NODE_ENV=production

RUN addgroup --system --gid 1001 nodejs
RUN adduser --system --uid 1001 expressjs

COPY --from=deps --chown=expressjs:nodejs /app/node_modules ./node_modules
COPY --chown=expressjs:nodejs . .

USER expressjs

EXPOSE 3000

CMD ["node", "index.js"]
"#;

const NESTJS: &str = r#"FROM node:20-alpine AS base

FROM base AS deps
WORKDIR /app
COPY package.json package-lock.json* ./
RUN npm ci

FROM base AS builder
WORKDIR /app
COPY --from=deps /app/node_modules ./node_modules
COPY . .

RUN npm run build
RUN npm ci --only=production && npm cache clean --force

FROM base AS runner
WORKDIR /app

ENV NODE_ENV=production

RUN addgroup --system --gid 1001 nodejs
RUN adduser --system --uid 1001 nestjs

COPY --from=builder --chown=nestjs:nodejs /app/dist ./dist
COPY --from=builder --chown=nestjs:nodejs /app/node_modules ./node_modules

USER nestjs

EXPOSE 3000

CMD ["node", "dist/main"]
"#;

const VITE: &str = r#"FROM node:20-alpine AS base

FROM base AS deps
WORKDIR /app
COPY package.json package-lock.json* ./
RUN npm ci

FROM base AS builder
WORKDIR /app
COPY --from=deps /app/node_modules ./node_modules
COPY . .
RUN npm run build

FROM nginx:alpine AS runner

COPY --from=builder /app/dist /usr/share/nginx/html
COPY nginx.conf /etc/nginx/conf.d/default.conf

EXPOSE 80

CMD ["nginx", "-g", "daemon off;"]
"#;

const CRA: &str = r#"FROM node:20-alpine AS base

FROM base AS deps
WORKDIR /app
COPY package.json package-lock.json* ./
RUN npm ci

FROM base AS builder
WORKDIR /app
COPY --from=deps /app/node_modules ./node_modules
COPY . .
RUN npm run build

FROM nginx:alpine AS runner
COPY --from=builder /app/build /usr/share/nginx/html
COPY nginx.conf /etc/nginx/conf.d/default.conf
EXPOSE 80
CMD ["nginx", "-g", "daemon off;"]
"#;

const NUXT: &str = r#"FROM node:20-alpine AS base

FROM base AS deps
RUN apk add --no-cache libc6-compat
WORKDIR /app

COPY package.json package-lock.json* ./
RUN npm ci

FROM base AS builder
WORKDIR /app
COPY --from=deps /app/node_modules ./node_modules
COPY . .

RUN npm run build

FROM base AS runner
WORKDIR /app

ENV NODE_ENV=production

RUN addgroup --system --gid 1001 nodejs
RUN adduser --system --uid 1001 nuxtjs

COPY --from=builder --chown=nuxtjs:nodejs /app/.output ./

USER nuxtjs

EXPOSE 3000

ENV HOST=0.0.0.0
ENV PORT=3000

CMD ["node", "server/index.mjs"]
"#;

const PLAIN_NODE: &str = r#"FROM node:20-alpine AS base

FROM base AS deps
WORKDIR /app
COPY package.json package-lock.json* ./
RUN npm ci --only=production

FROM base AS runner
WORKDIR /app

ENV NODE_ENV=production

RUN addgroup --system --gid 1001 nodejs
RUN adduser --system --uid 1001 nodeapp

COPY --from=deps --chown=nodeapp:nodejs /app/node_modules ./node_modules
COPY --chown=nodeapp:nodejs . .

USER nodeapp

EXPOSE 3000

CMD ["npm", "start"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_node_recipe_runs_unprivileged() {
        for kind in [
            FrameworkKind::Express,
            FrameworkKind::NestJs,
            FrameworkKind::Nuxt,
            FrameworkKind::Node,
        ] {
            let dockerfile = generate(kind);
            assert!(dockerfile.contains("USER "), "{:?} runs as root", kind);
            assert!(dockerfile.contains("EXPOSE "), "{:?} has no port", kind);
        }
    }

    #[test]
    fn static_recipes_serve_through_nginx() {
        for kind in [FrameworkKind::ViteReact, FrameworkKind::CreateReactApp] {
            let dockerfile = generate(kind);
            assert!(dockerfile.contains("nginx:alpine"));
            assert!(dockerfile.contains("nginx.conf"));
            assert!(dockerfile.contains("EXPOSE 80"));
        }
    }
}
