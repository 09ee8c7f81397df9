// ABOUTME: Renders the .env file, docker-compose.yml and Caddyfile for a compose deployment.
// ABOUTME: Plain functions from deployment settings to text; writing is the caller's job.

use std::fmt::Write;

use super::envfile::IMAGE_TAG_KEY;
use super::secrets::{DB_PASSWORD_KEY, DB_ROOT_PASSWORD_KEY, SALT_KEY, Secrets};
use crate::config::{CacheConfig, CacheEngine, DatabaseMode, DbEngine, StorageConfig};
use crate::types::DeploymentName;

pub const COMPOSE_FILENAME: &str = "docker-compose.yml";
pub const CADDYFILE_FILENAME: &str = "Caddyfile";

const MARIADB_IMAGE: &str = "mariadb:11";
const POSTGRES_IMAGE: &str = "postgres:16-alpine";
const REDIS_IMAGE: &str = "redis:7-alpine";
const CADDY_IMAGE: &str = "caddy:2-alpine";

/// Inputs shared by all three files.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    pub name: &'a DeploymentName,
    pub image: &'a str,
    pub tag: &'a str,
    pub domain: &'a str,
    pub database: &'a DatabaseMode,
    pub storage: &'a StorageConfig,
    pub cache: &'a CacheConfig,
    pub secrets: &'a Secrets,
}

fn is_local(domain: &str) -> bool {
    domain.is_empty() || domain == "localhost"
}

fn env_line(out: &mut String, key: &str, value: &str) {
    let needs_quotes = value.chars().any(|c| c.is_whitespace() || c == '#' || c == '"');
    if needs_quotes {
        let _ = writeln!(out, "{}=\"{}\"", key, value.replace('"', "\\\""));
    } else {
        let _ = writeln!(out, "{}={}", key, value);
    }
}

pub fn render_env(vars: &TemplateVars<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Managed by keel for deployment '{}'.", vars.name);
    out.push_str("# Secrets are generated once at install; keel reuses them on every rewrite.\n\n");

    env_line(&mut out, "APP_IMAGE", vars.image);
    env_line(&mut out, IMAGE_TAG_KEY, vars.tag);
    env_line(&mut out, "APP_DOMAIN", if is_local(vars.domain) { "localhost" } else { vars.domain });
    env_line(
        &mut out,
        "APP_FULL_BASE_URL",
        &crate::health::base_url(vars.domain),
    );
    env_line(&mut out, SALT_KEY, &vars.secrets.security_salt);
    out.push('\n');

    match vars.database {
        DatabaseMode::Bundled { engine } => {
            env_line(&mut out, "DB_ENGINE", engine.as_str());
            env_line(&mut out, "DB_HOST", "db");
            env_line(&mut out, "DB_NAME", "app");
            match engine {
                DbEngine::Mariadb => env_line(&mut out, "DB_USER", "app"),
                DbEngine::Postgres => env_line(&mut out, "DB_USER", "postgres"),
            }
        }
        DatabaseMode::External { url } => {
            env_line(&mut out, "DB_ENGINE", "external");
            env_line(&mut out, "DATABASE_URL", url);
        }
    }
    env_line(&mut out, DB_PASSWORD_KEY, &vars.secrets.db_password);
    env_line(&mut out, DB_ROOT_PASSWORD_KEY, &vars.secrets.db_root_password);
    out.push('\n');

    match vars.cache.engine {
        CacheEngine::Apcu => env_line(&mut out, "CACHE_ENGINE", "apcu"),
        CacheEngine::Redis => {
            env_line(&mut out, "CACHE_ENGINE", "redis");
            let url = vars.cache.redis_url.as_deref().unwrap_or("redis://cache:6379");
            env_line(&mut out, "REDIS_URL", url);
        }
    }

    env_line(&mut out, "STORAGE_ADAPTER", vars.storage.kind.as_str());
    for (key, value) in &vars.storage.settings {
        let key = format!("STORAGE_{}", key.to_ascii_uppercase().replace(['-', '.'], "_"));
        env_line(&mut out, &key, value);
    }

    out
}

pub fn render_compose(vars: &TemplateVars<'_>) -> String {
    let engine = vars.database.bundled_engine();
    let bundles_redis = vars.cache.bundles_redis();

    let mut out = String::new();
    let _ = writeln!(out, "# Managed by keel for deployment '{}'. Edits are overwritten on reinstall.", vars.name);
    let _ = writeln!(out, "name: keel-{}", vars.name);
    out.push_str("\nservices:\n");

    out.push_str("  app:\n");
    out.push_str("    image: ${APP_IMAGE}:${APP_IMAGE_TAG}\n");
    out.push_str("    restart: unless-stopped\n");
    out.push_str("    env_file: .env\n");
    let mut depends = Vec::new();
    if engine.is_some() {
        depends.push("db");
    }
    if bundles_redis {
        depends.push("cache");
    }
    if !depends.is_empty() {
        out.push_str("    depends_on:\n");
        for dep in &depends {
            let _ = writeln!(out, "      - {}", dep);
        }
    }
    out.push_str("    volumes:\n      - app_data:/var/www/html/data\n");

    match engine {
        Some(DbEngine::Mariadb) => {
            out.push_str("\n  db:\n");
            let _ = writeln!(out, "    image: {}", MARIADB_IMAGE);
            out.push_str("    restart: unless-stopped\n");
            out.push_str("    environment:\n");
            out.push_str("      MARIADB_ROOT_PASSWORD: ${DB_ROOT_PASSWORD}\n");
            out.push_str("      MARIADB_DATABASE: ${DB_NAME}\n");
            out.push_str("      MARIADB_USER: ${DB_USER}\n");
            out.push_str("      MARIADB_PASSWORD: ${DB_PASSWORD}\n");
            // lets `exec db mariadb-dump` and `exec db mariadb` authenticate as root
            out.push_str("      MYSQL_PWD: ${DB_ROOT_PASSWORD}\n");
            out.push_str("    volumes:\n      - db_data:/var/lib/mysql\n");
        }
        Some(DbEngine::Postgres) => {
            out.push_str("\n  db:\n");
            let _ = writeln!(out, "    image: {}", POSTGRES_IMAGE);
            out.push_str("    restart: unless-stopped\n");
            out.push_str("    environment:\n");
            out.push_str("      POSTGRES_PASSWORD: ${DB_ROOT_PASSWORD}\n");
            out.push_str("      POSTGRES_DB: ${DB_NAME}\n");
            out.push_str("    volumes:\n      - db_data:/var/lib/postgresql/data\n");
        }
        None => {}
    }

    if bundles_redis {
        out.push_str("\n  cache:\n");
        let _ = writeln!(out, "    image: {}", REDIS_IMAGE);
        out.push_str("    restart: unless-stopped\n");
    }

    out.push_str("\n  proxy:\n");
    let _ = writeln!(out, "    image: {}", CADDY_IMAGE);
    out.push_str("    restart: unless-stopped\n");
    out.push_str("    depends_on:\n      - app\n");
    out.push_str("    ports:\n      - \"80:80\"\n      - \"443:443\"\n");
    out.push_str("    volumes:\n");
    out.push_str("      - ./Caddyfile:/etc/caddy/Caddyfile:ro\n");
    out.push_str("      - caddy_data:/data\n");
    out.push_str("      - caddy_config:/config\n");

    out.push_str("\nvolumes:\n  app_data:\n");
    if engine.is_some() {
        out.push_str("  db_data:\n");
    }
    out.push_str("  caddy_data:\n  caddy_config:\n");

    out
}

pub fn render_caddyfile(vars: &TemplateVars<'_>) -> String {
    let site = if is_local(vars.domain) {
        "http://localhost".to_string()
    } else {
        vars.domain.to_string()
    };

    format!(
        "# Managed by keel for deployment '{name}'.\n\
         {site} {{\n\
         \tencode gzip\n\
         \treverse_proxy app:80\n\
         }}\n",
        name = vars.name,
        site = site,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::compose::envfile::parse_value;
    use std::collections::BTreeMap;

    struct Fixture {
        name: DeploymentName,
        database: DatabaseMode,
        storage: StorageConfig,
        cache: CacheConfig,
        secrets: Secrets,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                name: DeploymentName::default(),
                database: DatabaseMode::default(),
                storage: StorageConfig::default(),
                cache: CacheConfig::default(),
                secrets: Secrets::generate(),
            }
        }

        fn vars<'a>(&'a self, domain: &'a str) -> TemplateVars<'a> {
            TemplateVars {
                name: &self.name,
                image: "ghcr.io/x/y",
                tag: "1.0.0",
                domain,
                database: &self.database,
                storage: &self.storage,
                cache: &self.cache,
                secrets: &self.secrets,
            }
        }
    }

    #[test]
    fn env_carries_tag_and_secrets() {
        let fixture = Fixture::new();
        let env = render_env(&fixture.vars("localhost"));

        assert_eq!(parse_value(&env, "APP_IMAGE_TAG").as_deref(), Some("1.0.0"));
        assert_eq!(
            parse_value(&env, "SECURITY_SALT").as_deref(),
            Some(fixture.secrets.security_salt.as_str())
        );
        assert_eq!(parse_value(&env, "DB_ENGINE").as_deref(), Some("mariadb"));
        assert_eq!(
            parse_value(&env, "APP_FULL_BASE_URL").as_deref(),
            Some("http://localhost")
        );
    }

    #[test]
    fn external_database_skips_db_service() {
        let mut fixture = Fixture::new();
        fixture.database = DatabaseMode::External {
            url: "mysql://user:pw@db.internal/app".to_string(),
        };

        let compose = render_compose(&fixture.vars("app.example.org"));
        assert!(!compose.contains("\n  db:\n"));
        assert!(!compose.contains("db_data"));

        let env = render_env(&fixture.vars("app.example.org"));
        assert_eq!(
            parse_value(&env, "DATABASE_URL").as_deref(),
            Some("mysql://user:pw@db.internal/app")
        );
    }

    #[test]
    fn redis_is_bundled_only_without_url() {
        let mut fixture = Fixture::new();
        fixture.cache = CacheConfig {
            engine: CacheEngine::Redis,
            redis_url: None,
        };
        let compose = render_compose(&fixture.vars("localhost"));
        assert!(compose.contains("\n  cache:\n"));
        assert!(compose.contains("      - cache\n"));

        fixture.cache.redis_url = Some("redis://redis.internal:6379".to_string());
        assert!(!render_compose(&fixture.vars("localhost")).contains("\n  cache:\n"));
    }

    #[test]
    fn storage_settings_become_env_entries() {
        let mut fixture = Fixture::new();
        fixture.storage = StorageConfig {
            kind: crate::config::StorageKind::S3,
            settings: BTreeMap::from([("s3-bucket".to_string(), "uploads".to_string())]),
        };
        let env = render_env(&fixture.vars("localhost"));
        assert_eq!(parse_value(&env, "STORAGE_ADAPTER").as_deref(), Some("s3"));
        assert_eq!(parse_value(&env, "STORAGE_S3_BUCKET").as_deref(), Some("uploads"));
    }

    #[test]
    fn caddy_site_follows_domain() {
        let fixture = Fixture::new();
        assert!(render_caddyfile(&fixture.vars("localhost")).contains("http://localhost {"));
        assert!(render_caddyfile(&fixture.vars("app.example.org")).contains("\napp.example.org {"));
    }
}
