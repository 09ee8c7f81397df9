// ABOUTME: Generated credentials for a compose deployment.
// ABOUTME: Secrets already written to an env file are reused, never regenerated.

use super::envfile::parse_value;

pub const SALT_KEY: &str = "SECURITY_SALT";
pub const DB_PASSWORD_KEY: &str = "DB_PASSWORD";
pub const DB_ROOT_PASSWORD_KEY: &str = "DB_ROOT_PASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    /// 32 random bytes, hex encoded.
    pub security_salt: String,
    /// 16 random bytes, hex encoded.
    pub db_password: String,
    pub db_root_password: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secrets { .. }")
    }
}

fn random_hex<const N: usize>() -> String {
    hex::encode(rand::random::<[u8; N]>())
}

impl Secrets {
    pub fn generate() -> Self {
        Self {
            security_salt: random_hex::<32>(),
            db_password: random_hex::<16>(),
            db_root_password: random_hex::<16>(),
        }
    }

    /// Keep whatever `existing` env content already defines and generate the rest.
    pub fn reuse_or_generate(existing: Option<&str>) -> Self {
        let fresh = Self::generate();
        let Some(content) = existing else {
            return fresh;
        };

        let keep = |key: &str, generated: String| {
            parse_value(content, key)
                .filter(|v| !v.is_empty())
                .unwrap_or(generated)
        };

        Self {
            security_salt: keep(SALT_KEY, fresh.security_salt),
            db_password: keep(DB_PASSWORD_KEY, fresh.db_password),
            db_root_password: keep(DB_ROOT_PASSWORD_KEY, fresh.db_root_password),
        }
    }
}
