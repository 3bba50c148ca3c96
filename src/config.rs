//! Configuration for VaultGuard
//!
//! Environment variable and CLI argument handling using clap. All values are
//! read once at process start and immutable thereafter.

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;

/// Per-route rate-limit quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    /// Maximum requests per window.
    pub limit: u64,
    /// Window duration.
    pub window: Duration,
}

/// WebAuthn relying-party identity, handed to the attestation verifier.
#[derive(Debug, Clone)]
pub struct RelyingParty {
    /// RP ID, e.g. "vault.example.com"
    pub id: String,
    /// Human-readable RP name shown by authenticators
    pub name: String,
    /// Allowed origins, e.g. "https://vault.example.com"
    pub origins: Vec<String>,
}

/// VaultGuard - security core for an encrypted credential vault
#[derive(Parser, Debug, Clone)]
#[command(name = "vaultguard")]
#[command(about = "Security core for an encrypted credential vault")]
pub struct Args {
    /// Base64-encoded 32-byte master encryption key for vault secrets
    #[arg(long, env = "MASTER_ENCRYPTION_KEY")]
    pub master_key: Option<String>,

    /// Shared counter/cache store connection string
    #[arg(long, env = "COUNTER_STORE_URL", default_value = "redis://localhost:6379")]
    pub counter_store_url: String,

    /// Ceremony challenge time-to-live in seconds
    #[arg(long, env = "CHALLENGE_TTL_SECONDS", default_value = "300")]
    pub challenge_ttl_seconds: u64,

    /// Maximum registered passkey devices per user
    #[arg(long, env = "MAX_DEVICES_PER_USER", default_value = "2")]
    pub max_devices_per_user: usize,

    /// Default rate limit (requests per window) for routes without an override
    #[arg(long, env = "RATE_LIMIT_DEFAULT", default_value = "60")]
    pub rate_limit_default: u64,

    /// Default rate-limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECONDS", default_value = "60")]
    pub rate_limit_window_seconds: u64,

    /// Comma-separated per-route quota overrides, e.g. "vault=30:60,passkey=10:60"
    /// (route=limit:window_seconds)
    #[arg(long, env = "RATE_LIMIT_ROUTES")]
    pub rate_limit_routes: Option<String>,

    /// WebAuthn relying-party ID, e.g. "vault.example.com"
    #[arg(long, env = "WEBAUTHN_RPID", default_value = "localhost")]
    pub rp_id: String,

    /// WebAuthn relying-party display name
    #[arg(long, env = "WEBAUTHN_RP_NAME", default_value = "VaultGuard")]
    pub rp_name: String,

    /// Comma-separated allowed WebAuthn origins
    #[arg(long, env = "WEBAUTHN_RP_ORIGINS", default_value = "http://localhost:5173")]
    pub rp_origins: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Ceremony challenge TTL as a [`Duration`].
    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_seconds)
    }

    /// Default quota applied to routes without an explicit override.
    pub fn default_quota(&self) -> RateQuota {
        RateQuota {
            limit: self.rate_limit_default,
            window: Duration::from_secs(self.rate_limit_window_seconds),
        }
    }

    /// Parse per-route quota overrides.
    ///
    /// Entries that do not match `route=limit:window_seconds` are skipped.
    pub fn route_quotas(&self) -> HashMap<String, RateQuota> {
        let mut quotas = HashMap::new();
        let Some(ref raw) = self.rate_limit_routes else {
            return quotas;
        };

        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let Some((route, quota)) = entry.split_once('=') else {
                continue;
            };
            let Some((limit, window)) = quota.split_once(':') else {
                continue;
            };
            if let (Ok(limit), Ok(window)) = (limit.parse::<u64>(), window.parse::<u64>()) {
                quotas.insert(
                    route.to_string(),
                    RateQuota {
                        limit,
                        window: Duration::from_secs(window),
                    },
                );
            }
        }

        quotas
    }

    /// Quota for a specific route, falling back to the default.
    pub fn quota_for(&self, route: &str) -> RateQuota {
        self.route_quotas()
            .get(route)
            .copied()
            .unwrap_or_else(|| self.default_quota())
    }

    /// Relying-party identity for the WebAuthn verifier.
    pub fn relying_party(&self) -> RelyingParty {
        RelyingParty {
            id: self.rp_id.clone(),
            name: self.rp_name.clone(),
            origins: self
                .rp_origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.master_key.is_none() {
            return Err("MASTER_ENCRYPTION_KEY is required".to_string());
        }
        if self.challenge_ttl_seconds == 0 {
            return Err("CHALLENGE_TTL_SECONDS must be greater than zero".to_string());
        }
        if self.max_devices_per_user == 0 {
            return Err("MAX_DEVICES_PER_USER must be greater than zero".to_string());
        }
        if self.rate_limit_default == 0 || self.rate_limit_window_seconds == 0 {
            return Err("rate limit and window must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_from(argv: &[&str]) -> Args {
        let mut full = vec!["vaultguard"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn test_route_quota_parsing() {
        let args = args_from(&["--rate-limit-routes", "vault=30:60, passkey=10:120"]);
        let quotas = args.route_quotas();

        assert_eq!(quotas.len(), 2);
        assert_eq!(
            quotas["vault"],
            RateQuota {
                limit: 30,
                window: Duration::from_secs(60)
            }
        );
        assert_eq!(
            quotas["passkey"],
            RateQuota {
                limit: 10,
                window: Duration::from_secs(120)
            }
        );
    }

    #[test]
    fn test_route_quota_fallback_to_default() {
        let args = args_from(&["--rate-limit-routes", "vault=30:60"]);

        assert_eq!(args.quota_for("vault").limit, 30);
        assert_eq!(args.quota_for("unknown"), args.default_quota());
    }

    #[test]
    fn test_malformed_quota_entries_skipped() {
        let args = args_from(&["--rate-limit-routes", "bad,vault=oops:60,ok=5:5"]);
        let quotas = args.route_quotas();

        assert_eq!(quotas.len(), 1);
        assert!(quotas.contains_key("ok"));
    }

    #[test]
    fn test_validate_requires_master_key() {
        let args = args_from(&[]);
        assert!(args.validate().is_err());

        let args = args_from(&["--master-key", "AAAA"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_relying_party_origins_split() {
        let args = args_from(&[
            "--rp-origins",
            "https://vault.example.com, http://localhost:5173",
        ]);
        let rp = args.relying_party();

        assert_eq!(rp.origins.len(), 2);
        assert_eq!(rp.origins[0], "https://vault.example.com");
    }
}
