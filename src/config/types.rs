use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Lead-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub io: IoConfig,
    #[serde(rename = "email-policy", default)]
    pub email_policy: EmailPolicy,
}

/// Per-record pipeline limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Maximum number of fetches a single record may perform
    #[serde(rename = "max-fetches-per-record")]
    pub max_fetches_per_record: u32,

    /// Cooperative wall-clock deadline for one record (seconds)
    #[serde(rename = "record-deadline-secs")]
    pub record_deadline_secs: u64,

    /// Extra time on top of the deadline before a worker is killed (seconds)
    #[serde(rename = "hard-timeout-margin-secs")]
    pub hard_timeout_margin_secs: u64,

    /// Politeness pause after each successful fetch (milliseconds)
    #[serde(rename = "throttle-ms")]
    pub throttle_ms: u64,

    /// Number of records processed concurrently
    pub workers: u32,

    /// Run each record on an isolated, killable worker
    pub isolation: bool,
}

impl EnrichConfig {
    pub fn record_deadline(&self) -> Duration {
        Duration::from_secs(self.record_deadline_secs)
    }

    /// The hard kill window, always strictly past the cooperative deadline
    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.record_deadline_secs + self.hard_timeout_margin_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            max_fetches_per_record: 8,
            record_deadline_secs: 75,
            hard_timeout_margin_secs: 5,
            throttle_ms: 800,
            workers: 1,
            isolation: true,
        }
    }
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound for one request, body included
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Bodies are truncated at this many bytes
    #[serde(rename = "max-body-bytes")]
    pub max_body_bytes: usize,

    /// Retries for 429 and 5xx responses
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 6,
            request_timeout_secs: 12,
            max_body_bytes: 1_500_000,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_redirects: 10,
        }
    }
}

/// Host circuit breaker thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before a host is put in backoff
    #[serde(rename = "failure-threshold")]
    pub failure_threshold: u32,

    /// How long a failing host stays in backoff (seconds)
    #[serde(rename = "cooldown-secs")]
    pub cooldown_secs: u64,
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            cooldown_secs: 30 * 60,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Format: Mozilla/5.0 (compatible; Name/Version; +ContactURL)
    pub fn header_value(&self) -> String {
        format!(
            "Mozilla/5.0 (compatible; {}/{}; +{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "LeadRippleBot".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

/// Input, output and status file locations
#[derive(Debug, Clone, Deserialize)]
pub struct IoConfig {
    /// CSV file with the records to enrich
    #[serde(rename = "input-path")]
    pub input_path: String,

    /// CSV file enriched rows are appended to
    #[serde(rename = "output-path")]
    pub output_path: String,

    /// JSON status file, replaced after every written row
    #[serde(rename = "status-path", default = "default_status_path")]
    pub status_path: String,
}

fn default_status_path() -> String {
    "enrich_stats.json".to_string()
}

/// Business policy for ranking and classifying email addresses
///
/// Both lists are hand-maintained; extend them in the config file rather
/// than relying on the defaults being complete.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailPolicy {
    /// Local-part prefixes that mark a shared role inbox (info, sales, ...)
    #[serde(rename = "role-prefixes")]
    pub role_prefixes: Vec<String>,

    /// Free webmail domains. An entry ending in `.` ("yahoo.") matches any
    /// domain with that label; otherwise the domain or its subdomains match.
    #[serde(rename = "free-domains")]
    pub free_domains: Vec<String>,

    /// Number of ranked addresses kept on a record
    #[serde(rename = "max-emails")]
    pub max_emails: usize,
}

impl EmailPolicy {
    /// Returns true if the local part starts with a role prefix
    pub fn is_role(&self, local: &str) -> bool {
        self.role_prefixes
            .iter()
            .any(|prefix| local.starts_with(prefix.as_str()))
    }

    /// Returns true if the domain belongs to a free webmail provider
    pub fn is_free_domain(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        self.free_domains.iter().any(|entry| {
            if entry.ends_with('.') {
                domain.starts_with(entry.as_str()) || domain.contains(&format!(".{}", entry))
            } else {
                domain == *entry || domain.ends_with(&format!(".{}", entry))
            }
        })
    }
}

impl Default for EmailPolicy {
    fn default() -> Self {
        let role_prefixes = [
            "info", "contact", "sales", "hello", "orders", "booking", "press", "support",
        ];
        let free_domains = [
            "gmail.", "yahoo.", "hotmail.", "aol.", "outlook.", "proton.", "icloud.",
            "protonmail.com", "gmx.com", "gmx.de", "yandex.com", "mail.com", "live.com",
            "msn.com", "me.com", "zoho.com", "pm.me",
        ];
        Self {
            role_prefixes: role_prefixes.iter().map(|s| s.to_string()).collect(),
            free_domains: free_domains.iter().map(|s| s.to_string()).collect(),
            max_emails: 3,
        }
    }
}
