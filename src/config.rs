use once_cell::sync::Lazy;

/// Secret used to verify JWT bearer tokens. When unset, every caller is
/// treated as anonymous.
pub static JWT_SECRET: Lazy<Option<String>> = Lazy::new(|| read_optional_env("JWT_SECRET"));

/// Credential for the language-model API. Checked per request; a missing
/// key yields a configuration error response, never a crash.
pub static OPENAI_API_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("OPENAI_API_KEY"));

/// Base URL of the language-model API. Overridable for local mocks.
pub static OPENAI_BASE_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com".to_string())
});

/// Model identifier sent with each rewrite call.
pub static OPENAI_MODEL: Lazy<String> =
    Lazy::new(|| read_optional_env("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()));

/// Upper bound on one rewrite call; past it the request is treated as an
/// upstream failure. Defaults to 30 seconds.
pub static REWRITE_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("REWRITE_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(30)
});

/// Shared secret for billing webhook HMAC verification. When unset the
/// webhook endpoint rejects every delivery.
pub static BILLING_WEBHOOK_SECRET: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("BILLING_WEBHOOK_SECRET"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running
/// even if database migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
