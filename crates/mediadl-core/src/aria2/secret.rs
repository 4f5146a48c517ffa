//! RPC secret resolution.
//!
//! Order: explicit override, then the configured value unless it is a
//! well-known placeholder, then the environment, then whichever of the
//! configured/environment values is non-empty. A placeholder checked into a
//! config file never wins over a real secret exported by the operator.

/// Environment variable holding the aria2 RPC secret.
pub const SECRET_ENV: &str = "MEDIADL_ARIA2_SECRET";

const PLACEHOLDER_SECRETS: &[&str] = &[
    "changeme",
    "change-me",
    "change_me",
    "secret",
    "your-secret",
    "your_secret",
    "your-secret-here",
    "replace-me",
    "<secret>",
    "xxx",
];

pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    PLACEHOLDER_SECRETS.contains(&v.as_str())
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

pub fn resolve_secret(
    explicit: Option<&str>,
    configured: Option<&str>,
    env: Option<&str>,
) -> Option<String> {
    let explicit = non_empty(explicit);
    let configured = non_empty(configured);
    let env = non_empty(env);

    explicit
        .or_else(|| configured.filter(|c| !is_placeholder(c)))
        .or(env)
        .or(configured)
        .map(str::to_string)
}

/// Resolve using the process environment for the env value.
pub fn resolve_secret_from_env(explicit: Option<&str>, configured: Option<&str>) -> Option<String> {
    let env = std::env::var(SECRET_ENV).ok();
    resolve_secret(explicit, configured, env.as_deref())
}
