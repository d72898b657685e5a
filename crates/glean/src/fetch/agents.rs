// ABOUTME: User-Agent strings: the fixed default and a pool of desktop browser agents for rotation.
// ABOUTME: Rotation draws uniformly from the pool on every attempt.

use rand::Rng;

use crate::options::FetchOptions;

/// User-Agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Glean/1.0";

/// Desktop browser agents used for rotation.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// A random agent from [`USER_AGENTS`].
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

/// The agent for one attempt: random when rotation is on, else the configured or default one.
pub fn user_agent_for(opts: &FetchOptions) -> String {
    if opts.use_random_user_agent {
        return random_user_agent().to_string();
    }
    opts.user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
}
