//! Path rewriting applied before forwarding.
//!
//! Prefix rules are segment-aware: `/api` matches `/api` and `/api/...`
//! but not `/apix`.

use crate::config::RewriteConfig;

/// Compiled path rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PathRewrite {
    #[default]
    None,
    StripPrefix(String),
    AddPrefix(String),
    EnsurePrefix(String),
}

impl PathRewrite {
    pub fn from_config(config: &RewriteConfig) -> Self {
        match config {
            RewriteConfig::None => PathRewrite::None,
            RewriteConfig::StripPrefix { prefix } => PathRewrite::StripPrefix(normalize(prefix)),
            RewriteConfig::AddPrefix { prefix } => PathRewrite::AddPrefix(normalize(prefix)),
            RewriteConfig::EnsurePrefix { prefix } => PathRewrite::EnsurePrefix(normalize(prefix)),
        }
    }

    /// Rewrite `path`. The result always starts with `/`.
    pub fn apply(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        match self {
            PathRewrite::None => path,
            PathRewrite::StripPrefix(prefix) => {
                if prefix.is_empty() || !has_prefix(&path, prefix) {
                    return path;
                }
                let rest = &path[prefix.len()..];
                if rest.is_empty() {
                    "/".to_string()
                } else {
                    rest.to_string()
                }
            }
            PathRewrite::AddPrefix(prefix) => format!("{}{}", prefix, path),
            PathRewrite::EnsurePrefix(prefix) => {
                if has_prefix(&path, prefix) {
                    path
                } else {
                    format!("{}{}", prefix, path)
                }
            }
        }
    }
}

// "/api/" and "/" both normalize to a form without the trailing slash.
fn normalize(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_string()
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
