//! Location of the per-user, per-display namespace directory where the
//! editor posts its service socket.

use std::path::{Path, PathBuf};

use crate::error::{AcmeError, Result};

/// Name used when the current user cannot be determined.
const UNKNOWN_USER: &str = "none";

/// A resolved namespace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    dir: PathBuf,
}

impl Namespace {
    /// Resolves the namespace from the given variable values.
    ///
    /// An explicit `NAMESPACE` wins. Otherwise the directory is derived from
    /// the display: `/tmp/ns.<user>.<display>`, with the display
    /// canonicalized and any `/` replaced by `_`.
    pub fn resolve(namespace: Option<&str>, display: Option<&str>, user: &str) -> Result<Self> {
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            return Ok(Self { dir: PathBuf::from(ns) });
        }
        let display = display
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AcmeError::Namespace("$NAMESPACE not set, $DISPLAY not set".into()))?;
        let display = canonicalize_display(display).replace('/', "_");
        let user = if user.is_empty() { UNKNOWN_USER } else { user };
        Ok(Self {
            dir: PathBuf::from(format!("/tmp/ns.{user}.{display}")),
        })
    }

    /// Resolves from `$NAMESPACE`, `$DISPLAY` and `$USER` (or `$LOGNAME`).
    pub fn from_env() -> Result<Self> {
        let namespace = std::env::var("NAMESPACE").ok();
        let display = std::env::var("DISPLAY").ok();
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_else(|_| UNKNOWN_USER.to_string());
        Self::resolve(namespace.as_deref(), display.as_deref(), &user)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Creates the directory if missing, private to the user.
    pub fn ensure_dir(&self) -> Result<()> {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir).map_err(|e| {
            AcmeError::Namespace(format!("cannot create {}: {}", self.dir.display(), e))
        })
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir.display())
    }
}

/// Drops a `.0` screen number that directly follows `:<digits>`, so
/// `:0.0` and `:0` name the same namespace.
pub fn canonicalize_display(display: &str) -> String {
    let Some((host, rest)) = display.split_once(':') else {
        return display.to_string();
    };
    if rest.is_empty() {
        return display.to_string();
    }
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if &rest[digits..] == ".0" {
        return format!("{}:{}", host, &rest[..digits]);
    }
    display.to_string()
}
