//! `$VAR` and `${VAR}` expansion in configuration values.

use std::fmt;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Expands environment variable references.
///
/// Undefined variables expand to the empty string. `GOBO` falls back to the
/// installation root when it is not set in the environment.
pub struct EnvExpander {
    lookup: Lookup,
    gobo_fallback: Option<String>,
}

impl fmt::Debug for EnvExpander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvExpander")
            .field("gobo_fallback", &self.gobo_fallback)
            .finish_non_exhaustive()
    }
}

impl EnvExpander {
    /// Expander reading the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
            gobo_fallback: None,
        }
    }

    /// Value of `$GOBO` when the environment does not define it.
    pub fn gobo_fallback(mut self, root: impl Into<String>) -> Self {
        self.gobo_fallback = Some(root.into());
        self
    }

    #[must_use]
    pub fn expand(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(braced) = after.strip_prefix('{') {
                if let Some(end) = braced.find('}').filter(|&end| end > 0) {
                    out.push_str(&self.var(&braced[..end]));
                    rest = &braced[end + 1..];
                    continue;
                }
            } else {
                let len = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                if len > 0 {
                    out.push_str(&self.var(&after[..len]));
                    rest = &after[len..];
                    continue;
                }
            }

            // Not a reference: keep the dollar sign.
            out.push('$');
            rest = after;
        }

        out.push_str(rest);
        out
    }

    fn var(&self, name: &str) -> String {
        match (self.lookup)(name).filter(|v| !v.is_empty()) {
            Some(value) => value,
            None if name == "GOBO" => self.gobo_fallback.clone().unwrap_or_default(),
            None => String::new(),
        }
    }
}

/// Expand against the process environment.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    EnvExpander::from_env().expand(value)
}
