//! Redirection of native codec library names.
//!
//! Native facades are loaded by logical name. A deployment can point a logical
//! name at a concrete file (for example a bundled `libmp3lame.so.0`) without the
//! encoder knowing where the library lives.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeLibraries {
    redirects: HashMap<String, String>,
}

impl NativeLibraries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later redirects of the same name replace earlier ones.
    pub fn set_redirect(&mut self, name: impl Into<String>, target: impl Into<String>) {
        let name = name.into();
        let target = target.into();
        log::debug!("redirecting native library {} to {}", name, target);
        self.redirects.insert(name, target);
    }

    pub fn remove_redirect(&mut self, name: &str) -> Option<String> {
        self.redirects.remove(name)
    }

    /// The redirected target of `name`, or `name` itself.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.redirects.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }
}
