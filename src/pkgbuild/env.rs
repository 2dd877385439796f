//! Build environment with `%(key)s` templates
//!
//! Values may reference other keys with `%(key)s`; `%%` stands for a literal
//! percent sign and any other `%` is kept as is. Reading a key expands its
//! value once, recursively, and stores the expanded text back so later reads
//! return it unchanged. Inserting a key makes its new value raw again.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::CmtError;

/// String map passed to every build step and to every child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
    expanded: BTreeSet<String>,
}

impl BuildEnv {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment.
    ///
    /// Inherited values are literal: they are never expanded.
    pub fn from_process() -> Self {
        let mut env = Self::new();
        for (key, value) in std::env::vars() {
            env.insert_literal(key, value);
        }
        env
    }

    /// Sets `key` to a final value that is never expanded.
    pub fn insert_literal(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.vars.insert(key.clone(), value.into());
        self.expanded.insert(key);
    }

    /// Sets `key` to a raw (unexpanded) value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.expanded.remove(&key);
        self.vars.insert(key, value.into());
    }

    /// Sets `key` only when it is absent.
    pub fn insert_default(&mut self, key: &str, value: impl Into<String>) {
        if !self.vars.contains_key(key) {
            self.insert(key, value);
        }
    }

    /// Appends `suffix` to the expanded value of `key` (empty when absent).
    pub fn append(&mut self, key: &str, suffix: &str) -> Result<()> {
        let mut value = self.get(key)?.unwrap_or_default();
        value.push_str(suffix);
        self.insert(key, value);
        Ok(())
    }

    /// Removes `key`, returning its stored value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.expanded.remove(key);
        self.vars.remove(key)
    }

    /// Whether `key` is set.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Stored value of `key` without expansion.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whether the stored value of `key` is already expanded.
    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.contains(key)
    }

    /// Expanded value of `key`, `None` when absent.
    ///
    /// # Errors
    ///
    /// [`CmtError::TemplateKeyMissing`] when the value references an unknown
    /// key and [`CmtError::TemplateCycle`] when references loop.
    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        let mut stack = Vec::new();
        self.resolve(key, &mut stack)
    }

    /// Expanded value of a key that must be present.
    pub fn require(&mut self, key: &str) -> Result<String> {
        self.get(key)?.ok_or_else(|| {
            CmtError::TemplateKeyMissing {
                key: key.to_string(),
                template: format!("%({key})s"),
            }
            .into()
        })
    }

    /// Expands a template against this environment.
    pub fn expand(&mut self, template: &str) -> Result<String> {
        let mut stack = Vec::new();
        self.expand_with(template, &mut stack)
    }

    /// All variables, expanded, in key order.
    pub fn expanded_vars(&mut self) -> Result<Vec<(String, String)>> {
        let keys: Vec<String> = self.vars.keys().cloned().collect();
        let mut vars = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(&key)? {
                vars.push((key, value));
            }
        }
        Ok(vars)
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variable is set.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn resolve(&mut self, key: &str, stack: &mut Vec<String>) -> Result<Option<String>> {
        if self.expanded.contains(key) {
            return Ok(self.vars.get(key).cloned());
        }
        let Some(raw) = self.vars.get(key).cloned() else {
            return Ok(None);
        };
        if stack.iter().any(|k| k == key) {
            return Err(CmtError::TemplateCycle {
                key: key.to_string(),
            }
            .into());
        }

        stack.push(key.to_string());
        let value = self.expand_with(&raw, stack)?;
        stack.pop();

        self.vars.insert(key.to_string(), value.clone());
        self.expanded.insert(key.to_string());
        Ok(Some(value))
    }

    fn expand_with(&mut self, template: &str, stack: &mut Vec<String>) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];

            if let Some(after) = tail.strip_prefix('%') {
                out.push('%');
                rest = after;
                continue;
            }

            let reference = tail
                .strip_prefix('(')
                .and_then(|inner| inner.find(')').map(|end| (&inner[..end], &inner[end + 1..])))
                .and_then(|(name, after)| after.strip_prefix('s').map(|after| (name, after)));

            match reference {
                Some((name, after)) => {
                    let value = self.resolve(name, stack)?.ok_or_else(|| {
                        CmtError::TemplateKeyMissing {
                            key: name.to_string(),
                            template: template.to_string(),
                        }
                    })?;
                    out.push_str(&value);
                    rest = after;
                }
                None => {
                    out.push('%');
                    rest = tail;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();
        for (key, value) in iter {
            env.insert(key, value);
        }
        env
    }
}
