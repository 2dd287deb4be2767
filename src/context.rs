// src/context.rs

//! Placeholder injection: `{{<task_id>.result}}` → upstream result text.
//!
//! The grammar is exactly `{{` + `[A-Za-z0-9_-]+` + `.result}}`. Anything
//! else (extra whitespace, other field names, nested braces) is plain text.
//! Substitution is a single left-to-right pass: an injected result is never
//! scanned for placeholders itself.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::errors::InjectionError;
use crate::types::PlaceholderPolicy;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_-]+)\.result\}\}").expect("placeholder pattern is valid")
});

/// Source of completed task results for injection.
///
/// Only tasks in the `Completed` state should be visible through this
/// trait; anything else is treated as unresolved.
pub trait ResultLookup {
    fn completed_result(&self, task_id: &str) -> Option<&str>;
}

impl ResultLookup for HashMap<String, String> {
    fn completed_result(&self, task_id: &str) -> Option<&str> {
        self.get(task_id).map(String::as_str)
    }
}

impl ResultLookup for HashMap<String, Arc<str>> {
    fn completed_result(&self, task_id: &str) -> Option<&str> {
        self.get(task_id).map(|r| r.as_ref())
    }
}

impl ResultLookup for BTreeMap<String, String> {
    fn completed_result(&self, task_id: &str) -> Option<&str> {
        self.get(task_id).map(String::as_str)
    }
}

/// Task ids named by placeholders in `template`, first occurrence order,
/// without duplicates.
pub fn placeholder_ids(template: &str) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if let Some(id) = caps.get(1).map(|m| m.as_str()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Resolves a task's input template against completed upstream results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextInjector {
    policy: PlaceholderPolicy,
}

impl ContextInjector {
    pub fn new(policy: PlaceholderPolicy) -> Self {
        Self { policy }
    }

    /// Substitute every resolvable placeholder in `template`.
    ///
    /// Under [`PlaceholderPolicy::Lenient`] unresolved placeholders are
    /// copied through verbatim and this never fails. Under
    /// [`PlaceholderPolicy::Strict`] any unresolved placeholder is an error.
    pub fn resolve(
        &self,
        template: &str,
        results: &impl ResultLookup,
    ) -> Result<String, InjectionError> {
        let mut out = String::with_capacity(template.len());
        let mut unresolved: Vec<String> = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);

            match results.completed_result(id.as_str()) {
                Some(result) => out.push_str(result),
                None => {
                    out.push_str(whole.as_str());
                    if !unresolved.iter().any(|u| u == id.as_str()) {
                        unresolved.push(id.as_str().to_string());
                    }
                }
            }
            last = whole.end();
        }
        out.push_str(&template[last..]);

        if self.policy == PlaceholderPolicy::Strict && !unresolved.is_empty() {
            return Err(InjectionError::Unresolved { ids: unresolved });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_every_occurrence() {
        let injector = ContextInjector::default();
        let r = results(&[("T1", "3 emails"), ("T2", "no events")]);

        let out = injector
            .resolve("Summarize {{T1.result}} and {{T2.result}} ({{T1.result}})", &r)
            .unwrap();
        assert_eq!(out, "Summarize 3 emails and no events (3 emails)");
    }

    #[test]
    fn unknown_placeholders_pass_through_when_lenient() {
        let injector = ContextInjector::default();
        let r = results(&[("a", "x")]);

        let out = injector.resolve("{{a.result}} {{b.result}}", &r).unwrap();
        assert_eq!(out, "x {{b.result}}");
    }

    #[test]
    fn strict_policy_reports_unresolved_ids_once() {
        let injector = ContextInjector::new(PlaceholderPolicy::Strict);
        let r = results(&[]);

        let err = injector
            .resolve("{{b.result}} {{c.result}} {{b.result}}", &r)
            .unwrap_err();
        assert_eq!(
            err,
            InjectionError::Unresolved {
                ids: vec!["b".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn near_misses_are_plain_text() {
        let injector = ContextInjector::default();
        let r = results(&[("a", "x")]);

        for template in [
            "{{ a.result }}",
            "{{a.output}}",
            "{a.result}",
            "{{a.result}",
            "{{a b.result}}",
            "{{.result}}",
        ] {
            assert_eq!(injector.resolve(template, &r).unwrap(), template);
        }
    }

    #[test]
    fn ids_may_contain_dashes_and_underscores() {
        let injector = ContextInjector::default();
        let r = results(&[("task_1-b", "ok")]);
        assert_eq!(
            injector.resolve("[{{task_1-b.result}}]", &r).unwrap(),
            "[ok]"
        );
    }

    #[test]
    fn injected_text_is_not_rescanned() {
        let injector = ContextInjector::default();
        let r = results(&[("a", "{{b.result}}"), ("b", "deep")]);

        let once = injector.resolve("<{{a.result}}>", &r).unwrap();
        assert_eq!(once, "<{{b.result}}>");
    }

    #[test]
    fn resolution_is_idempotent_once_nothing_is_left() {
        let injector = ContextInjector::default();
        let r = results(&[("a", "alpha"), ("b", "beta")]);

        let once = injector.resolve("{{a.result}}/{{b.result}}", &r).unwrap();
        let twice = injector.resolve(&once, &r).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn lists_placeholder_ids_in_order() {
        assert_eq!(
            placeholder_ids("{{b.result}} {{a.result}} {{b.result}} {{c.output}}"),
            vec!["b", "a"]
        );
        assert!(placeholder_ids("no placeholders").is_empty());
    }
}
