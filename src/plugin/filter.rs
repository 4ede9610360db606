//! The filter pipeline every discovered plugin runs through.
//!
//! Checks run in a fixed order and the first one that objects decides:
//!
//! 1. disabled list
//! 2. obsolete hooks
//! 3. blacklist
//! 4. host compatibility
//! 5. validators

use std::collections::HashSet;
use std::sync::Arc;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use super::discovery::Candidate;
use super::{PluginDescriptor, PluginManifest, PluginOrigin, PluginState, PluginSummary, ValidationPhase};

/// Hooks whose implementers only take effect after a restart.
pub const DEFAULT_RESTART_NEEDING_HOOKS: &[&str] = &[
    "host.server.http.*",
    "host.printer.factory",
    "host.access.permissions",
    "host.timelapse.extensions",
];

/// Hooks the host no longer offers.
pub const DEFAULT_OBSOLETE_HOOKS: &[&str] = &["host.comm.protocol.gcode"];

/// Identifiers shipped with the host.
pub const DEFAULT_CONSIDERED_BUNDLED: &[&str] = &["firmware_check", "file_check", "pi_support"];

/// Reason recorded for plugins on the disabled list.
pub const DISABLED_REASON: &str = "Disabled in configuration";

/// Decides whether a plugin may load.
///
/// Returning `false` rejects the plugin.
pub type Validator = Arc<dyn Fn(ValidationPhase, &PluginDescriptor) -> bool + Send + Sync>;

/// A blacklisted plugin, optionally only some of its versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlacklistEntry {
    /// Every version.
    Identifier(String),
    /// Versions matching a semver requirement.
    Versioned { identifier: String, version: String },
}

impl BlacklistEntry {
    pub fn identifier(&self) -> &str {
        match self {
            Self::Identifier(identifier) | Self::Versioned { identifier, .. } => identifier,
        }
    }

    /// Whether `identifier` at `version` is covered.
    ///
    /// Versions or requirements that do not parse count as a match.
    pub fn matches(&self, identifier: &str, version: &str) -> bool {
        match self {
            Self::Identifier(blocked) => blocked == identifier,
            Self::Versioned { identifier: blocked, version: requirement } => {
                if blocked != identifier {
                    return false;
                }
                let Ok(requirement) = semver::VersionReq::parse(requirement) else {
                    tracing::warn!(plugin = %identifier, requirement = %requirement, "Unparseable blacklist version requirement");
                    return true;
                };
                semver::Version::parse(version.trim()).map_or(true, |version| requirement.matches(&version))
            }
        }
    }
}

impl std::fmt::Display for BlacklistEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identifier(identifier) => write!(f, "{identifier}"),
            Self::Versioned { identifier, version } => write!(f, "{identifier} ({version})"),
        }
    }
}

/// Outcome of the pipeline for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Passed every check.
    Accept,
    /// On the disabled list.
    Disabled,
    /// Rejected with a terminal state and a reason for display.
    Reject(PluginState, String),
}

impl Verdict {
    /// The state this verdict leads to before activation.
    pub fn state(&self) -> PluginState {
        match self {
            Self::Accept => PluginState::Validated,
            Self::Disabled => PluginState::Disabled,
            Self::Reject(state, _) => *state,
        }
    }
}

/// Filter configuration compiled for fast checks.
#[derive(Clone)]
pub struct FilterPipeline {
    disabled: HashSet<String>,
    obsolete_hooks: HashSet<String>,
    blacklist: Vec<BlacklistEntry>,
    compatibility_ignored: HashSet<String>,
    host_version: semver::Version,
    host_capabilities: Vec<String>,
    restart_patterns: Vec<Pattern>,
    bundled: HashSet<String>,
    validators: Vec<Validator>,
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("disabled", &self.disabled)
            .field("obsolete_hooks", &self.obsolete_hooks)
            .field("blacklist", &self.blacklist)
            .field("compatibility_ignored", &self.compatibility_ignored)
            .field("host_version", &self.host_version)
            .field("restart_patterns", &self.restart_patterns)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl FilterPipeline {
    /// Compile the filter settings of `options`.
    ///
    /// An accept-all validator is appended so the validator list is never
    /// empty.
    pub fn new(options: &super::ManagerOptions) -> Self {
        let restart_patterns = options
            .restart_needing_hooks
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %raw, error = %e, "Invalid hook pattern, matching literally");
                    Pattern::new(&Pattern::escape(raw)).ok()
                }
            })
            .collect();

        let accept_all: Validator = Arc::new(|_: ValidationPhase, _: &PluginDescriptor| true);
        let mut validators = options.validators.clone();
        validators.push(accept_all);

        Self {
            disabled: options.disabled.iter().cloned().collect(),
            obsolete_hooks: options.obsolete_hooks.iter().cloned().collect(),
            blacklist: options.blacklist.clone(),
            compatibility_ignored: options.compatibility_ignored.iter().cloned().collect(),
            host_version: options.host_version.clone(),
            host_capabilities: options.host_capabilities.clone(),
            restart_patterns,
            bundled: options.considered_bundled.iter().cloned().collect(),
            validators,
        }
    }

    /// Run all checks on `descriptor`.
    ///
    /// With `skip_disabled` the disabled list is ignored, used when a disabled
    /// plugin gets enabled explicitly.
    pub fn check(&self, descriptor: &PluginDescriptor, skip_disabled: bool) -> Verdict {
        let identifier = descriptor.identifier();

        if !skip_disabled && self.disabled.contains(identifier) {
            return Verdict::Disabled;
        }

        if let Some(reason) = self.obsolete_reason(descriptor.hooks()) {
            return Verdict::Reject(PluginState::RejectedObsoleteHook, reason);
        }

        let ignored = self.compatibility_ignored.contains(identifier);

        if let Some(entry) =
            self.blacklist.iter().find(|entry| entry.matches(identifier, descriptor.version()))
        {
            if ignored {
                tracing::warn!(plugin = %identifier, entry = %entry, "Blacklisted plugin loaded because compatibility checks are ignored for it");
            } else {
                return Verdict::Reject(
                    PluginState::RejectedBlacklisted,
                    format!("Blacklisted as {entry}"),
                );
            }
        }

        if let Some(reason) = self.incompatibility(descriptor) {
            if ignored {
                tracing::warn!(plugin = %identifier, reason = %reason, "Ignoring incompatible plugin");
            } else {
                return Verdict::Reject(PluginState::RejectedIncompatible, reason);
            }
        }

        if !self.validate(ValidationPhase::BeforeLoad, descriptor) {
            return Verdict::Reject(
                PluginState::RejectedValidator,
                format!("Refused by validator ({})", ValidationPhase::BeforeLoad),
            );
        }

        Verdict::Accept
    }

    fn incompatibility(&self, descriptor: &PluginDescriptor) -> Option<String> {
        let manifest = descriptor.manifest();
        if !manifest.is_compatible_with(&self.host_version) {
            return Some(format!(
                "Requires host {}, running {}",
                manifest.compatibility.host.as_deref().unwrap_or_default(),
                self.host_version
            ));
        }

        let missing = manifest.missing_capabilities(&self.host_capabilities);
        if !missing.is_empty() {
            return Some(format!("Missing host capabilities: {}", missing.join(", ")));
        }

        None
    }

    /// Ask the validators, in registration order, about `descriptor`.
    pub fn validate(&self, phase: ValidationPhase, descriptor: &PluginDescriptor) -> bool {
        for (index, validator) in self.validators.iter().enumerate() {
            if !validator(phase, descriptor) {
                tracing::debug!(plugin = %descriptor.identifier(), phase = %phase, validator = index, "Plugin refused by validator");
                return false;
            }
        }
        true
    }

    /// Why `hooks` are unacceptable, if any of them is obsolete.
    ///
    /// Runs on the declared hooks before loading and again on the namespaces
    /// an instance registers handlers for.
    pub fn obsolete_reason(&self, hooks: &[String]) -> Option<String> {
        let obsolete: Vec<&str> = hooks
            .iter()
            .filter(|hook| self.obsolete_hooks.contains(hook.as_str()))
            .map(String::as_str)
            .collect();
        if obsolete.is_empty() {
            return None;
        }
        Some(format!("Implements obsolete hooks: {}", obsolete.join(", ")))
    }

    /// Whether any of `hooks` matches a restart-needing pattern.
    pub fn needs_restart(&self, hooks: &[String]) -> bool {
        hooks.iter().any(|hook| self.restart_patterns.iter().any(|pattern| pattern.matches(hook)))
    }

    /// Whether `identifier` counts as bundled with the host.
    pub fn is_bundled(&self, identifier: &str) -> bool {
        self.bundled.contains(identifier)
    }

    pub fn host_version(&self) -> &semver::Version {
        &self.host_version
    }

    /// Classify a folder candidate without constructing it.
    ///
    /// Accepted plugins come back as `validated`, since no factory runs.
    pub fn classify(&self, candidate: &Candidate) -> PluginSummary {
        let descriptor = match &candidate.manifest {
            Ok(manifest) => {
                let mut descriptor = PluginDescriptor::new(manifest.clone(), PluginOrigin::Folder, 0);
                let verdict = self.check(&descriptor, false);
                let reason = match &verdict {
                    Verdict::Accept => None,
                    Verdict::Disabled => Some(DISABLED_REASON.to_string()),
                    Verdict::Reject(_, reason) => Some(reason.clone()),
                };
                descriptor.set_state(verdict.state(), reason);
                descriptor
            }
            Err(reason) => {
                let mut descriptor = PluginDescriptor::new(
                    PluginManifest::new(candidate.identifier.clone()),
                    PluginOrigin::Folder,
                    0,
                );
                descriptor.set_state(PluginState::RejectedValidator, Some(reason.clone()));
                descriptor
            }
        };

        let restart = self.needs_restart(descriptor.hooks());
        let bundled = candidate.bundled || self.is_bundled(descriptor.identifier());
        descriptor.with_location(&candidate.location).with_flags(restart, bundled).summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::ManagerOptions;

    fn descriptor(manifest: PluginManifest) -> PluginDescriptor {
        PluginDescriptor::new(manifest, PluginOrigin::EntryPoint, 0)
    }

    fn pipeline(options: ManagerOptions) -> FilterPipeline {
        FilterPipeline::new(&options.with_host_version(semver::Version::new(1, 5, 0)))
    }

    #[test]
    fn test_accepts_plain_plugin() {
        let filter = pipeline(ManagerOptions::default());
        assert_eq!(filter.check(&descriptor(PluginManifest::new("foo")), false), Verdict::Accept);
    }

    #[test]
    fn test_disabled_precedes_blacklist() {
        let filter = pipeline(ManagerOptions::default().disable("foo").blacklist(BlacklistEntry::Identifier("foo".to_string())));
        let foo = descriptor(PluginManifest::new("foo"));

        assert_eq!(filter.check(&foo, false), Verdict::Disabled);
        assert_eq!(filter.check(&foo, true).state(), PluginState::RejectedBlacklisted);
    }

    #[test]
    fn test_obsolete_hooks() {
        let filter = pipeline(ManagerOptions::default());
        let verdict = filter.check(&descriptor(PluginManifest::new("foo").with_hook("host.comm.protocol.gcode")), false);

        match verdict {
            Verdict::Reject(PluginState::RejectedObsoleteHook, reason) => {
                assert!(reason.contains("host.comm.protocol.gcode"));
            }
            other => panic!("unexpected verdict: {other:?}"),
        }

        // Sub-namespaces are not obsolete
        let queuing = descriptor(PluginManifest::new("bar").with_hook("host.comm.protocol.gcode.queuing"));
        assert_eq!(filter.check(&queuing, false), Verdict::Accept);
    }

    #[test]
    fn test_versioned_blacklist() {
        let entry = BlacklistEntry::Versioned { identifier: "foo".to_string(), version: "<1.2".to_string() };

        assert!(entry.matches("foo", "1.1.0"));
        assert!(!entry.matches("foo", "1.2.0"));
        assert!(!entry.matches("bar", "1.0.0"));
        assert!(entry.matches("foo", "not-a-version"));

        let filter = pipeline(ManagerOptions::default().blacklist(entry));
        let old = descriptor(PluginManifest::new("foo").with_version("1.0.0"));
        let new = descriptor(PluginManifest::new("foo").with_version("1.3.0"));
        assert_eq!(filter.check(&old, false).state(), PluginState::RejectedBlacklisted);
        assert_eq!(filter.check(&new, false), Verdict::Accept);
    }

    #[test]
    fn test_blacklist_deserializes_both_forms() {
        let entries: Vec<BlacklistEntry> =
            serde_json::from_str(r#"["foo", {"identifier": "bar", "version": ">=2"}]"#).unwrap();
        assert_eq!(entries[0], BlacklistEntry::Identifier("foo".to_string()));
        assert_eq!(entries[1].identifier(), "bar");
        assert_eq!(entries[1].to_string(), "bar (>=2)");
    }

    #[test]
    fn test_compatibility() {
        let filter = pipeline(ManagerOptions::default().with_host_capability("webcam"));

        let too_new = descriptor(PluginManifest::new("foo").requires_host(">=2"));
        assert_eq!(filter.check(&too_new, false).state(), PluginState::RejectedIncompatible);

        let needs_gpio = descriptor(PluginManifest::new("bar").requires_capability("gpio"));
        assert_eq!(filter.check(&needs_gpio, false).state(), PluginState::RejectedIncompatible);

        let fine = descriptor(PluginManifest::new("baz").requires_host(">=1.4").requires_capability("webcam"));
        assert_eq!(filter.check(&fine, false), Verdict::Accept);
    }

    #[test]
    fn test_compatibility_escape_hatch() {
        let filter = pipeline(
            ManagerOptions::default()
                .ignore_compatibility("foo")
                .blacklist(BlacklistEntry::Identifier("foo".to_string())),
        );
        let foo = descriptor(PluginManifest::new("foo").requires_host(">=2"));

        assert_eq!(filter.check(&foo, false), Verdict::Accept);
    }

    #[test]
    fn test_validators_run_in_order() {
        let filter = pipeline(
            ManagerOptions::default()
                .with_validator(|_, descriptor: &PluginDescriptor| descriptor.identifier() != "evil")
                .with_validator(|phase, _: &PluginDescriptor| phase == ValidationPhase::BeforeLoad),
        );

        let evil = descriptor(PluginManifest::new("evil"));
        assert_eq!(filter.check(&evil, false).state(), PluginState::RejectedValidator);

        let good = descriptor(PluginManifest::new("good"));
        assert_eq!(filter.check(&good, false), Verdict::Accept);
        assert!(!filter.validate(ValidationPhase::AfterLoad, &good));
    }

    #[test]
    fn test_restart_patterns() {
        let filter = pipeline(ManagerOptions::default());

        assert!(filter.needs_restart(&["host.server.http.routes".to_string()]));
        assert!(filter.needs_restart(&["host.ui.tab".to_string(), "host.printer.factory".to_string()]));
        assert!(!filter.needs_restart(&["host.ui.tab".to_string()]));
        assert!(!filter.needs_restart(&[]));

        let literal = pipeline(ManagerOptions::default().with_restart_needing_hook("host.[broken"));
        assert!(literal.needs_restart(&["host.[broken".to_string()]));
    }

    #[test]
    fn test_classify_candidates() {
        let filter = pipeline(ManagerOptions::default().disable("off"));
        let candidate = |identifier: &str, manifest: Result<PluginManifest, String>| Candidate {
            identifier: identifier.to_string(),
            location: std::path::PathBuf::from("/plugins").join(identifier),
            bundled: false,
            manifest,
        };

        let fine = filter.classify(&candidate("fine", Ok(PluginManifest::new("fine").with_hook("host.server.http.routes"))));
        assert_eq!(fine.state, PluginState::Validated);
        assert!(fine.restart_required);
        assert!(fine.reason.is_none());

        let off = filter.classify(&candidate("off", Ok(PluginManifest::new("off"))));
        assert_eq!(off.state, PluginState::Disabled);
        assert_eq!(off.reason.as_deref(), Some(DISABLED_REASON));

        let broken = filter.classify(&candidate("pi_support", Err("bad manifest".to_string())));
        assert_eq!(broken.state, PluginState::RejectedValidator);
        assert_eq!(broken.reason.as_deref(), Some("bad manifest"));
        assert!(broken.bundled);
    }

    #[test]
    fn test_bundled() {
        let filter = pipeline(ManagerOptions::default());
        assert!(filter.is_bundled("file_check"));
        assert!(!filter.is_bundled("foo"));
    }
}
