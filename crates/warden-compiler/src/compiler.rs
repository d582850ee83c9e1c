//! # Template Compiler

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warden_core::{
    validate_short_name, TargetFailure, TargetName, TargetRule, Template, TemplateKind,
    WardenError, ENTRY_POINT,
};
use warden_driver::rego::check_syntax;
use warden_driver::{ModuleChange, ModuleId};
use warden_target::TargetRegistry;

use crate::schema::ConstraintSchema;
use crate::source::{defines_rule, rewrite_lib, rewrite_main};

/// How per-target failures affect a template as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilePolicy {
    /// Usable if at least one target compiled; failures are reported.
    #[default]
    BestEffort,
    /// Any target failure rejects the template.
    Strict,
}

impl std::str::FromStr for CompilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-effort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown compile policy {other:?} (expected best-effort or strict)")),
        }
    }
}

/// The rewritten modules of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Id of the main module.
    pub module: ModuleId,
    /// Rewritten main module source.
    pub source: String,
    /// Rewritten library modules.
    pub libs: Vec<(ModuleId, String)>,
}

impl CompiledArtifact {
    /// Every module of this artifact, main module first.
    pub fn modules(&self) -> impl Iterator<Item = (&ModuleId, &str)> {
        std::iter::once((&self.module, self.source.as_str()))
            .chain(self.libs.iter().map(|(id, source)| (id, source.as_str())))
    }
}

/// A compiled template: usable artifacts, per-target failures, and the
/// schema its constraints must satisfy.
#[derive(Debug)]
pub struct CompiledTemplate {
    /// The template as submitted.
    pub template: Template,
    /// Schema of the template's constraints.
    pub schema: ConstraintSchema,
    /// Artifacts of the targets that compiled.
    pub artifacts: BTreeMap<TargetName, CompiledArtifact>,
    /// Targets that failed, in target-name order.
    pub failures: Vec<TargetFailure>,
}

impl CompiledTemplate {
    /// The template kind.
    pub fn kind(&self) -> &TemplateKind {
        &self.template.kind
    }

    /// The artifact of one target, if it compiled.
    pub fn artifact(&self, target: &TargetName) -> Option<&CompiledArtifact> {
        self.artifacts.get(target)
    }

    /// The failure of one target, if it failed.
    pub fn failure(&self, target: &TargetName) -> Option<&TargetFailure> {
        self.failures.iter().find(|f| &f.target == target)
    }

    /// Ids of every main module (one per compiled target).
    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.artifacts.values().map(|a| &a.module)
    }

    /// The store change that installs this template in place of `previous`.
    ///
    /// Every module of `previous` (libraries included) is removed, then every
    /// module of `self` is registered, in one batch.
    pub fn module_change(&self, previous: Option<&CompiledTemplate>) -> ModuleChange {
        let mut change = ModuleChange::new();
        for id in previous.into_iter().flat_map(CompiledTemplate::module_ids) {
            change = change.remove(id.clone());
        }
        for artifact in self.artifacts.values() {
            for (id, source) in artifact.modules() {
                change = change.put(id.clone(), source);
            }
        }
        change
    }

    /// The change that removes every module of this template.
    pub fn removal(&self) -> ModuleChange {
        self.module_ids()
            .fold(ModuleChange::new(), |change, id| change.remove(id.clone()))
    }
}

/// Compiles templates against a fixed set of targets.
#[derive(Debug, Clone)]
pub struct TemplateCompiler {
    targets: Arc<TargetRegistry>,
    policy: CompilePolicy,
}

impl TemplateCompiler {
    /// A best-effort compiler for `targets`.
    pub fn new(targets: Arc<TargetRegistry>) -> Self {
        Self {
            targets,
            policy: CompilePolicy::default(),
        }
    }

    /// Set the compile policy.
    pub fn with_policy(mut self, policy: CompilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The compile policy in effect.
    pub fn policy(&self) -> CompilePolicy {
        self.policy
    }

    /// The targets templates are compiled against.
    pub fn targets(&self) -> &Arc<TargetRegistry> {
        &self.targets
    }

    /// Compile a template.
    ///
    /// # Errors
    ///
    /// - [`WardenError::Validation`] for an invalid short name.
    /// - [`WardenError::SchemaValidation`] for a malformed parameter schema.
    /// - The single target's error when the only failing target leaves
    ///   nothing usable.
    /// - [`WardenError::TemplateRejected`] when several targets fail and
    ///   nothing is usable, or any target fails under
    ///   [`CompilePolicy::Strict`].
    pub fn compile(&self, template: &Template) -> Result<CompiledTemplate, WardenError> {
        for short_name in &template.short_names {
            validate_short_name(short_name)?;
        }
        let schema = ConstraintSchema::derive(template, &self.targets)?;

        let mut artifacts = BTreeMap::new();
        let mut failures = Vec::new();
        for (target, rule) in &template.targets {
            match self.compile_target(&template.kind, target, rule) {
                Ok(artifact) => {
                    artifacts.insert(target.clone(), artifact);
                }
                Err(error) => failures.push(TargetFailure {
                    target: target.clone(),
                    error,
                }),
            }
        }

        let rejected = artifacts.is_empty() || (self.policy == CompilePolicy::Strict && !failures.is_empty());
        if rejected {
            if artifacts.is_empty() && failures.len() == 1 {
                if let Some(failure) = failures.pop() {
                    return Err(failure.error);
                }
            }
            return Err(WardenError::TemplateRejected {
                kind: template.kind.to_string(),
                failures,
            });
        }

        for failure in &failures {
            tracing::warn!(
                kind = %template.kind,
                target_name = %failure.target,
                error = %failure.error,
                "template target failed to compile; continuing with remaining targets"
            );
        }

        Ok(CompiledTemplate {
            template: template.clone(),
            schema,
            artifacts,
            failures,
        })
    }

    fn compile_target(
        &self,
        kind: &TemplateKind,
        target: &TargetName,
        rule: &TargetRule,
    ) -> Result<CompiledArtifact, WardenError> {
        self.targets.lookup(target)?;
        let syntax = |reason: String| WardenError::RuleSyntax {
            kind: kind.to_string(),
            target: target.to_string(),
            reason,
        };

        let module = ModuleId::for_template(target, kind);
        let source = rewrite_main(&rule.rego, &module).map_err(syntax)?;
        let libs = rule
            .libs
            .iter()
            .enumerate()
            .map(|(i, lib)| rewrite_lib(lib, &module).map_err(|reason| syntax(format!("library {i}: {reason}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let mut declared: BTreeMap<&ModuleId, usize> = BTreeMap::new();
        for (i, (id, _)) in libs.iter().enumerate() {
            if let Some(first) = declared.insert(id, i) {
                let package = id
                    .as_str()
                    .strip_prefix(module.as_str())
                    .map_or(id.as_str(), |rest| rest.trim_start_matches('.'));
                return Err(syntax(format!(
                    "library {i}: package `{package}` is already declared by library {first}"
                )));
            }
        }

        let names: Vec<String> = std::iter::once(&module)
            .chain(libs.iter().map(|(id, _)| id))
            .map(|id| format!("{id}.rego"))
            .collect();
        let sources = std::iter::once(source.as_str()).chain(libs.iter().map(|(_, s)| s.as_str()));
        check_syntax(names.iter().map(String::as_str).zip(sources))
            .map_err(|err| syntax(format!("{}: {}", err.path, err.reason)))?;

        if !defines_rule(&source, ENTRY_POINT) {
            return Err(WardenError::MissingEntryPoint {
                kind: kind.to_string(),
                target: target.to_string(),
                entry_point: ENTRY_POINT.to_string(),
            });
        }

        Ok(CompiledArtifact { module, source, libs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_target::DocumentTarget;

    const RULE: &str = r#"package k
import rego.v1

violation contains {"msg": msg} if {
    input.review.value > input.parameters.threshold
    msg := "too big"
}
"#;

    fn t(name: &str) -> TargetName {
        TargetName::new(name).unwrap()
    }

    fn compiler(policy: CompilePolicy) -> TemplateCompiler {
        let registry = TargetRegistry::builder()
            .register(DocumentTarget::new(t("t1")))
            .unwrap()
            .register(DocumentTarget::new(t("t2")))
            .unwrap()
            .build();
        TemplateCompiler::new(registry).with_policy(policy)
    }

    fn template() -> Template {
        Template::new(TemplateKind::new("K").unwrap())
            .with_schema(json!({"properties": {"threshold": {"type": "integer"}}}))
    }

    #[test]
    fn compiles_every_target() {
        let compiled = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target(t("t1"), RULE).with_target(t("t2"), RULE))
            .unwrap();
        assert!(compiled.failures.is_empty());
        assert_eq!(compiled.artifacts.len(), 2);
        let artifact = compiled.artifact(&t("t1")).unwrap();
        assert_eq!(artifact.module.as_str(), "templates.t1.K");
        assert!(artifact.source.starts_with("package templates.t1.K\n"));
    }

    #[test]
    fn best_effort_keeps_partial_success() {
        let compiled = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target(t("t1"), RULE).with_target(t("t2"), "package k\nviolation[ {"))
            .unwrap();
        assert_eq!(compiled.artifacts.len(), 1);
        assert_eq!(compiled.failures.len(), 1);
        let failure = compiled.failure(&t("t2")).unwrap();
        assert!(matches!(failure.error, WardenError::RuleSyntax { ref target, .. } if target == "t2"));
    }

    #[test]
    fn strict_rejects_partial_success() {
        let err = compiler(CompilePolicy::Strict)
            .compile(&template().with_target(t("t1"), RULE).with_target(t("t2"), "package k\nviolation[ {"))
            .unwrap_err();
        match err {
            WardenError::TemplateRejected { kind, failures } => {
                assert_eq!(kind, "K");
                assert_eq!(failures.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn single_failure_is_returned_directly() {
        let err = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target(t("t1"), "package k\nimport rego.v1\nallow if { true }\n"))
            .unwrap_err();
        assert!(matches!(
            err,
            WardenError::MissingEntryPoint { ref entry_point, .. } if entry_point == "violation"
        ));
    }

    #[test]
    fn several_failures_are_aggregated() {
        let err = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target(t("t1"), "violation[x] { x := 1 }").with_target(t("t3"), RULE))
            .unwrap_err();
        let WardenError::TemplateRejected { failures, .. } = err else {
            panic!("expected TemplateRejected");
        };
        assert_eq!(failures.len(), 2);
        assert!(matches!(failures[0].error, WardenError::RuleSyntax { .. }));
        assert!(matches!(failures[1].error, WardenError::UnknownTarget(ref n) if n == "t3"));
    }

    #[test]
    fn no_targets_is_rejected() {
        let err = compiler(CompilePolicy::BestEffort).compile(&template()).unwrap_err();
        assert!(matches!(err, WardenError::TemplateRejected { ref failures, .. } if failures.is_empty()));
    }

    #[test]
    fn foreign_data_reference_is_a_syntax_error() {
        let rule = "package k\nimport rego.v1\nviolation contains x if { x := data.templates.t2.K.violation[_] }\n";
        let err = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target(t("t1"), rule))
            .unwrap_err();
        assert!(matches!(err, WardenError::RuleSyntax { ref reason, .. } if reason.contains("data.templates")));
    }

    #[test]
    fn libraries_are_rewritten_and_checked() {
        let main = r#"package k
import rego.v1
import data.lib.limits

violation contains {"msg": "too big"} if {
    limits.exceeds(input.review.value, input.parameters.threshold)
}
"#;
        let lib = "package lib.limits\nimport rego.v1\nexceeds(v, max) if { v > max }\n";
        let rule = TargetRule::new(main).with_lib(lib);
        let compiled = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target_rule(t("t1"), rule))
            .unwrap();
        let artifact = compiled.artifact(&t("t1")).unwrap();
        assert_eq!(artifact.libs.len(), 1);
        assert_eq!(artifact.libs[0].0.as_str(), "templates.t1.K.lib.limits");
        assert!(artifact.source.contains("import data.templates.t1.K.lib.limits"));
        assert_eq!(artifact.modules().count(), 2);
    }

    #[test]
    fn libraries_sharing_a_package_are_rejected() {
        let main = r#"package k
import rego.v1
import data.lib.util

violation contains {"msg": "odd and big"} if {
    util.big(input.review.value)
    util.odd(input.review.value)
}
"#;
        let rule = TargetRule::new(main)
            .with_lib("package lib.util\nimport rego.v1\nbig(v) if { v > 10 }\n")
            .with_lib("package lib.util\nimport rego.v1\nodd(v) if { v % 2 == 1 }\n");
        let err = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target_rule(t("t1"), rule))
            .unwrap_err();
        match err {
            WardenError::RuleSyntax { target, reason, .. } => {
                assert_eq!(target, "t1");
                assert!(reason.contains("library 1"), "{reason}");
                assert!(reason.contains("`lib.util`"), "{reason}");
            }
            other => panic!("expected RuleSyntax, got {other:?}"),
        }
    }

    #[test]
    fn invalid_short_name() {
        let err = compiler(CompilePolicy::BestEffort)
            .compile(&template().with_target(t("t1"), RULE).with_short_names(["Bad Name"]))
            .unwrap_err();
        assert!(matches!(err, WardenError::Validation(_)));
    }

    #[test]
    fn module_change_replaces_previous_modules() {
        let compiler = compiler(CompilePolicy::BestEffort);
        let old = compiler
            .compile(&template().with_target(t("t1"), RULE).with_target(t("t2"), RULE))
            .unwrap();
        let new = compiler.compile(&template().with_target(t("t1"), RULE)).unwrap();

        let change = new.module_change(Some(&old));
        let removed: Vec<&str> = change.removals().iter().map(ModuleId::as_str).collect();
        assert_eq!(removed, vec!["templates.t1.K", "templates.t2.K"]);
        let put: Vec<&str> = change.puts().map(ModuleId::as_str).collect();
        assert_eq!(put, vec!["templates.t1.K"]);

        assert_eq!(new.removal().removals().len(), 1);
    }

    #[test]
    fn compile_policy_parses_and_deserializes() {
        assert_eq!("strict".parse::<CompilePolicy>().unwrap(), CompilePolicy::Strict);
        assert!("lenient".parse::<CompilePolicy>().is_err());
        let policy: CompilePolicy = serde_json::from_str("\"best-effort\"").unwrap();
        assert_eq!(policy, CompilePolicy::BestEffort);
    }
}
