//! Six-field method classification drawn from closed vocabularies.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every member of the vocabulary, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Returns the configuration spelling of the value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum! {
    /// Top-level business area a method belongs to.
    Domain {
        /// Casefiles, sessions, and other workspace state.
        Workspace => "workspace",
        /// Mail, chat, and messaging integrations.
        Communication => "communication",
        /// Pipelines and multi-step orchestration.
        Automation => "automation",
        /// Documents, spreadsheets, and stored knowledge.
        Knowledge => "knowledge",
    }
}

closed_enum! {
    /// Service area inside a domain.
    Subdomain {
        /// Casefile management.
        Casefile => "casefile",
        /// Tool session tracking.
        ToolSession => "tool_session",
        /// Conversational chat sessions.
        Chat => "chat",
        /// Mail provider integration.
        Gmail => "gmail",
        /// File storage integration.
        Drive => "drive",
        /// Spreadsheet integration.
        Sheets => "sheets",
        /// Composite pipelines.
        Pipeline => "pipeline",
    }
}

closed_enum! {
    /// Kind of operation the method performs.
    Capability {
        /// Creates a new resource.
        Create => "create",
        /// Reads a resource.
        Read => "read",
        /// Mutates an existing resource.
        Update => "update",
        /// Removes a resource.
        Delete => "delete",
        /// Queries or lists resources.
        Search => "search",
        /// Transforms or processes data.
        Process => "process",
        /// Runs an external action.
        Execute => "execute",
    }
}

closed_enum! {
    /// Structural complexity of the method.
    Complexity {
        /// Single step.
        Atomic => "atomic",
        /// Coordinates several atomic steps.
        Composite => "composite",
        /// Long chain of composite steps.
        Pipeline => "pipeline",
    }
}

closed_enum! {
    /// Release maturity of the method.
    Maturity {
        /// Unstable, may change without notice.
        Experimental => "experimental",
        /// Feature complete, still settling.
        Beta => "beta",
        /// Production ready.
        Stable => "stable",
        /// Scheduled for removal.
        Deprecated => "deprecated",
    }
}

closed_enum! {
    /// Whether the method reaches outside the process.
    IntegrationTier {
        /// Pure in-process logic.
        Internal => "internal",
        /// Calls a third-party API.
        External => "external",
        /// Mixes internal state with third-party calls.
        Hybrid => "hybrid",
    }
}

/// Full classification carried by every method definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Classification {
    /// Business domain.
    pub domain: Domain,
    /// Service area inside the domain.
    pub subdomain: Subdomain,
    /// Operation kind.
    pub capability: Capability,
    /// Structural complexity.
    pub complexity: Complexity,
    /// Release maturity.
    pub maturity: Maturity,
    /// Integration tier.
    pub integration_tier: IntegrationTier,
}

impl Classification {
    /// Creates a classification with `atomic`, `stable`, `internal` defaults for
    /// the secondary fields.
    #[must_use]
    pub const fn new(domain: Domain, subdomain: Subdomain, capability: Capability) -> Self {
        Self {
            domain,
            subdomain,
            capability,
            complexity: Complexity::Atomic,
            maturity: Maturity::Stable,
            integration_tier: IntegrationTier::Internal,
        }
    }

    /// Sets the complexity.
    #[must_use]
    pub const fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    /// Sets the maturity.
    #[must_use]
    pub const fn with_maturity(mut self, maturity: Maturity) -> Self {
        self.maturity = maturity;
        self
    }

    /// Sets the integration tier.
    #[must_use]
    pub const fn with_integration_tier(mut self, integration_tier: IntegrationTier) -> Self {
        self.integration_tier = integration_tier;
        self
    }
}

/// Partial classification declared by a tool. Unset fields inherit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationOverride {
    /// Domain override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    /// Subdomain override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<Subdomain>,
    /// Capability override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    /// Complexity override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    /// Maturity override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity: Option<Maturity>,
    /// Integration tier override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_tier: Option<IntegrationTier>,
}

/// One field where an override disagrees with the base classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationConflict {
    /// Classification field name (`domain`, `maturity`, ...).
    pub field: &'static str,
    /// Value declared by the override.
    pub declared: &'static str,
    /// Value carried by the base classification.
    pub inherited: &'static str,
}

impl ClassificationOverride {
    /// Returns `true` when no field is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the override on top of `base`.
    #[must_use]
    pub fn resolve(&self, base: &Classification) -> Classification {
        Classification {
            domain: self.domain.unwrap_or(base.domain),
            subdomain: self.subdomain.unwrap_or(base.subdomain),
            capability: self.capability.unwrap_or(base.capability),
            complexity: self.complexity.unwrap_or(base.complexity),
            maturity: self.maturity.unwrap_or(base.maturity),
            integration_tier: self.integration_tier.unwrap_or(base.integration_tier),
        }
    }

    /// Lists every explicitly set field that differs from `base`, in field order.
    #[must_use]
    pub fn conflicts(&self, base: &Classification) -> Vec<ClassificationConflict> {
        fn check<T: Copy + PartialEq>(
            out: &mut Vec<ClassificationConflict>,
            field: &'static str,
            declared: Option<T>,
            inherited: T,
            name: fn(T) -> &'static str,
        ) {
            if let Some(declared) = declared
                && declared != inherited
            {
                out.push(ClassificationConflict {
                    field,
                    declared: name(declared),
                    inherited: name(inherited),
                });
            }
        }

        let mut out = Vec::new();
        check(&mut out, "domain", self.domain, base.domain, Domain::as_str);
        check(&mut out, "subdomain", self.subdomain, base.subdomain, Subdomain::as_str);
        check(&mut out, "capability", self.capability, base.capability, Capability::as_str);
        check(&mut out, "complexity", self.complexity, base.complexity, Complexity::as_str);
        check(&mut out, "maturity", self.maturity, base.maturity, Maturity::as_str);
        check(
            &mut out,
            "integration_tier",
            self.integration_tier,
            base.integration_tier,
            IntegrationTier::as_str,
        );
        out
    }
}

impl From<Classification> for ClassificationOverride {
    fn from(value: Classification) -> Self {
        Self {
            domain: Some(value.domain),
            subdomain: Some(value.subdomain),
            capability: Some(value.capability),
            complexity: Some(value.complexity),
            maturity: Some(value.maturity),
            integration_tier: Some(value.integration_tier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Classification {
        Classification::new(Domain::Workspace, Subdomain::Casefile, Capability::Create)
    }

    #[test]
    fn override_falls_back_to_base() {
        let over = ClassificationOverride {
            maturity: Some(Maturity::Beta),
            ..ClassificationOverride::default()
        };
        let resolved = over.resolve(&base());
        assert_eq!(resolved.maturity, Maturity::Beta);
        assert_eq!(resolved.domain, Domain::Workspace);
        assert_eq!(resolved.capability, Capability::Create);
    }

    #[test]
    fn conflicts_only_report_explicit_differences() {
        let over = ClassificationOverride {
            domain: Some(Domain::Workspace),
            capability: Some(Capability::Read),
            ..ClassificationOverride::default()
        };
        let conflicts = over.conflicts(&base());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "capability");
        assert_eq!(conflicts[0].declared, "read");
        assert_eq!(conflicts[0].inherited, "create");
    }

    #[test]
    fn unknown_vocabulary_is_rejected() {
        let err = serde_json::from_str::<Domain>("\"finance\"");
        assert!(err.is_err());
        let ok: IntegrationTier = serde_json::from_str("\"hybrid\"").unwrap();
        assert_eq!(ok, IntegrationTier::Hybrid);
    }
}
