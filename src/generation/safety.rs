use crate::config::schema::SafetyConfig;
use crate::generation::response::CommandResponse;

/// Highest confidence a command matching a dangerous pattern may keep
pub const DANGEROUS_CONFIDENCE_CAP: f64 = 0.5;

pub const PRIVILEGE_WARNING: &str = "⚠️ This command requires administrative privileges";
pub const RECURSIVE_WARNING: &str = "⚠️ This command will operate recursively on directories";

const PRIVILEGE_MARKER: &str = "sudo";
const RECURSIVE_FLAG: &str = "-r";
const RECURSIVE_VERBS: &[&str] = &["rm", "chmod", "chown"];

/// Checks applied in order; each may append one warning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SafetyRule {
    DangerousPattern,
    PrivilegeEscalation,
    RecursiveOperation,
}

const RULES: [SafetyRule; 3] = [
    SafetyRule::DangerousPattern,
    SafetyRule::PrivilegeEscalation,
    SafetyRule::RecursiveOperation,
];

/// What a rule wants done to the response
#[derive(Debug, PartialEq)]
struct Finding {
    warning: String,
    confidence_cap: Option<f64>,
}

/// Flags risky commands by appending warnings and capping confidence
///
/// Never raises confidence and never removes earlier warnings.
#[derive(Debug, Clone)]
pub struct SafetyChecker {
    dangerous_patterns: Vec<String>,
}

impl SafetyChecker {
    #[must_use]
    pub fn new(dangerous_patterns: Vec<String>) -> Self {
        Self { dangerous_patterns }
    }

    #[must_use]
    pub fn from_config(config: &SafetyConfig) -> Self {
        Self::new(config.dangerous_commands.clone())
    }

    /// Classify a response in place. Declined responses are left alone.
    pub fn check(&self, response: &mut CommandResponse) {
        if response.command.is_empty() {
            return;
        }

        let command = response.command.to_lowercase();

        for rule in RULES {
            if let Some(finding) = self.evaluate(rule, &command, response) {
                response.append_warning(&finding.warning);
                if let Some(cap) = finding.confidence_cap {
                    response.confidence = response.confidence.min(cap);
                }
            }
        }
    }

    fn evaluate(
        &self,
        rule: SafetyRule,
        command: &str,
        response: &CommandResponse,
    ) -> Option<Finding> {
        match rule {
            SafetyRule::DangerousPattern => {
                // first hit only
                let pattern = self
                    .dangerous_patterns
                    .iter()
                    .find(|p| !p.is_empty() && command.contains(&p.to_lowercase()))?;

                tracing::warn!(
                    command = %response.command,
                    pattern = %pattern,
                    "Dangerous command pattern detected"
                );

                Some(Finding {
                    warning: format!(
                        "⚠️ DANGER: This command contains '{pattern}' which can be destructive"
                    ),
                    confidence_cap: Some(DANGEROUS_CONFIDENCE_CAP),
                })
            }
            SafetyRule::PrivilegeEscalation => {
                (command.contains(PRIVILEGE_MARKER) && !response.warning.contains(PRIVILEGE_MARKER))
                    .then(|| Finding {
                        warning: PRIVILEGE_WARNING.to_string(),
                        confidence_cap: None,
                    })
            }
            SafetyRule::RecursiveOperation => (command.contains(RECURSIVE_FLAG)
                && RECURSIVE_VERBS.iter().any(|verb| command.contains(verb)))
            .then(|| Finding {
                warning: RECURSIVE_WARNING.to_string(),
                confidence_cap: None,
            }),
        }
    }
}
