use crate::tools::ToolCommand;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
    Degrade { reason_code: &'static str, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    /// Tools may only read or write the profile of the user who sent the message.
    pub enforce_user_scope: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { enforce_user_scope: true }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, requesting_user: &str, command: &ToolCommand) -> GuardrailDecision {
        if let Some(target) = command.target_user() {
            if self.enforce_user_scope && target != requesting_user {
                return GuardrailDecision::Deny {
                    reason_code: "cross_user_access",
                    user_message: format!(
                        "{} may only act on the requesting user ({requesting_user}).",
                        command.name()
                    ),
                };
            }
        }

        match command {
            ToolCommand::UpdatePreferences { preferences, .. } if preferences.is_empty() => {
                GuardrailDecision::Degrade {
                    reason_code: "empty_preference_update",
                    user_message: "No preferences were given, so nothing was changed.".to_string(),
                }
            }
            _ => GuardrailDecision::Allow,
        }
    }
}
