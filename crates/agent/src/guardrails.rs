use roomwise_core::config::GuardrailsConfig;

use crate::session::SessionContext;

/// What a tool does to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolAccess {
    ReadOnly,
    Write,
}

impl ToolAccess {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub guests_can_search: bool,
    pub writes_enabled: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { guests_can_search: true, writes_enabled: true }
    }
}

impl GuardrailPolicy {
    pub fn from_config(config: &GuardrailsConfig) -> Self {
        Self { guests_can_search: config.guests_can_search, writes_enabled: config.writes_enabled }
    }

    /// Read-only deployments keep every search tool but refuse ledger changes.
    pub fn read_only() -> Self {
        Self { writes_enabled: false, ..Self::default() }
    }

    pub fn evaluate(&self, access: ToolAccess, session: &SessionContext) -> GuardrailDecision {
        match access {
            ToolAccess::ReadOnly if session.is_guest() && !self.guests_can_search => {
                GuardrailDecision::Deny {
                    reason_code: "guest_search_disabled",
                    user_message: "Please sign in to search for rooms.".to_string(),
                }
            }
            ToolAccess::ReadOnly => GuardrailDecision::Allow,
            ToolAccess::Write if session.is_guest() => GuardrailDecision::Deny {
                reason_code: "sign_in_required",
                user_message: "Guests can look for rooms but need to sign in to book, change or cancel a meeting."
                    .to_string(),
            },
            ToolAccess::Write if !self.writes_enabled => GuardrailDecision::Deny {
                reason_code: "writes_disabled",
                user_message: "Bookings are temporarily read-only. You can still search for rooms."
                    .to_string(),
            },
            ToolAccess::Write => GuardrailDecision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use roomwise_core::config::GuardrailsConfig;
    use roomwise_core::domain::user::UserId;

    use super::{GuardrailDecision, GuardrailPolicy, ToolAccess};
    use crate::session::SessionContext;

    #[test]
    fn guests_may_search_but_not_write() {
        let policy = GuardrailPolicy::default();
        let guest = SessionContext::guest("req-1");

        assert_eq!(policy.evaluate(ToolAccess::ReadOnly, &guest), GuardrailDecision::Allow);
        assert!(matches!(
            policy.evaluate(ToolAccess::Write, &guest),
            GuardrailDecision::Deny { reason_code: "sign_in_required", .. }
        ));
    }

    #[test]
    fn read_only_deployment_refuses_writes_for_signed_in_users() {
        let user = SessionContext::for_user(UserId("user-alice".to_string()), "req-2");

        assert_eq!(GuardrailPolicy::default().evaluate(ToolAccess::Write, &user), GuardrailDecision::Allow);
        let decision = GuardrailPolicy::read_only().evaluate(ToolAccess::Write, &user);
        let GuardrailDecision::Deny { reason_code, user_message } = decision else {
            panic!("expected denial");
        };
        assert_eq!(reason_code, "writes_disabled");
        assert!(user_message.contains("read-only"));
    }

    #[test]
    fn guest_search_can_be_switched_off() {
        let policy = GuardrailPolicy { guests_can_search: false, ..GuardrailPolicy::default() };
        assert!(matches!(
            policy.evaluate(ToolAccess::ReadOnly, &SessionContext::guest("req-3")),
            GuardrailDecision::Deny { reason_code: "guest_search_disabled", .. }
        ));
    }

    #[test]
    fn policy_follows_the_deployment_config() {
        assert_eq!(GuardrailPolicy::from_config(&GuardrailsConfig::default()), GuardrailPolicy::default());

        let config = GuardrailsConfig { writes_enabled: false, guests_can_search: true };
        assert_eq!(GuardrailPolicy::from_config(&config), GuardrailPolicy::read_only());
    }
}
