//! Portal scenarios
//!
//! Each scenario is a plain function over a [`ScenarioContext`]. Scenarios
//! that create fixed-name server resources, or touch the account's shared
//! billing state, are marked `serial`.

use crate::runner::ScenarioDef;

mod audit_log;
mod auth;
mod billing;
mod keys;
mod teams;

/// Every registered scenario, in report order
pub fn all() -> Vec<ScenarioDef> {
    vec![
        ScenarioDef {
            name: "login_redirects_to_serverless",
            description: "Valid credentials land on the serverless dashboard",
            tags: &["auth", "smoke"],
            serial: false,
            run: auth::login_redirects_to_serverless,
        },
        ScenarioDef {
            name: "invalid_login_shows_error",
            description: "Wrong password is rejected on the sign-in form",
            tags: &["auth"],
            serial: false,
            run: auth::invalid_login_shows_error,
        },
        ScenarioDef {
            name: "ssh_key_create",
            description: "A new SSH key appears in the key table",
            tags: &["ssh-keys"],
            serial: true,
            run: keys::ssh_key_create,
        },
        ScenarioDef {
            name: "api_key_create_and_copy",
            description: "A new API key is listed and can be copied",
            tags: &["api-keys", "smoke"],
            serial: false,
            run: keys::api_key_create_and_copy,
        },
        ScenarioDef {
            name: "declined_card_generic",
            description: "A generically declined card shows an error and creates no invoice",
            tags: &["billing"],
            serial: true,
            run: billing::declined_card_generic,
        },
        ScenarioDef {
            name: "audit_log_pagination",
            description: "Audit log shows 20 entries per page with first and last page buttons",
            tags: &["audit-log"],
            serial: false,
            run: audit_log::audit_log_pagination,
        },
        ScenarioDef {
            name: "team_create_and_delete",
            description: "A team can be created and removed again",
            tags: &["teams"],
            serial: false,
            run: teams::team_create_and_delete,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let scenarios = all();
        let names: HashSet<_> = scenarios.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), scenarios.len());
        assert!(scenarios.iter().all(|s| !s.tags.is_empty()));
    }
}
