use anyhow::Result;

use super::{ApplyResult, UserOutcome};
use crate::Context;
use crate::state::StateFile;
use crate::ui;
use userkit::{ChangeSet, DeclaredUser, Reconciler, UserApi, UserState};

/// Parallel reads; refresh has no --jobs flag.
const REFRESH_JOBS: usize = 4;

pub fn run(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let state_path = ctx.state_path()?;
    let mut state = StateFile::load(&state_path)?;

    let usernames = state.usernames();
    if usernames.is_empty() {
        ui::info("No tracked users to refresh");
        return Ok(());
    }

    let client = config.client()?;
    if !ctx.quiet {
        ui::header(&format!(
            "Refreshing {} users from {} ({})",
            usernames.len(),
            config.cluster.url,
            client.family()
        ));
    }

    let outcomes = super::run_parallel(&usernames, REFRESH_JOBS, |username| {
        refresh_user(
            &client,
            username,
            state.user_state(username),
            config.find_user(username),
        )
    })?;

    for outcome in &outcomes {
        state.record(&outcome.username, &outcome.state, None);
    }
    state.save(&state_path)?;

    let summary = super::report(ctx, &outcomes);
    super::finish(ctx, &summary)
}

/// Re-read one user and compare it with its declaration, if any
fn refresh_user<C: UserApi + ?Sized>(
    client: &C,
    username: &str,
    mut current: UserState,
    declared: Option<&DeclaredUser>,
) -> UserOutcome {
    if let Err(err) = Reconciler::new(client).read(&mut current) {
        return UserOutcome::failed(username, current, &err);
    }

    let drift = match (current.observed(), declared) {
        (Some(observed), Some(declared)) => ChangeSet::diff(observed, declared),
        _ => ChangeSet::new(),
    };

    let result = if !current.is_present() {
        ApplyResult::Removed
    } else if drift.is_empty() {
        ApplyResult::NoChange
    } else {
        ApplyResult::Drifted {
            fields: drift.to_string(),
        }
    };
    UserOutcome::new(username, current, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use userkit::transport::MockTransport;
    use userkit::{ApiFamily, ClientHandle};

    fn client() -> (ClientHandle, MockTransport) {
        let mock = MockTransport::new();
        (
            ClientHandle::for_family(ApiFamily::V7, Arc::new(mock.clone())),
            mock,
        )
    }

    #[test]
    fn test_refresh_detects_drift() {
        let (client, mock) = client();
        mock.push_json(
            200,
            &json!({"alice": {"username": "alice", "roles": ["viewer"], "enabled": true}}),
        );

        let declared = DeclaredUser::new("alice").with_roles(["admin"]);
        let outcome = refresh_user(
            &client,
            "alice",
            UserState::present("alice"),
            Some(&declared),
        );

        assert_eq!(
            outcome.result,
            ApplyResult::Drifted {
                fields: "roles".to_string()
            }
        );
        assert_eq!(
            outcome.state.observed().unwrap().roles.iter().next().unwrap(),
            "viewer"
        );
    }

    #[test]
    fn test_refresh_forgets_missing_user() {
        let (client, mock) = client();
        mock.push_response(404, "{}");

        let outcome = refresh_user(&client, "ghost", UserState::present("ghost"), None);

        assert_eq!(outcome.result, ApplyResult::Removed);
        assert_eq!(outcome.state, UserState::Absent);
    }

    #[test]
    fn test_refresh_keeps_state_on_error() {
        let (client, mock) = client();
        mock.push_response(500, "{}");

        let outcome = refresh_user(&client, "alice", UserState::present("alice"), None);

        assert!(!outcome.result.is_success());
        assert_eq!(outcome.state.id(), Some("alice"));
    }

    #[test]
    fn test_refresh_undeclared_user_is_unchanged() {
        let (client, mock) = client();
        mock.push_json(
            200,
            &json!({"bob": {"username": "bob", "roles": [], "enabled": true}}),
        );

        let outcome = refresh_user(&client, "bob", UserState::present("bob"), None);

        assert_eq!(outcome.result, ApplyResult::NoChange);
    }
}
