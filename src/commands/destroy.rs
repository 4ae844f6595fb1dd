use anyhow::{Result, bail};

use super::{ApplyResult, UserOutcome};
use crate::Context;
use crate::state::StateFile;
use crate::ui;
use userkit::{Reconciler, UserApi, UserState};

const DESTROY_JOBS: usize = 4;

pub fn run(ctx: &Context, username: Option<&str>) -> Result<()> {
    let config = ctx.load_config()?;
    let state_path = ctx.state_path()?;
    let mut state = StateFile::load(&state_path)?;

    let targets = match username {
        Some(username) if state.users.contains_key(username) => vec![username.to_string()],
        Some(username) => bail!("User '{username}' is not tracked in {}", state_path.display()),
        None => state.usernames(),
    };
    if targets.is_empty() {
        ui::info("No tracked users to destroy");
        return Ok(());
    }

    let client = config.client()?;
    if !ctx.quiet {
        ui::header(&format!(
            "Destroying {} users on {}",
            targets.len(),
            config.cluster.url
        ));
    }

    let outcomes = super::run_parallel(&targets, DESTROY_JOBS, |username| {
        destroy_user(&client, username, state.user_state(username))
    })?;

    for outcome in &outcomes {
        state.record(&outcome.username, &outcome.state, None);
    }
    state.save(&state_path)?;

    let summary = super::report(ctx, &outcomes);
    super::finish(ctx, &summary)
}

/// Delete one user; local state is dropped whatever the outcome
fn destroy_user<C: UserApi + ?Sized>(
    client: &C,
    username: &str,
    mut current: UserState,
) -> UserOutcome {
    match Reconciler::new(client).delete(&mut current) {
        Ok(()) => UserOutcome::new(username, current, ApplyResult::Removed),
        Err(err) => UserOutcome::failed(username, current, &err),
    }
}
