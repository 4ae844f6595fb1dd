use anyhow::Result;

use super::{ApplyResult, UserOutcome};
use crate::Context;
use crate::state::{CredentialDigests, StateFile, StoredUser};
use crate::ui;
use userkit::{ChangeSet, DeclaredUser, Field, Reconciler, UserApi, UserState};

/// One unit of work for apply
enum Task<'a> {
    /// Make the cluster match a declared user
    Converge(&'a DeclaredUser),
    /// Delete a tracked user that is no longer declared
    Prune(String),
}

impl Task<'_> {
    fn username(&self) -> &str {
        match self {
            Self::Converge(user) => &user.username,
            Self::Prune(username) => username,
        }
    }
}

pub fn run(ctx: &Context, dry_run: bool, jobs: usize) -> Result<()> {
    let config = ctx.load_config()?;
    let state_path = ctx.state_path()?;
    let mut state = StateFile::load(&state_path)?;
    let client = config.client()?;

    let mut tasks: Vec<Task> = config.users.iter().map(Task::Converge).collect();
    tasks.extend(
        state
            .usernames()
            .into_iter()
            .filter(|username| config.find_user(username).is_none())
            .map(Task::Prune),
    );

    if !ctx.quiet {
        ui::header(&format!(
            "{} {} users on {} ({})",
            if dry_run { "Planning" } else { "Applying" },
            tasks.len(),
            config.cluster.url,
            client.family()
        ));
    }

    let outcomes = super::run_parallel(&tasks, jobs, |task| {
        let current = state.user_state(task.username());
        match task {
            Task::Converge(desired) => converge(
                &client,
                desired,
                current,
                state.users.get(&desired.username),
                dry_run,
            ),
            Task::Prune(username) => prune(&client, username, current, dry_run),
        }
    })?;

    if !dry_run {
        for outcome in &outcomes {
            state.record(
                &outcome.username,
                &outcome.state,
                outcome.credentials.clone(),
            );
        }
        state.save(&state_path)?;
    }

    let summary = super::report(ctx, &outcomes);
    super::finish(ctx, &summary)
}

/// Bring one declared user in line with the cluster.
///
/// The user is read first, so a user deleted out of band is recreated and
/// fields changed out of band are put back.
fn converge<C: UserApi + ?Sized>(
    client: &C,
    desired: &DeclaredUser,
    mut current: UserState,
    stored: Option<&StoredUser>,
    dry_run: bool,
) -> UserOutcome {
    let reconciler = Reconciler::new(client);
    let username = desired.username.as_str();
    let credentials = CredentialDigests::of(desired);

    if let Err(err) = reconciler.read(&mut current) {
        return UserOutcome::failed(username, current, &err);
    }

    let Some(observed) = current.observed().cloned() else {
        if dry_run {
            return UserOutcome::new(
                username,
                current,
                ApplyResult::Skipped {
                    reason: "would create".to_string(),
                },
            );
        }
        return match reconciler.create(&mut current, desired) {
            Ok(()) => UserOutcome::new(username, current, ApplyResult::Created)
                .with_credentials(credentials),
            // The put went through if an identity was recorded.
            Err(err) if current.is_present() => {
                UserOutcome::failed(username, current, &err).with_credentials(credentials)
            }
            Err(err) => UserOutcome::failed(username, current, &err),
        };
    };

    let mut changes = ChangeSet::diff(&observed, desired);
    for field in credentials.changed_fields(stored.unwrap_or(&StoredUser::default())) {
        changes.insert(field);
    }

    if changes.is_empty() {
        return UserOutcome::new(username, current, ApplyResult::NoChange);
    }
    if dry_run {
        return UserOutcome::new(
            username,
            current,
            ApplyResult::Skipped {
                reason: format!("would update {changes}"),
            },
        );
    }

    let sends_credentials = changes.iter().any(Field::is_credential);
    match reconciler.update(&mut current, desired, &changes) {
        Ok(()) => {
            let outcome = UserOutcome::new(
                username,
                current,
                ApplyResult::Modified {
                    fields: changes.to_string(),
                },
            );
            if sends_credentials {
                outcome.with_credentials(credentials)
            } else {
                outcome
            }
        }
        Err(err) => UserOutcome::failed(username, current, &err),
    }
}

/// Delete a user that was dropped from the config
fn prune<C: UserApi + ?Sized>(
    client: &C,
    username: &str,
    mut current: UserState,
    dry_run: bool,
) -> UserOutcome {
    if dry_run {
        return UserOutcome::new(
            username,
            current,
            ApplyResult::Skipped {
                reason: "would delete".to_string(),
            },
        );
    }
    match Reconciler::new(client).delete(&mut current) {
        Ok(()) => UserOutcome::new(username, current, ApplyResult::Removed),
        Err(err) => UserOutcome::failed(username, current, &err),
    }
}
