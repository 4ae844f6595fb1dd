use anyhow::{Result, bail};

use crate::Context;
use crate::state::StateFile;
use crate::ui;
use userkit::{ChangeSet, Reconciler, UserState};

pub fn run(ctx: &Context, username: &str) -> Result<()> {
    let config = ctx.load_config()?;
    let state_path = ctx.state_path()?;
    let mut state = StateFile::load(&state_path)?;

    if state.users.contains_key(username) {
        bail!("User '{username}' is already tracked");
    }

    let client = config.client()?;
    let mut current = UserState::Absent;
    if let Err(err) = Reconciler::new(&client).import(&mut current, username) {
        ui::dim(err.category().advice());
        return Err(err.into());
    }

    let Some(observed) = current.observed() else {
        bail!("User '{username}' does not exist on {}", config.cluster.url);
    };

    // Credentials are unknown until the next apply sends them.
    state.record(username, &current, None);
    state.save(&state_path)?;

    ui::success(&format!("Imported {username}"));
    if !ctx.quiet {
        let roles: Vec<&str> = observed.roles.iter().map(String::as_str).collect();
        ui::kv("Roles", &roles.join(", "));
        ui::kv("Enabled", &observed.enabled.to_string());
    }

    match config.find_user(username) {
        Some(declared) => {
            let changes = ChangeSet::diff(observed, declared);
            if !changes.is_empty() {
                ui::info(&format!("Next apply will update {changes}"));
            }
        }
        None => ui::warn(&format!(
            "{username} is not in the config; the next apply will delete it"
        )),
    }

    Ok(())
}
