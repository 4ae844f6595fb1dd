use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeSet;

use crate::Context;
use crate::config::Config;
use crate::state::{CredentialDigests, StateFile, StoredUser};
use crate::ui;
use userkit::ChangeSet;

/// What the next apply would do to a user, judged from local state only
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Create,
    Update(ChangeSet),
    Delete,
    InSync,
}

pub fn run(ctx: &Context) -> Result<()> {
    let config_path = ctx.config_path()?;
    let state_path = ctx.state_path()?;
    let config = Config::load(&config_path)?;
    let state = StateFile::load(&state_path)?;

    ui::header("esuser status");
    ui::kv("Config", &config_path.display().to_string());
    ui::kv("State", &state_path.display().to_string());
    ui::kv("Cluster", &config.cluster.url);
    ui::kv(
        "Version",
        config.cluster.version.as_deref().unwrap_or("detected on connect"),
    );
    ui::kv(
        "Last updated",
        &state.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    ui::section("Users");
    let usernames: BTreeSet<&str> = config
        .users
        .iter()
        .map(|u| u.username.as_str())
        .chain(state.users.keys().map(String::as_str))
        .collect();

    if usernames.is_empty() {
        ui::dim("No users declared or tracked");
        return Ok(());
    }

    for username in usernames {
        let stored = state.users.get(username);
        match pending(&config, username, stored) {
            Pending::InSync => println!("  {} {username}", "✓".green()),
            Pending::Create => println!("  {} {username} {}", "+".green(), "(create)".dimmed()),
            Pending::Delete => println!("  {} {username} {}", "-".red(), "(delete)".dimmed()),
            Pending::Update(changes) => println!(
                "  {} {username} {}",
                "~".yellow(),
                format!("(update {changes})").dimmed()
            ),
        }

        if ctx.verbose > 0
            && let Some(observed) = stored.and_then(|s| s.observed.as_ref())
        {
            let roles: Vec<&str> = observed.roles.iter().map(String::as_str).collect();
            ui::dim(&format!(
                "roles: [{}], enabled: {}",
                roles.join(", "),
                observed.enabled
            ));
        }
    }

    ui::dim("Run `esuser refresh` to compare against the live cluster");
    Ok(())
}

fn pending(config: &Config, username: &str, stored: Option<&StoredUser>) -> Pending {
    let Some(declared) = config.find_user(username) else {
        return Pending::Delete;
    };
    let Some(stored) = stored else {
        return Pending::Create;
    };

    let mut changes = match &stored.observed {
        Some(observed) => ChangeSet::diff(observed, declared),
        None => ChangeSet::new(),
    };
    for field in CredentialDigests::of(declared).changed_fields(stored) {
        changes.insert(field);
    }

    if changes.is_empty() {
        Pending::InSync
    } else {
        Pending::Update(changes)
    }
}
