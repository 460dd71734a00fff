use std::io::Write;

use color_eyre::Result;
use rune_core::{summarize_lines, CommandEffect, InventoryFilter};
use rune_runtime::{parse_command_line, tokenize, MemberId, RegistryCommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::{render, report_notices, write_export, FileRegistry};

const HELP: &str = "\
commands:
  declare FIRST LAST TYPE:RARITY:PART:QTY...   record your fragments
  preview TYPE:RARITY:PART:QTY...              point total without saving
  request TYPE:RARITY PART OFFER [MESSAGE...]  ask the corps for a part
  inventory [TYPE] [RARITY]                    public aggregate
  stats | catalog | corps | refresh
  login PASS | logout
admin:
  members | member ID | logs | export
  set MEMBER TYPE:RARITY PART VALUE | adjust MEMBER TYPE:RARITY PART DELTA
  add_entry MEMBER TYPE:RARITY | remove_entry MEMBER TYPE:RARITY
  donate TYPE:RARITY PART [QTY] | withdraw TYPE:RARITY
  transition ID STATUS | delete_request ID
  quit
";

pub async fn run(registry: &mut FileRegistry) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("rune registry shell, `help` for commands");

    loop {
        print!("{}> ", if registry.is_admin() { "admin" } else { "runes" });
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }
        handle_line(registry, line);
    }
    Ok(())
}

fn handle_line(registry: &mut FileRegistry, line: &str) {
    let tokens = match tokenize(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            println!("error: {err}");
            return;
        }
    };
    let args: Vec<&str> = tokens.iter().map(String::as_str).collect();
    debug!(verb = args.first().copied().unwrap_or_default(), "shell.line");

    match respond(registry, &args, line) {
        Ok(text) => print!("{text}"),
        Err(err) => println!("error: {err}"),
    }
}

/// Read verbs pull the shared snapshot first so they never show a stale view.
fn respond(
    registry: &mut FileRegistry,
    args: &[&str],
    line: &str,
) -> Result<String, rune_core::RegistryError> {
    if matches!(
        args.first(),
        Some(&("inventory" | "stats" | "corps" | "members" | "member" | "logs"))
    ) {
        let (_, notices) = registry.refresh();
        report_notices(&notices);
    }

    match args {
        ["help"] => Ok(HELP.to_string()),
        ["inventory", rest @ ..] => {
            let filter = InventoryFilter {
                rune_type: rest.first().map(|s| s.to_string()),
                rarity: rest.get(1).map(|s| s.to_string()),
            };
            Ok(render::inventory_table(&registry.public_inventory(), &filter))
        }
        ["stats"] => Ok(render::stats(&registry.stats())),
        ["catalog"] => Ok(render::catalog(registry.catalog())),
        ["corps"] => Ok(render::corps(
            registry.corps_stock(),
            registry.exchange_requests(),
        )),
        ["members"] => registry
            .members()
            .map(|members| render::members(members, registry.catalog())),
        ["member", id] => match id.parse::<u64>() {
            Ok(id) => registry.member_details(MemberId(id)).map(render::member),
            Err(_) => Ok(format!("error: '{id}' is not a member id\n")),
        },
        ["logs"] => registry.activity_logs().map(render::logs),
        ["preview", ..] => preview(registry, line),
        _ => execute(registry, line),
    }
}

fn preview(registry: &FileRegistry, line: &str) -> Result<String, rune_core::RegistryError> {
    let declare_line = line.replacen("preview", "declare _ _", 1);
    match parse_command_line(&declare_line) {
        Ok(RegistryCommand::Declare { lines, .. }) => {
            let summary = summarize_lines(registry.catalog(), &lines);
            Ok(format!(
                "{} fragments, {} points\n",
                summary.fragments, summary.points
            ))
        }
        Ok(_) => Ok(String::new()),
        Err(err) => Ok(format!("error: {err}\n")),
    }
}

fn execute(registry: &mut FileRegistry, line: &str) -> Result<String, rune_core::RegistryError> {
    let command = match parse_command_line(line) {
        Ok(command) => command,
        Err(err) => return Ok(format!("error: {err}\n")),
    };
    let outcome = registry.execute(command)?;
    report_notices(&outcome.notices);
    if let CommandEffect::Exported(document) = &outcome.effect {
        write_export(document, None);
        return Ok(String::new());
    }
    Ok(render::outcome(&outcome.effect))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rune_core::{Catalog, Clock, FileStore, Registry, RegistryConfig, SystemClock};

    use super::*;

    fn session(root: &std::path::Path) -> FileRegistry {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let config = Arc::new(RegistryConfig::default());
        Registry::open(FileStore::new(root), Catalog::builtin(), config, clock).0
    }

    #[test]
    fn read_verbs_see_other_sessions_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = session(dir.path());
        let mut writer = session(dir.path());

        let before = respond(&mut reader, &["stats"], "stats").unwrap();
        assert!(before.starts_with("members            0\n"));

        let line = "declare Jean Dupont Vie:Rare:1/4:2";
        writer.execute(parse_command_line(line).unwrap()).unwrap();

        let after = respond(&mut reader, &["stats"], "stats").unwrap();
        assert!(after.starts_with("members            1\n"));
        let table = respond(&mut reader, &["inventory", "Vie", "Rare"], "inventory Vie Rare").unwrap();
        assert!(table.ends_with("2 fragments, 0 complete sets\n"));
    }
}
