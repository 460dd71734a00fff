//! Plain-text tables for the one-shot subcommands and the shell.

use rune_core::{
    corps::open_requests, stats::member_points, AggregateInventory, Catalog, CommandEffect,
    InventoryFilter, RegistryStats,
};
use rune_runtime::{ActivityLogEntry, ExchangeRequest, FragmentPart, InventoryEntry, Member};

fn parts_header() -> String {
    parts_label(&FragmentPart::ALL)
}

fn parts_label(parts: &[FragmentPart]) -> String {
    parts
        .iter()
        .map(|part| format!("{:>5}", part.label()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parts_row(entry: &InventoryEntry) -> String {
    entry
        .fragments()
        .iter()
        .map(|(_, count)| format!("{count:>5}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

pub fn inventory_table(inventory: &AggregateInventory, filter: &InventoryFilter) -> String {
    let mut lines = vec![format!(
        "{:<24} {:<11} {} {:>5} {:>7}",
        "type",
        "rarity",
        parts_header(),
        "sets",
        "holders"
    )];
    let (mut shown, mut fragments, mut sets) = (0, 0u64, 0u64);
    for row in inventory.filtered(filter) {
        shown += 1;
        fragments += row.entry.total_fragments();
        sets += u64::from(row.entry.complete_sets());
        lines.push(format!(
            "{:<24} {:<11} {} {:>5} {:>7}",
            row.entry.rune_type(),
            row.entry.rarity(),
            parts_row(&row.entry),
            row.entry.complete_sets(),
            row.holders
        ));
    }
    if shown == 0 {
        lines.push("(no fragments declared)".to_string());
    }
    lines.push(format!("{fragments} fragments, {sets} complete sets"));
    finish(lines)
}

pub fn stats(stats: &RegistryStats) -> String {
    let mut lines = vec![
        format!("members            {}", stats.members),
        format!("fragments          {}", stats.total_fragments),
        format!("points             {}", stats.total_points),
        format!("average per member {}", stats.average_points),
        format!("pending exchanges  {}", stats.pending_exchanges),
        format!("corps sets         {}", stats.corps_complete_sets),
        "fragments by rarity:".to_string(),
    ];
    lines.extend(
        stats
            .fragments_by_rarity
            .iter()
            .map(|(rarity, count)| format!("  {rarity:<11} {count}")),
    );
    finish(lines)
}

pub fn catalog(catalog: &Catalog) -> String {
    let mut lines = vec!["rune types:".to_string()];
    lines.extend(catalog.rune_types().iter().map(|name| format!("  {name}")));
    lines.push("rarity tiers:".to_string());
    lines.extend(catalog.rarities().iter().map(|tier| {
        format!(
            "  {:<11} {:>4} pts/fragment {:>4} per rune  drop {:>6}%  {}",
            tier.id,
            tier.fragment_value,
            tier.rune_price,
            tier.drop_rate,
            if tier.declarable { "declarable" } else { "donation only" }
        )
    }));
    lines.push(format!("parts: {}", parts_label(&catalog.parts()).trim_start()));
    finish(lines)
}

pub fn corps(stock: &[InventoryEntry], requests: &[ExchangeRequest]) -> String {
    let mut lines = vec![format!("corps stock ({} entries)", stock.len())];
    lines.extend(stock.iter().map(|entry| {
        format!(
            "  {:<24} {:<11} {} sets {}",
            entry.rune_type(),
            entry.rarity(),
            parts_row(entry),
            entry.complete_sets()
        )
    }));
    let open: Vec<_> = open_requests(requests).collect();
    lines.push(format!(
        "open exchange requests ({}, {} processed)",
        open.len(),
        requests.len() - open.len()
    ));
    lines.extend(open.iter().map(|request| {
        format!(
            "  #{} {}:{} {} offer {} [{}] {}",
            request.id,
            request.rune_type,
            request.rarity,
            request.part,
            request.offer,
            request.status,
            request.message
        )
    }));
    finish(lines)
}

pub fn logs(entries: &[ActivityLogEntry]) -> String {
    if entries.is_empty() {
        return "(activity log is empty)\n".to_string();
    }
    finish(
        entries
            .iter()
            .map(|entry| format!("{}  {:<11} {}", entry.timestamp, entry.action.tag(), entry.details))
            .collect(),
    )
}

pub fn members(members: &[Member], catalog: &Catalog) -> String {
    let mut lines = vec![format!(
        "{:>14}  {:<28} {:>7} {:>9} {:>7}",
        "id", "name", "entries", "fragments", "points"
    )];
    lines.extend(members.iter().map(|member| {
        format!(
            "{:>14}  {:<28} {:>7} {:>9} {:>7}",
            member.id,
            member.display_name(),
            member.inventory.len(),
            member.total_fragments(),
            member_points(catalog, member)
        )
    }));
    finish(lines)
}

pub fn member(member: &Member) -> String {
    let mut lines = vec![format!("{} (id {})", member.display_name(), member.id)];
    if let Some(points) = member.points {
        lines.push(format!("points {points}"));
    }
    lines.push(format!("{:<24} {:<11} {} {:>5}", "type", "rarity", parts_header(), "sets"));
    lines.extend(member.inventory.iter().map(|entry| {
        format!(
            "{:<24} {:<11} {} {:>5}",
            entry.rune_type(),
            entry.rarity(),
            parts_row(entry),
            entry.complete_sets()
        )
    }));
    finish(lines)
}

pub fn outcome(effect: &CommandEffect) -> String {
    let line = match effect {
        CommandEffect::Declared(outcome) => {
            let verb = if outcome.created { "recorded" } else { "updated" };
            match outcome.member.points {
                Some(points) => format!(
                    "declaration {verb} for {} ({points} pts)",
                    outcome.member.display_name()
                ),
                None => format!("declaration {verb} for {}", outcome.member.display_name()),
            }
        }
        CommandEffect::LoggedIn => "admin access granted".to_string(),
        CommandEffect::LoggedOut => "admin access closed".to_string(),
        CommandEffect::MemberEdited(member) => return self::member(member),
        CommandEffect::StockUpdated { key, entry } => match entry {
            Some(entry) => format!(
                "corps stock {key}: {} ({} sets)",
                parts_row(entry).split_whitespace().collect::<Vec<_>>().join("/"),
                entry.complete_sets()
            ),
            None => format!("corps stock {key}: empty"),
        },
        CommandEffect::RequestOpened(request) => format!("request #{} opened", request.id),
        CommandEffect::RequestUpdated(request) => {
            format!("request #{} is now {}", request.id, request.status)
        }
        CommandEffect::RequestDeleted(id) => format!("request #{id} deleted"),
        CommandEffect::Refreshed { changed: true } => "registry refreshed, new data".to_string(),
        CommandEffect::Refreshed { changed: false } => "registry refreshed, no change".to_string(),
        CommandEffect::Exported(document) => {
            format!("export of {} members ready", document.members.len())
        }
    };
    finish(vec![line])
}
