use std::num::ParseIntError;

use thiserror::Error;

use crate::{
    DeclarationLine, EntryKey, ExchangeStatus, FragmentPart, MemberId, RegistryCommand,
};

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("unterminated quote in command line")]
    UnterminatedQuote,
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid fragment part '{0}' (expected 1/4, 2/4, 3/4 or 4/4)")]
    InvalidPart(String),
    #[error("invalid entry key '{0}' (expected TYPE:RARITY)")]
    InvalidKey(String),
    #[error("invalid declaration line '{0}' (expected TYPE:RARITY:PART:QTY)")]
    InvalidLine(String),
    #[error("invalid request status '{0}'")]
    InvalidStatus(String),
}

/// Splits a command line on whitespace; double quotes group words so rune
/// types such as `"Vol de vie"` survive as one token.
pub fn tokenize(input: &str) -> Result<Vec<String>, CommandParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err(CommandParseError::UnterminatedQuote);
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

pub fn parse_command_line(input: &str) -> Result<RegistryCommand, CommandParseError> {
    let tokens = tokenize(input)?;
    let mut parts = tokens.iter().map(String::as_str);
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    match verb.as_str() {
        "declare" => {
            let first_name = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("first name"))?;
            let last_name = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("last name"))?;
            let lines = parts
                .map(parse_declaration_line)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RegistryCommand::Declare {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                lines,
            })
        }
        "login" | "admin" => {
            let passphrase = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("passphrase"))?;
            Ok(RegistryCommand::Login {
                passphrase: passphrase.to_string(),
            })
        }
        "logout" => Ok(RegistryCommand::Logout),
        "set" | "adjust" => {
            let member_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("member"))?;
            let key_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("entry"))?;
            let part_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("part"))?;
            let amount_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("amount"))?;
            let member = MemberId(parse_u64(member_str, "member id")?);
            let key = parse_entry_key(key_str)?;
            let part = parse_part(part_str)?;
            if verb == "set" {
                let value = parse_i64(amount_str, "fragment count")?;
                Ok(RegistryCommand::SetFragmentCount {
                    member,
                    key,
                    part,
                    value,
                })
            } else {
                let delta = parse_i64(amount_str, "fragment delta")?;
                Ok(RegistryCommand::AdjustFragmentCount {
                    member,
                    key,
                    part,
                    delta,
                })
            }
        }
        "add_entry" | "remove_entry" => {
            let member_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("member"))?;
            let key_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("entry"))?;
            let member = MemberId(parse_u64(member_str, "member id")?);
            let key = parse_entry_key(key_str)?;
            if verb == "add_entry" {
                Ok(RegistryCommand::AddInventoryEntry { member, key })
            } else {
                Ok(RegistryCommand::RemoveInventoryEntry { member, key })
            }
        }
        "donate" => {
            let key_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("entry"))?;
            let part_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("part"))?;
            let quantity_str = parts.next().unwrap_or("1");
            let key = parse_entry_key(key_str)?;
            let part = parse_part(part_str)?;
            let quantity = parse_u32(quantity_str, "donation quantity")?;
            Ok(RegistryCommand::RecordDonation {
                key,
                part,
                quantity,
            })
        }
        "withdraw" => {
            let key_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("entry"))?;
            Ok(RegistryCommand::WithdrawSet {
                key: parse_entry_key(key_str)?,
            })
        }
        "request" => {
            let key_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("entry"))?;
            let part_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("part"))?;
            let offer_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("offer"))?;
            let key = parse_entry_key(key_str)?;
            let part = parse_part(part_str)?;
            let offer = parse_u32(offer_str, "request offer")?;
            let message = parts.collect::<Vec<_>>().join(" ");
            Ok(RegistryCommand::RequestExchange {
                key,
                part,
                offer,
                message,
            })
        }
        "transition" => {
            let id_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("request id"))?;
            let status_str = parts.next().unwrap_or("processed");
            let id = parse_u64(id_str, "request id")?;
            let status = parse_status(status_str)?;
            Ok(RegistryCommand::TransitionRequest { id, status })
        }
        "delete_request" => {
            let id_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("request id"))?;
            Ok(RegistryCommand::DeleteRequest {
                id: parse_u64(id_str, "request id")?,
            })
        }
        "refresh" => Ok(RegistryCommand::Refresh),
        "export" => Ok(RegistryCommand::Export),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

/// Parses `TYPE:RARITY:PART:QTY`. The quantity is its leading integer; one
/// with no digits reads as zero, which the intake then drops like any other
/// non-positive line.
fn parse_declaration_line(token: &str) -> Result<DeclarationLine, CommandParseError> {
    let fields: Vec<&str> = token.split(':').collect();
    let [rune_type, rarity, part, quantity] = fields.as_slice() else {
        return Err(CommandParseError::InvalidLine(token.to_string()));
    };
    let part = parse_part(part)?;
    let quantity = leading_integer(quantity);
    Ok(DeclarationLine::new(
        rune_type.trim(),
        rarity.trim(),
        part,
        quantity,
    ))
}

/// Integer prefix of `text`, so `3abc` reads as 3. No digits reads as 0.
fn leading_integer(text: &str) -> i64 {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<i64>()
        .map(|value| sign * value)
        .unwrap_or(0)
}

fn parse_entry_key(token: &str) -> Result<EntryKey, CommandParseError> {
    match token.split_once(':') {
        Some((rune_type, rarity)) if !rune_type.trim().is_empty() && !rarity.trim().is_empty() => {
            Ok(EntryKey::new(rune_type.trim(), rarity.trim()))
        }
        _ => Err(CommandParseError::InvalidKey(token.to_string())),
    }
}

fn parse_part(token: &str) -> Result<FragmentPart, CommandParseError> {
    FragmentPart::from_label(token).ok_or_else(|| CommandParseError::InvalidPart(token.to_string()))
}

fn parse_status(token: &str) -> Result<ExchangeStatus, CommandParseError> {
    match token.to_ascii_lowercase().as_str() {
        "pending" | "open" => Ok(ExchangeStatus::Pending),
        "in_progress" | "in-progress" | "progress" => Ok(ExchangeStatus::InProgress),
        "processed" | "done" | "closed" => Ok(ExchangeStatus::Processed),
        other => Err(CommandParseError::InvalidStatus(other.to_string())),
    }
}

fn parse_u32(value: &str, context: &'static str) -> Result<u32, CommandParseError> {
    value
        .parse::<u32>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_u64(value: &str, context: &'static str) -> Result<u64, CommandParseError> {
    value
        .parse::<u64>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_i64(value: &str, context: &'static str) -> Result<i64, CommandParseError> {
    value
        .parse::<i64>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_group_words() {
        let tokens = tokenize(r#"declare Tanjiro Kamado "Vol de vie:Rare:1/4:3""#).unwrap();
        assert_eq!(
            tokens,
            vec!["declare", "Tanjiro", "Kamado", "Vol de vie:Rare:1/4:3"]
        );
        assert!(matches!(
            tokenize(r#"declare "open"#),
            Err(CommandParseError::UnterminatedQuote)
        ));
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn parses_declaration_lines() {
        let command =
            parse_command_line(r#"declare Tanjiro Kamado Dégât:Épique:1/4:2 "Vol de vie:Rare:4/4:x""#)
                .unwrap();
        let RegistryCommand::Declare {
            first_name,
            last_name,
            lines,
        } = command
        else {
            panic!("expected declare");
        };
        assert_eq!(first_name, "Tanjiro");
        assert_eq!(last_name, "Kamado");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], DeclarationLine::new("Dégât", "Épique", FragmentPart::First, 2));
        assert_eq!(lines[1].rune_type, "Vol de vie");
        assert_eq!(lines[1].quantity, 0);
    }

    #[test]
    fn quantity_takes_the_leading_integer() {
        let quantity = |text: &str| {
            parse_declaration_line(&format!("Vie:Rare:1/4:{text}"))
                .unwrap()
                .quantity
        };
        assert_eq!(quantity("3abc"), 3);
        assert_eq!(quantity(" 12 "), 12);
        assert_eq!(quantity("-2x"), -2);
        assert_eq!(quantity("abc"), 0);
        assert_eq!(quantity(""), 0);
    }

    #[test]
    fn parses_admin_edits() {
        assert_eq!(
            parse_command_line("adjust 12 Vie:Rare 3/4 -2").unwrap(),
            RegistryCommand::AdjustFragmentCount {
                member: MemberId(12),
                key: EntryKey::new("Vie", "Rare"),
                part: FragmentPart::Third,
                delta: -2,
            }
        );
        assert_eq!(
            parse_command_line("donate Armure:Commune 2/4").unwrap(),
            RegistryCommand::RecordDonation {
                key: EntryKey::new("Armure", "Commune"),
                part: FragmentPart::Second,
                quantity: 1,
            }
        );
        assert_eq!(
            parse_command_line("transition 5 in-progress").unwrap(),
            RegistryCommand::TransitionRequest {
                id: 5,
                status: ExchangeStatus::InProgress,
            }
        );
    }

    #[test]
    fn request_collects_message() {
        let command = parse_command_line("request Vitesse:Légendaire 2/4 300 need the second half").unwrap();
        assert_eq!(
            command,
            RegistryCommand::RequestExchange {
                key: EntryKey::new("Vitesse", "Légendaire"),
                part: FragmentPart::Second,
                offer: 300,
                message: "need the second half".to_string(),
            }
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(parse_command_line(""), Err(CommandParseError::Empty)));
        assert!(matches!(
            parse_command_line("forge everything"),
            Err(CommandParseError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse_command_line("withdraw Vie"),
            Err(CommandParseError::InvalidKey(_))
        ));
        assert!(matches!(
            parse_command_line("declare A B Vie:Rare:5/4:1"),
            Err(CommandParseError::InvalidPart(_))
        ));
        assert!(matches!(
            parse_command_line("set x Vie:Rare 1/4 2"),
            Err(CommandParseError::InvalidInteger { .. })
        ));
    }
}
