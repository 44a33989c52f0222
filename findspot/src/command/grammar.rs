//! Command grammar.
//!
//! Commands are case-sensitive. Input is normalized first (outer whitespace
//! trimmed, inner runs collapsed to one space) so `  mode   collect ` parses
//! the same as `mode collect`.

use std::path::PathBuf;

use crate::domain::{CollectionMode, ListKind, SortOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Freeze,
    Unfreeze,
    Kill,
    Detach,
    Show,
    ModeQuery,
    SetMode(CollectionMode),
    Dump(PathBuf),
    Clear,
    ModuleQuery,
    ModuleAdd(ListKind, String),
    ModuleRemove(ListKind, String),
    Sort(SortOrder),
}

impl Command {
    /// Parse an already-normalized line. `None` means "unknown command".
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let command = match line {
            "help" => Self::Help,
            "freeze" => Self::Freeze,
            "unfreeze" => Self::Unfreeze,
            "kill" => Self::Kill,
            "detach" => Self::Detach,
            "show" => Self::Show,
            "clear" => Self::Clear,
            "mode" => Self::ModeQuery,
            "mode collect" => Self::SetMode(CollectionMode::Collect),
            "mode trim" => Self::SetMode(CollectionMode::Trim),
            "mode off" => Self::SetMode(CollectionMode::Off),
            "mod" => Self::ModuleQuery,
            _ => return Self::parse_with_argument(line),
        };
        Some(command)
    }

    /// Commands that manage freeze state themselves and must not be wrapped
    /// in the automatic freeze/resume bracket.
    #[must_use]
    pub fn bypasses_freeze(&self) -> bool {
        matches!(self, Self::Freeze | Self::Unfreeze | Self::Kill)
    }

    fn parse_with_argument(line: &str) -> Option<Self> {
        if let Some(path) = line.strip_prefix("dump ") {
            return Some(Self::Dump(PathBuf::from(path)));
        }
        if let Some(rest) = line.strip_prefix("mod ") {
            return parse_module(rest);
        }
        if let Some(rest) = line.strip_prefix("sort ") {
            return match rest.chars().next() {
                Some('c') => Some(Self::Sort(SortOrder::Chronological)),
                Some('h') => Some(Self::Sort(SortOrder::HitCount)),
                _ => None,
            };
        }
        None
    }
}

/// `blacklist <m>`, `whitelist <m>`, `blacklist remove <m>`, `whitelist remove <m>`
fn parse_module(rest: &str) -> Option<Command> {
    let (list, tail) = if let Some(tail) = rest.strip_prefix("blacklist ") {
        (ListKind::Blacklist, tail)
    } else if let Some(tail) = rest.strip_prefix("whitelist ") {
        (ListKind::Whitelist, tail)
    } else {
        return None;
    };

    if tail == "remove" {
        return None;
    }
    match tail.strip_prefix("remove ") {
        Some(module) => Some(Command::ModuleRemove(list, module.to_owned())),
        None => Some(Command::ModuleAdd(list, tail.to_owned())),
    }
}

/// Trim the line and collapse every internal whitespace run to one space.
#[must_use]
pub fn normalize_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize and parse in one step.
#[must_use]
pub fn parse_line(line: &str) -> Option<Command> {
    Command::parse(&normalize_whitespace(line))
}
