use serde::{Deserialize, Serialize};

use crate::{EntryKey, ExchangeStatus, FragmentPart, MemberId};

/// One fragment line of a declaration form.
///
/// `quantity` is kept signed: non-positive lines are legal input and are
/// dropped by the intake, not rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationLine {
    pub rune_type: String,
    pub rarity: String,
    pub part: FragmentPart,
    pub quantity: i64,
}

impl DeclarationLine {
    pub fn new(
        rune_type: impl Into<String>,
        rarity: impl Into<String>,
        part: FragmentPart,
        quantity: i64,
    ) -> Self {
        Self {
            rune_type: rune_type.into(),
            rarity: rarity.into(),
            part,
            quantity,
        }
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.rune_type.clone(), self.rarity.clone())
    }
}

/// Every operation the presentation layer can ask of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RegistryCommand {
    Declare {
        first_name: String,
        last_name: String,
        lines: Vec<DeclarationLine>,
    },
    Login {
        passphrase: String,
    },
    Logout,
    SetFragmentCount {
        member: MemberId,
        key: EntryKey,
        part: FragmentPart,
        value: i64,
    },
    AdjustFragmentCount {
        member: MemberId,
        key: EntryKey,
        part: FragmentPart,
        delta: i64,
    },
    AddInventoryEntry {
        member: MemberId,
        key: EntryKey,
    },
    RemoveInventoryEntry {
        member: MemberId,
        key: EntryKey,
    },
    RecordDonation {
        key: EntryKey,
        part: FragmentPart,
        quantity: u32,
    },
    WithdrawSet {
        key: EntryKey,
    },
    RequestExchange {
        key: EntryKey,
        part: FragmentPart,
        offer: u32,
        message: String,
    },
    TransitionRequest {
        id: u64,
        status: ExchangeStatus,
    },
    DeleteRequest {
        id: u64,
    },
    Refresh,
    Export,
}

impl RegistryCommand {
    /// Commands that need a prior successful passphrase check.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            RegistryCommand::SetFragmentCount { .. }
                | RegistryCommand::AdjustFragmentCount { .. }
                | RegistryCommand::AddInventoryEntry { .. }
                | RegistryCommand::RemoveInventoryEntry { .. }
                | RegistryCommand::RecordDonation { .. }
                | RegistryCommand::WithdrawSet { .. }
                | RegistryCommand::TransitionRequest { .. }
                | RegistryCommand::DeleteRequest { .. }
                | RegistryCommand::Export
        )
    }

    /// Commands that change persisted state and therefore go through the
    /// read-merge-write cycle.
    pub fn mutates(&self) -> bool {
        !matches!(self, RegistryCommand::Refresh | RegistryCommand::Logout)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistryCommand::Declare { .. } => "declare",
            RegistryCommand::Login { .. } => "login",
            RegistryCommand::Logout => "logout",
            RegistryCommand::SetFragmentCount { .. } => "set",
            RegistryCommand::AdjustFragmentCount { .. } => "adjust",
            RegistryCommand::AddInventoryEntry { .. } => "add_entry",
            RegistryCommand::RemoveInventoryEntry { .. } => "remove_entry",
            RegistryCommand::RecordDonation { .. } => "donate",
            RegistryCommand::WithdrawSet { .. } => "withdraw",
            RegistryCommand::RequestExchange { .. } => "request",
            RegistryCommand::TransitionRequest { .. } => "transition",
            RegistryCommand::DeleteRequest { .. } => "delete_request",
            RegistryCommand::Refresh => "refresh",
            RegistryCommand::Export => "export",
        }
    }
}
