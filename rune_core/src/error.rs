use rune_runtime::{EntryKey, MemberId};
use thiserror::Error;

/// Failure of a registry operation. None of these are fatal: the operation
/// did not apply and state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("first name and last name are both required")]
    MissingIdentity,
    #[error("rarity '{0}' cannot be declared")]
    NonDeclarableRarity(String),
    #[error("unknown rune type '{0}'")]
    UnknownRuneType(String),
    #[error("unknown rarity tier '{0}'")]
    UnknownRarity(String),
    #[error("declaration holds no fragment with a positive quantity")]
    EmptyDeclaration,
    #[error("admin access required")]
    NotAuthorized,
    #[error("no member with id {0}")]
    UnknownMember(MemberId),
    #[error("no inventory entry {0}")]
    UnknownEntry(EntryKey),
    #[error("inventory entry {0} already exists")]
    DuplicateEntry(EntryKey),
    #[error("no exchange request with id {0}")]
    UnknownRequest(u64),
    #[error("feature {0} is not enabled for this registry")]
    FeatureDisabled(&'static str),
}
