//! Fee catalog types
//!
//! A fee item is a named chargeable concept (tuition, transport, boarding).
//! Groups exist for display ordering only and carry no pricing semantics.

use serde::{Deserialize, Serialize};

use core_kernel::{FeeGroupId, FeeItemId};

/// A display grouping for fee items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeGroup {
    /// Unique identifier
    pub id: FeeGroupId,
    /// Group name (e.g., "Tuition & Academics")
    pub name: String,
}

impl FeeGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: FeeGroupId::new_v7(),
            name: name.into(),
        }
    }
}

/// A chargeable concept identified by code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeItem {
    /// Unique identifier
    pub id: FeeItemId,
    /// Short code (e.g., "TUITION")
    pub code: String,
    /// Display name
    pub name: String,
    /// Display group, if any
    pub group_id: Option<FeeGroupId>,
    /// Whether an invoice must carry this item; optional items are omitted
    /// when no rule matches instead of failing generation
    pub mandatory: bool,
}

impl FeeItem {
    /// Creates a new mandatory fee item
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: FeeItemId::new_v7(),
            code: code.into(),
            name: name.into(),
            group_id: None,
            mandatory: true,
        }
    }

    /// Marks the item as explicitly optional
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Assigns the item to a display group
    pub fn in_group(mut self, group_id: FeeGroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_item_defaults_to_mandatory() {
        let item = FeeItem::new("TUITION", "Tuition");
        assert!(item.mandatory);
        assert!(item.group_id.is_none());
    }

    #[test]
    fn test_optional_builder() {
        let item = FeeItem::new("TRANSPORT", "Transport Fee").optional();
        assert!(!item.mandatory);
    }

    #[test]
    fn test_group_assignment() {
        let group = FeeGroup::new("Extras");
        let item = FeeItem::new("SWIM", "Swimming").in_group(group.id);
        assert_eq!(item.group_id, Some(group.id));
    }
}
