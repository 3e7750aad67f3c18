use serde::{Deserialize, Serialize};

use crate::model::Item;

/// Sort key for the top-level parent sequence. Manual order is the
/// default and the only order drag-reordering is meaningful under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Manual,
    Created,
    Priority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Filter on external commitment status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentFilter {
    #[default]
    Any,
    Committed,
    Uncommitted,
}

/// What the display projection shows and in which order
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub category: Option<String>,
    pub commitment: CommitmentFilter,
    /// Case-insensitive title substring
    pub search: Option<String>,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl ViewOptions {
    /// Drag-reordering only maps back to sort orders under ascending
    /// manual sort
    pub fn is_manual(&self) -> bool {
        self.sort == SortKey::Manual && self.direction == SortDirection::Ascending
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(cat) = &self.category
            && item.category_id.as_deref() != Some(cat.as_str())
        {
            return false;
        }
        match self.commitment {
            CommitmentFilter::Any => {}
            CommitmentFilter::Committed => {
                if !item.is_committed {
                    return false;
                }
            }
            CommitmentFilter::Uncommitted => {
                if item.is_committed {
                    return false;
                }
            }
        }
        if let Some(needle) = &self.search
            && !item
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase())
        {
            return false;
        }
        true
    }
}

/// Filter a parent sequence and sort it by the active key and direction.
/// The input should already be in manual order; the sort is stable, so
/// ties under the other keys keep that order.
pub fn filter_and_sort<'a>(parents: Vec<&'a Item>, opts: &ViewOptions) -> Vec<&'a Item> {
    let mut kept: Vec<&Item> = parents.into_iter().filter(|p| opts.matches(p)).collect();
    kept.sort_by(|a, b| {
        let ord = match opts.sort {
            SortKey::Manual => a.sort_order.cmp(&b.sort_order),
            SortKey::Created => a.created_at.cmp(&b.created_at),
            SortKey::Priority => a.priority.cmp(&b.priority),
        };
        match opts.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    kept
}
