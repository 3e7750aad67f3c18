use serde::Serialize;

use crate::model::{Item, ItemKind, ItemTree, Priority};
use crate::view::DisplayRow;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemJson {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub sort_order: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "row")]
pub enum RowJson {
    #[serde(rename = "parent")]
    Parent { item: ItemJson },
    #[serde(rename = "child")]
    Child { item: ItemJson, parent_id: String },
    #[serde(rename = "add_child")]
    AddChild { parent_id: String },
    #[serde(rename = "done_section")]
    DoneSection { parent_id: String, count: usize },
}

pub fn item_to_json(item: &Item) -> ItemJson {
    ItemJson {
        id: item.id.clone(),
        title: item.title.clone(),
        kind: item.kind,
        completed: item.is_completed,
        completed_at: item.completed_at.map(|t| t.to_rfc3339()),
        sort_order: item.sort_order,
        category: item.category_id.clone(),
        priority: item.priority,
        parent_id: item.parent_id.clone(),
    }
}

/// Resolve display rows against the tree for --json output. Rows whose
/// item vanished mid-flight are skipped.
pub fn rows_to_json(tree: &ItemTree, rows: &[DisplayRow]) -> Vec<RowJson> {
    rows.iter()
        .filter_map(|row| match row {
            DisplayRow::Parent { id } => tree.get(id).map(|item| RowJson::Parent {
                item: item_to_json(item),
            }),
            DisplayRow::Child { id, parent_id } => tree.get(id).map(|item| RowJson::Child {
                item: item_to_json(item),
                parent_id: parent_id.clone(),
            }),
            DisplayRow::AddChild { parent_id } => Some(RowJson::AddChild {
                parent_id: parent_id.clone(),
            }),
            DisplayRow::DoneMarker {
                parent_id,
                done_count,
            } => Some(RowJson::DoneSection {
                parent_id: parent_id.clone(),
                count: *done_count,
            }),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn checkbox(item: &Item) -> &'static str {
    if item.is_completed { "[x]" } else { "[ ]" }
}

/// Render the flat projection the way the reorderable list would show it.
pub fn render_rows(tree: &ItemTree, rows: &[DisplayRow]) -> String {
    let mut out = String::new();
    for row in rows {
        match row {
            DisplayRow::Parent { id } => {
                if let Some(item) = tree.get(id) {
                    out.push_str(&format!("{} {} {}\n", checkbox(item), item.id, item.title));
                }
            }
            DisplayRow::Child { id, .. } => {
                if let Some(item) = tree.get(id) {
                    out.push_str(&format!(
                        "    {} {} {}\n",
                        checkbox(item),
                        item.id,
                        item.title
                    ));
                }
            }
            DisplayRow::AddChild { .. } => {
                out.push_str("      + add item\n");
            }
            DisplayRow::DoneMarker { done_count, .. } => {
                out.push_str(&format!("      ({} done)\n", done_count));
            }
        }
    }
    out
}
