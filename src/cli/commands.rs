use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lat", about = concat!("lattice v", env!("CARGO_PKG_VERSION"), " - nested lists that stay in order"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different data directory
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List items as the flattened display projection
    List(ListArgs),
    /// Add a top-level item
    Add(AddArgs),
    /// Add a child item under an existing parent
    Sub(SubArgs),
    /// Toggle completion (cascades between parents and children)
    Toggle(ToggleArgs),
    /// Change an item's title
    Title(TitleArgs),
    /// Reorder: drop an item onto a sibling
    Mv(MvArgs),
    /// Delete an item and all of its descendants
    Delete(DeleteArgs),
    /// Move an item into a category, or clear its category
    Category(CategoryArgs),
    /// Manage categories
    Categories(CategoriesCmd),
    /// Validate tree integrity
    Check,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Filter by category id
    #[arg(long)]
    pub category: Option<String>,
    /// Filter by title substring (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,
    /// Only committed items
    #[arg(long, conflicts_with = "uncommitted")]
    pub committed: bool,
    /// Only uncommitted items
    #[arg(long)]
    pub uncommitted: bool,
    /// Sort key (manual, created, priority)
    #[arg(long)]
    pub sort: Option<String>,
    /// Reverse the sort direction
    #[arg(long)]
    pub desc: bool,
    /// Show parents only, without their children
    #[arg(long)]
    pub collapsed: bool,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Item title
    pub title: String,
    /// Item kind (task, project, list)
    #[arg(long, default_value = "task")]
    pub kind: String,
    /// Priority (low, medium, high)
    #[arg(long)]
    pub priority: Option<String>,
}

#[derive(Args)]
pub struct SubArgs {
    /// Parent item id
    pub parent: String,
    /// Child title
    pub title: String,
}

#[derive(Args)]
pub struct ToggleArgs {
    /// Item id
    pub id: String,
}

#[derive(Args)]
pub struct TitleArgs {
    /// Item id
    pub id: String,
    /// New title
    pub title: String,
}

#[derive(Args)]
pub struct MvArgs {
    /// Item being moved
    pub dropped: String,
    /// Sibling to drop it onto
    pub target: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Item id
    pub id: String,
}

#[derive(Args)]
pub struct CategoryArgs {
    /// Item id
    pub id: String,
    /// Category id (omit to clear)
    pub category: Option<String>,
}

#[derive(Args)]
pub struct CategoriesCmd {
    #[command(subcommand)]
    pub command: Option<CategoriesCommands>,
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Create a category
    Add {
        /// Display name
        name: String,
    },
    /// Rename a category
    Rename {
        /// Category id
        id: String,
        /// New display name
        name: String,
    },
    /// Delete a category, optionally moving its items elsewhere
    Delete {
        /// Category id
        id: String,
        /// Reassign labeled items to this category
        #[arg(long)]
        into: Option<String>,
    },
}
