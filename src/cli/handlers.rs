use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::commands::*;
use crate::cli::output;
use crate::io::config_io;
use crate::model::{AppConfig, Category, ItemKind};
use crate::ops::check;
use crate::store::{CategoryStore, JsonFileStore};
use crate::sync::{ChangeNotifier, Engine, Operation};
use crate::view::filter::{CommitmentFilter, SortDirection, SortKey, ViewOptions};

type CliResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli) -> CliResult {
    let dir = match &cli.dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let config = config_io::read_config(&dir)?;
    let store = Arc::new(JsonFileStore::open(config_io::store_path(&dir, &config))?);
    let json = cli.json;

    match cli.command {
        Commands::List(args) => cmd_list(args, &config, store, json).await,
        Commands::Add(args) => cmd_add(args, &config, store).await,
        Commands::Sub(args) => cmd_sub(args, &config, store).await,
        Commands::Toggle(args) => cmd_toggle(args, &config, store).await,
        Commands::Title(args) => cmd_title(args, &config, store).await,
        Commands::Mv(args) => cmd_mv(args, &config, store).await,
        Commands::Delete(args) => cmd_delete(args, &config, store).await,
        Commands::Category(args) => cmd_category(args, &config, store).await,
        Commands::Categories(args) => cmd_categories(args, store, json).await,
        Commands::Check => cmd_check(&config, store, json).await,
    }
}

/// Build a loaded engine for this invocation. The CLI is a signed-in
/// session by definition; a configured user id overrides the local one.
async fn engine_for(config: &AppConfig, store: Arc<JsonFileStore>) -> Result<Engine, Box<dyn std::error::Error>> {
    let user = config
        .user
        .id
        .clone()
        .unwrap_or_else(|| "local".to_string());
    let mut engine = Engine::new(store, ChangeNotifier::new(), "cli", Some(user));
    engine.load().await?;
    Ok(engine)
}

/// Wait for the background persistence of one operation and surface any
/// failure. The optimistic state dies with the process, so here a failed
/// write is a failed command.
async fn settle(engine: &Engine, handle: tokio::task::JoinHandle<()>) -> CliResult {
    handle.await?;
    let errors = engine.drain_errors();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; ").into())
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn parse_sort(name: &str) -> Result<SortKey, Box<dyn std::error::Error>> {
    match name {
        "manual" => Ok(SortKey::Manual),
        "created" => Ok(SortKey::Created),
        "priority" => Ok(SortKey::Priority),
        other => Err(format!("unknown sort key '{}' (expected manual, created, priority)", other).into()),
    }
}

async fn cmd_list(
    args: ListArgs,
    config: &AppConfig,
    store: Arc<JsonFileStore>,
    json: bool,
) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    if !args.collapsed && config.view.expand_all {
        engine.expand_all();
    }

    let opts = ViewOptions {
        category: args.category,
        commitment: if args.committed {
            CommitmentFilter::Committed
        } else if args.uncommitted {
            CommitmentFilter::Uncommitted
        } else {
            CommitmentFilter::Any
        },
        search: args.search,
        sort: match args.sort.as_deref() {
            Some(name) => parse_sort(name)?,
            None => config.view.sort,
        },
        direction: if args.desc {
            SortDirection::Descending
        } else {
            config.view.direction
        },
    };

    let rows = engine.rows(&opts);
    if json {
        let out = output::rows_to_json(engine.tree(), &rows);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", output::render_rows(engine.tree(), &rows));
    }
    Ok(())
}

async fn cmd_check(config: &AppConfig, store: Arc<JsonFileStore>, json: bool) -> CliResult {
    let engine = engine_for(config, store).await?;
    let result = check::check_tree(engine.tree());
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.valid {
        println!("ok: {} items", engine.tree().len());
    } else {
        for error in &result.errors {
            eprintln!("error: {:?}", error);
        }
    }
    if result.valid {
        Ok(())
    } else {
        Err("integrity check failed".into())
    }
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn parse_kind(name: &str) -> Result<ItemKind, Box<dyn std::error::Error>> {
    match name {
        "task" => Ok(ItemKind::Task),
        "project" => Ok(ItemKind::Project),
        "list" => Ok(ItemKind::List),
        other => Err(format!("unknown kind '{}' (expected task, project, list)", other).into()),
    }
}

async fn cmd_add(args: AddArgs, config: &AppConfig, store: Arc<JsonFileStore>) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    let handle = engine.apply(Operation::Create {
        parent_id: None,
        kind: parse_kind(&args.kind)?,
        title: args.title.clone(),
    })?;
    settle(&engine, handle).await?;
    let id = engine
        .tree()
        .roots(false)
        .first()
        .map(|i| i.id.clone())
        .unwrap_or_default();
    println!("Added {}", id);
    Ok(())
}

async fn cmd_sub(args: SubArgs, config: &AppConfig, store: Arc<JsonFileStore>) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    let handle = engine.apply(Operation::Create {
        parent_id: Some(args.parent.clone()),
        kind: ItemKind::Task,
        title: args.title.clone(),
    })?;
    settle(&engine, handle).await?;
    let id = engine
        .tree()
        .siblings(Some(&args.parent), false)
        .first()
        .map(|i| i.id.clone())
        .unwrap_or_default();
    println!("Added {} under {}", id, args.parent);
    Ok(())
}

async fn cmd_toggle(args: ToggleArgs, config: &AppConfig, store: Arc<JsonFileStore>) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    let handle = engine.apply(Operation::ToggleCompletion {
        id: args.id.clone(),
    })?;
    settle(&engine, handle).await?;
    let item = engine.tree().get(&args.id);
    match item {
        Some(item) if item.is_completed => println!("Completed {}", args.id),
        _ => println!("Reopened {}", args.id),
    }
    Ok(())
}

async fn cmd_title(args: TitleArgs, config: &AppConfig, store: Arc<JsonFileStore>) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    let handle = engine.apply(Operation::UpdateTitle {
        id: args.id.clone(),
        title: args.title,
    })?;
    settle(&engine, handle).await?;
    println!("Updated {}", args.id);
    Ok(())
}

async fn cmd_mv(args: MvArgs, config: &AppConfig, store: Arc<JsonFileStore>) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    let scope = engine
        .tree()
        .get(&args.dropped)
        .ok_or_else(|| format!("item not found: {}", args.dropped))?
        .parent_id
        .clone();
    let handle = engine.apply(Operation::Reorder {
        parent_id: scope,
        dropped_id: args.dropped.clone(),
        target_id: args.target.clone(),
    })?;
    settle(&engine, handle).await?;
    println!("Moved {}", args.dropped);
    Ok(())
}

async fn cmd_delete(args: DeleteArgs, config: &AppConfig, store: Arc<JsonFileStore>) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    let handle = engine.apply(Operation::Delete {
        id: args.id.clone(),
    })?;
    settle(&engine, handle).await?;
    println!("Deleted {}", args.id);
    Ok(())
}

async fn cmd_category(
    args: CategoryArgs,
    config: &AppConfig,
    store: Arc<JsonFileStore>,
) -> CliResult {
    let mut engine = engine_for(config, store).await?;
    let handle = engine.apply(Operation::MoveCategory {
        id: args.id.clone(),
        category_id: args.category.clone(),
    })?;
    settle(&engine, handle).await?;
    match args.category {
        Some(category) => println!("Moved {} to {}", args.id, category),
        None => println!("Cleared category of {}", args.id),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Category management
// ---------------------------------------------------------------------------

fn next_category_id(existing: &[Category]) -> String {
    let mut max = 0usize;
    for category in existing {
        if let Some(num) = category.id.strip_prefix("cat-")
            && let Ok(n) = num.parse::<usize>()
            && n > max
        {
            max = n;
        }
    }
    format!("cat-{:04}", max + 1)
}

async fn cmd_categories(args: CategoriesCmd, store: Arc<JsonFileStore>, json: bool) -> CliResult {
    match args.command {
        None => {
            let categories = store.fetch_categories().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else {
                for category in categories {
                    println!("{} {}", category.id, category.name);
                }
            }
        }
        Some(CategoriesCommands::Add { name }) => {
            let existing = store.fetch_categories().await?;
            let id = next_category_id(&existing);
            store
                .create_category(&Category::new(id.clone(), name))
                .await?;
            println!("Added {}", id);
        }
        Some(CategoriesCommands::Rename { id, name }) => {
            store.rename_category(&id, &name).await?;
            println!("Renamed {}", id);
        }
        Some(CategoriesCommands::Delete { id, into }) => {
            store
                .delete_category_reassigning(&id, into.as_deref())
                .await?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}
