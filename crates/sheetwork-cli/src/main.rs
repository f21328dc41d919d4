use anyhow::{anyhow, bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use sheetwork_core::{Workspace, WorkspaceConfig};
use sheetwork_engine::Direction;
use sheetwork_model::EntityId;
use sheetwork_store::MemoryStore;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod data;

fn sheet_arg() -> Arg {
    Arg::new("sheet").required(true).help("Sheet id")
}

fn direction_arg() -> Arg {
    Arg::new("direction")
        .required(true)
        .value_parser(["up", "down"])
        .help("Move one position up or down")
}

fn cli() -> Command {
    Command::new("sheetwork")
        .version(sheetwork_core::VERSION)
        .about("Duplicate, reorder and prune project sheets in a JSON dump")
        .subcommand_required(true)
        .arg(
            Arg::new("data")
                .long("data")
                .short('d')
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON dump file, rewritten after every change"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("TOML workspace configuration"),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .short('p')
                .help("Project id (defaults to the configured one)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(Command::new("show").about("List sheets with their record counts"))
        .subcommand(
            Command::new("duplicate-sheet")
                .about("Copy a sheet with everything it owns")
                .arg(sheet_arg()),
        )
        .subcommand(
            Command::new("duplicate-item")
                .about("Copy an item with its descendants")
                .arg(sheet_arg())
                .arg(Arg::new("item").required(true).help("Item id")),
        )
        .subcommand(
            Command::new("duplicate-measure")
                .about("Copy a measure with its columns, rows and sub-measures")
                .arg(sheet_arg())
                .arg(Arg::new("measure").required(true).help("Measure id")),
        )
        .subcommand(
            Command::new("move-sheet")
                .about("Move a sheet among sheets of its kind")
                .arg(sheet_arg())
                .arg(direction_arg()),
        )
        .subcommand(
            Command::new("move")
                .about("Move a record among its siblings")
                .arg(sheet_arg())
                .arg(
                    Arg::new("kind")
                        .required(true)
                        .value_parser(["item", "column", "row", "measure"])
                        .help("Record kind"),
                )
                .arg(Arg::new("id").required(true).help("Record id"))
                .arg(direction_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a record and everything below it")
                .arg(sheet_arg())
                .arg(
                    Arg::new("kind")
                        .required(true)
                        .value_parser(["sheet", "item", "column", "measure"])
                        .help("Record kind"),
                )
                .arg(Arg::new("id").help("Record id (not needed for sheets)")),
        )
        .subcommand(
            Command::new("rename")
                .about("Rename a sheet")
                .arg(sheet_arg())
                .arg(Arg::new("name").required(true).help("New name")),
        )
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env("SHEETWORK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn text<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{name}>"))
}

fn id(args: &ArgMatches, name: &str) -> Result<EntityId> {
    text(args, name).map(EntityId::new)
}

fn direction(args: &ArgMatches) -> Result<Direction> {
    match text(args, "direction")? {
        "up" => Ok(Direction::Up),
        "down" => Ok(Direction::Down),
        other => bail!("unknown direction {other}"),
    }
}

async fn show(workspace: &Workspace<MemoryStore>) -> Result<()> {
    for sheet in workspace.sheets(None).await? {
        let snapshot = workspace.snapshot(&sheet.id).await?;
        println!(
            "{:>3}  {:<8}  {}  {} ({} records)",
            sheet.order,
            sheet.kind.as_str(),
            sheet.id,
            sheet.name,
            snapshot.record_count()
        );
    }
    Ok(())
}

/// Runs one mutating command; returns whether anything was written
async fn apply(workspace: &Workspace<MemoryStore>, command: &str, args: &ArgMatches) -> Result<bool> {
    let sheet = id(args, "sheet")?;
    let applied = match command {
        "duplicate-sheet" => {
            let copy = workspace.duplicate_sheet(&sheet).await?;
            println!("{}", copy.id);
            copy.records
        }
        "duplicate-item" => {
            let copy = workspace.duplicate_item(&sheet, &id(args, "item")?).await?;
            println!("{}", copy.id);
            copy.records
        }
        "duplicate-measure" => {
            let copy = workspace.duplicate_measure(&sheet, &id(args, "measure")?).await?;
            println!("{}", copy.id);
            copy.records
        }
        "move-sheet" => workspace.move_sheet(&sheet, direction(args)?).await?.applied,
        "move" => {
            let target = id(args, "id")?;
            let direction = direction(args)?;
            let receipt = match text(args, "kind")? {
                "item" => workspace.move_item(&sheet, &target, direction).await?,
                "column" => workspace.move_column(&sheet, &target, direction).await?,
                "row" => workspace.move_row(&sheet, &target, direction).await?,
                "measure" => workspace.move_measure(&sheet, &target, direction).await?,
                other => bail!("cannot move a {other}"),
            };
            receipt.applied
        }
        "delete" => {
            let kind = text(args, "kind")?;
            let receipt = if kind == "sheet" {
                workspace.delete_sheet(&sheet).await?
            } else {
                let target = id(args, "id")?;
                match kind {
                    "item" => workspace.delete_item(&sheet, &target).await?,
                    "column" => workspace.remove_column(&sheet, &target).await?,
                    "measure" => workspace.delete_measure(&sheet, &target).await?,
                    other => bail!("cannot delete a {other}"),
                }
            };
            receipt.applied
        }
        "rename" => workspace.rename_sheet(&sheet, text(args, "name")?).await?.applied,
        other => bail!("unknown command {other}"),
    };
    info!(command, writes = applied, "done");
    Ok(applied > 0)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("json-logs"));

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => WorkspaceConfig::from_path(path)?,
        None => WorkspaceConfig::default(),
    };
    let project = matches
        .get_one::<String>("project")
        .cloned()
        .or_else(|| config.default_project.clone())
        .context("no project given and none configured")?;
    let data = matches
        .get_one::<PathBuf>("data")
        .context("missing --data")?;

    let store = data::load(data)?;
    let workspace = Workspace::new(store.clone(), project, config);

    match matches.subcommand() {
        Some(("show", _)) => show(&workspace).await,
        Some((command, args)) => {
            if apply(&workspace, command, args).await? {
                data::save(&store, data)?;
            }
            Ok(())
        }
        None => bail!("no command given"),
    }
}
