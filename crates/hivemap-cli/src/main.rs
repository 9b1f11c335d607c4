use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use hivemap_core::due::{self, parse_iso_date};
use hivemap_core::hive::DEFAULT_HIVE_SIZE;
use hivemap_core::schema::UNNAMED_HIVE;
use hivemap_core::settings::{self, color_for};
use hivemap_core::transfer::{self, parse_document};
use hivemap_core::{
    apiary, hive_stats, notes, HiveEditForm, HiveRecord, Inspection, QueenStatus, Repository,
    BOX_TYPES,
};
use hivemap_store_sqlite::SqliteStore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::{Date, OffsetDateTime};
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const LOG_ENV: &str = "HIVEMAP_LOG";

type Repo = Repository<SqliteStore>;

#[derive(Debug, Parser)]
#[command(name = "hivemap")]
#[command(about = "HiveMap apiary and hive records CLI")]
struct Cli {
    #[arg(long, env = "HIVEMAP_DB", default_value = "./hivemap.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
    Apiary {
        #[command(subcommand)]
        command: Box<ApiaryCommand>,
    },
    Hive {
        #[command(subcommand)]
        command: Box<HiveCommand>,
    },
    Note {
        #[command(subcommand)]
        command: Box<NoteCommand>,
    },
    Status {
        #[command(subcommand)]
        command: Box<StatusCommand>,
    },
    Type {
        #[command(subcommand)]
        command: Box<TypeCommand>,
    },
    Due(DueArgs),
    Stats,
    Export(ExportArgs),
    ExportLayout(ExportLayoutArgs),
    Import(ImportArgs),
    ImportLayout(ImportArgs),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum ApiaryCommand {
    List,
    Create { name: String },
    Switch { name: String },
    Rename { old: String, new: String },
    Delete { name: String },
}

#[derive(Debug, Subcommand)]
enum HiveCommand {
    List(HiveListArgs),
    Create(HiveCreateArgs),
    Edit(HiveEditArgs),
    Delete { name: String },
    Archive { name: String },
    Restore { name: String },
    InspectionDelete { name: String, index: usize },
    BoxAdd(BoxAddArgs),
    BoxRemove { name: String, index: usize },
    SuggestName,
}

#[derive(Debug, Args)]
struct HiveListArgs {
    /// List archived hives instead of visible ones.
    #[arg(long, default_value_t = false)]
    archived: bool,
}

#[derive(Debug, Args)]
struct HiveCreateArgs {
    name: String,
    #[arg(long, default_value_t = DEFAULT_HIVE_SIZE)]
    width: f64,
    #[arg(long, default_value_t = DEFAULT_HIVE_SIZE)]
    height: f64,
}

/// Omitted fields keep the hive's current values; omitted inspection fields repeat the
/// latest inspection, so an edit that only touches identity fields appends nothing.
#[derive(Debug, Args)]
struct HiveEditArgs {
    name: String,
    #[arg(long)]
    new_name: Option<String>,
    #[arg(long)]
    hive_type: Option<String>,
    #[arg(long)]
    next_inspection: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    queen_status: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Args)]
struct BoxAddArgs {
    name: String,
    #[arg(value_parser = PossibleValuesParser::new(BOX_TYPES))]
    box_type: String,
    #[arg(allow_negative_numbers = true)]
    count: i64,
}

#[derive(Debug, Subcommand)]
enum NoteCommand {
    List,
    Add {
        text: String,
        #[arg(long, default_value = "")]
        date: String,
    },
    /// Delete by position in the displayed (newest first) order.
    Delete { index: usize },
}

#[derive(Debug, Subcommand)]
enum StatusCommand {
    List,
    Add { name: String, color: String },
    Rename { index: usize, name: String },
    Recolor { index: usize, color: String },
    Delete { index: usize },
    /// Resolve the display colour for a queen status string.
    Color { status: String },
}

#[derive(Debug, Subcommand)]
enum TypeCommand {
    List,
    Add { name: String },
}

#[derive(Debug, Args)]
struct DueArgs {
    #[arg(long, default_value_t = false)]
    next_7_days: bool,
    /// Reference date (YYYY-MM-DD); defaults to the current UTC date.
    #[arg(long)]
    today: Option<String>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct ExportLayoutArgs {
    #[arg(long)]
    out: PathBuf,
    /// Apiary to export; defaults to the current apiary.
    #[arg(long)]
    apiary: Option<String>,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut store = SqliteStore::open(&cli.db)?;
    tracing::debug!(db = %cli.db.display(), "opened hivemap database");

    let command = match cli.command {
        Command::Db { command } => return run_db(*command, &mut store),
        other => other,
    };

    store.migrate()?;
    let mut repo = Repository::new(store);
    match command {
        Command::Db { .. } => Err(anyhow!("db commands are dispatched before migration")),
        Command::Apiary { command } => run_apiary(*command, &mut repo),
        Command::Hive { command } => run_hive(*command, &mut repo),
        Command::Note { command } => run_note(*command, &mut repo),
        Command::Status { command } => run_status(*command, &mut repo),
        Command::Type { command } => run_type(*command, &mut repo),
        Command::Due(args) => run_due(&args, &repo),
        Command::Stats => run_stats(&repo),
        Command::Export(args) => run_export(&args, &repo),
        Command::ExportLayout(args) => run_export_layout(&args, &repo),
        Command::Import(args) => run_import(&args, &mut repo),
        Command::ImportLayout(args) => run_import_layout(&args, &mut repo),
    }
}

fn run_db(command: DbCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => run_db_schema_version(store),
        DbCommand::Migrate(args) => run_db_migrate(&args, store),
    }
}

fn run_db_schema_version(store: &SqliteStore) -> Result<()> {
    let status = store.schema_status()?;
    emit_json(serde_json::json!({
        "current_version": status.current_version,
        "target_version": status.target_version,
        "pending_versions": status.pending_versions,
        "up_to_date": status.pending_versions.is_empty()
    }))
}

fn run_db_migrate(args: &DbMigrateArgs, store: &mut SqliteStore) -> Result<()> {
    let before = store.schema_status()?;
    if args.dry_run {
        emit_json(serde_json::json!({
            "dry_run": true,
            "current_version": before.current_version,
            "target_version": before.target_version,
            "would_apply_versions": before.pending_versions
        }))?;
        return Ok(());
    }

    store.migrate()?;
    let after = store.schema_status()?;
    emit_json(serde_json::json!({
        "dry_run": false,
        "before_version": before.current_version,
        "applied_versions": before.pending_versions,
        "after_version": after.current_version,
        "target_version": after.target_version,
        "up_to_date": after.pending_versions.is_empty()
    }))
}

fn run_apiary(command: ApiaryCommand, repo: &mut Repo) -> Result<()> {
    match command {
        ApiaryCommand::List => {}
        ApiaryCommand::Create { name } => {
            apiary::create(repo, &name)?;
        }
        ApiaryCommand::Switch { name } => apiary::switch(repo, &name, None)?,
        ApiaryCommand::Rename { old, new } => apiary::rename(repo, &old, &new)?,
        ApiaryCommand::Delete { name } => {
            apiary::delete(repo, &name)?;
        }
    }
    emit_json(serde_json::json!({
        "apiaries": repo.apiaries()?,
        "current": repo.current_apiary()?
    }))
}

fn hive_view(hive: &HiveRecord, statuses: &[QueenStatus]) -> Value {
    serde_json::json!({
        "name": hive.display_name(),
        "hiveType": hive.hive_type,
        "status": hive.status.as_str(),
        "nextInspectionDate": hive.next_inspection_date,
        "boxes": hive.boxes,
        "latestInspection": hive.latest_inspection(),
        "inspectionCount": hive.inspections.len(),
        "color": color_for(statuses, hive.effective_queen_status())
    })
}

fn run_hive(command: HiveCommand, repo: &mut Repo) -> Result<()> {
    let (apiary_name, mut layout) = apiary::current_layout(repo)?;
    let statuses = repo.queen_statuses()?;

    let mut output = match command {
        HiveCommand::List(args) => {
            let listed = if args.archived {
                layout.archived_hives()
            } else {
                layout.hives().filter(|hive| !hive.is_archived()).collect()
            };
            let hives =
                listed.into_iter().map(|hive| hive_view(hive, &statuses)).collect::<Vec<_>>();
            return emit_json(serde_json::json!({ "apiary": apiary_name, "hives": hives }));
        }
        HiveCommand::SuggestName => {
            return emit_json(serde_json::json!({
                "apiary": apiary_name,
                "used": layout.hive_names(),
                "suggested": layout.suggest_hive_name()
            }));
        }
        HiveCommand::Create(args) => {
            let hive = layout.create_hive(&args.name, args.width, args.height)?;
            serde_json::json!({ "hive": hive_view(hive, &statuses) })
        }
        HiveCommand::Edit(args) => {
            let hive = layout.find_hive_mut(&args.name)?;
            let latest = hive.latest_inspection().cloned().unwrap_or_default();
            let form = HiveEditForm {
                name: args.new_name.unwrap_or_else(|| hive.name.clone()),
                hive_type: args.hive_type.unwrap_or_else(|| hive.hive_type.clone()),
                next_inspection_date: args
                    .next_inspection
                    .unwrap_or_else(|| hive.next_inspection_date.clone()),
                inspection: Inspection {
                    date: args.date.unwrap_or(latest.date),
                    queen_status: args.queen_status.unwrap_or(latest.queen_status),
                    notes: args.notes.unwrap_or(latest.notes),
                },
            };
            let outcome = layout.save_hive_edit(&args.name, &form, &statuses)?;
            let hive = layout
                .find_hive(form.name.trim())
                .or_else(|| layout.find_hive(UNNAMED_HIVE))
                .ok_or_else(|| anyhow!("edited hive disappeared from layout"))?;
            serde_json::json!({
                "hive": hive_view(hive, &statuses),
                "inspection_appended": outcome.appended,
                "color": outcome.color
            })
        }
        HiveCommand::Delete { name } => {
            let removed = layout.remove_hive(&name)?;
            serde_json::json!({ "deleted": removed.display_name() })
        }
        HiveCommand::Archive { name } => {
            let hive = layout.find_hive_mut(&name)?;
            hive.archive();
            serde_json::json!({ "hive": hive_view(hive, &statuses) })
        }
        HiveCommand::Restore { name } => {
            let hive = layout.find_hive_mut(&name)?;
            hive.restore();
            serde_json::json!({ "hive": hive_view(hive, &statuses) })
        }
        HiveCommand::InspectionDelete { name, index } => {
            let hive = layout.find_hive_mut(&name)?;
            let removed = hive.delete_inspection(index)?;
            serde_json::json!({ "hive": hive_view(hive, &statuses), "deleted": removed })
        }
        HiveCommand::BoxAdd(args) => {
            let hive = layout.find_hive_mut(&args.name)?;
            hive.add_box(&args.box_type, args.count)?;
            serde_json::json!({ "hive": hive_view(hive, &statuses) })
        }
        HiveCommand::BoxRemove { name, index } => {
            let hive = layout.find_hive_mut(&name)?;
            let removed = hive.remove_box(index)?;
            serde_json::json!({ "hive": hive_view(hive, &statuses), "deleted": removed })
        }
    };

    apiary::save_current_layout(repo, &layout)?;
    if let Value::Object(object) = &mut output {
        object.insert("apiary".to_string(), Value::String(apiary_name));
    }
    emit_json(output)
}

fn current_apiary(repo: &Repo) -> Result<String> {
    repo.current_apiary()?.ok_or_else(|| anyhow!("no current apiary; create one first"))
}

fn run_note(command: NoteCommand, repo: &mut Repo) -> Result<()> {
    let apiary_name = current_apiary(repo)?;
    let deleted = match command {
        NoteCommand::List => None,
        NoteCommand::Add { text, date } => {
            notes::add(repo, &apiary_name, &text, &date)?;
            None
        }
        NoteCommand::Delete { index } => Some(notes::remove(repo, &apiary_name, index)?),
    };
    let ordered = notes::display_order(notes::load(repo, &apiary_name)?);
    emit_json(serde_json::json!({
        "apiary": apiary_name,
        "notes": ordered,
        "deleted": deleted
    }))
}

fn run_status(command: StatusCommand, repo: &mut Repo) -> Result<()> {
    let statuses = match command {
        StatusCommand::List => repo.queen_statuses()?,
        StatusCommand::Add { name, color } => settings::add_queen_status(repo, &name, &color)?,
        StatusCommand::Rename { index, name } => settings::rename_queen_status(repo, index, &name)?,
        StatusCommand::Recolor { index, color } => {
            settings::recolor_queen_status(repo, index, &color)?
        }
        StatusCommand::Delete { index } => {
            settings::remove_queen_status(repo, index)?;
            repo.queen_statuses()?
        }
        StatusCommand::Color { status } => {
            let statuses = repo.queen_statuses()?;
            return emit_json(serde_json::json!({
                "status": status,
                "color": color_for(&statuses, &status)
            }));
        }
    };
    emit_json(serde_json::json!({ "queen_statuses": statuses }))
}

fn run_type(command: TypeCommand, repo: &mut Repo) -> Result<()> {
    let types = match command {
        TypeCommand::List => repo.hive_types()?,
        TypeCommand::Add { name } => settings::add_hive_type(repo, &name)?,
    };
    emit_json(serde_json::json!({ "hive_types": types, "box_types": BOX_TYPES }))
}

fn resolve_today(value: Option<&str>) -> Result<Date> {
    match value {
        Some(value) => Ok(parse_iso_date(value)?),
        None => Ok(OffsetDateTime::now_utc().date()),
    }
}

fn run_due(args: &DueArgs, repo: &Repo) -> Result<()> {
    let today = resolve_today(args.today.as_deref())?;
    let all = due::due_inspections(repo)?;
    let shown = if args.next_7_days { due::within_window(&all, today) } else { all.clone() };

    let entries = shown
        .iter()
        .map(|entry| {
            serde_json::json!({
                "apiaryName": entry.apiary_name,
                "hiveName": entry.hive_name,
                "dueDate": entry.due_date,
                "urgency": entry.urgency(today).as_str()
            })
        })
        .collect::<Vec<_>>();
    emit_json(serde_json::json!({
        "today": due::iso_date(today),
        "next_7_days": args.next_7_days,
        "total": all.len(),
        "due_now": due::due_now(&all, today),
        "entries": entries
    }))
}

fn run_stats(repo: &Repo) -> Result<()> {
    let stats = hive_stats(repo)?;
    let current = repo.current_apiary()?;
    let current_counts = current.as_deref().map(|name| stats.for_apiary(name)).unwrap_or_default();
    emit_json(serde_json::json!({
        "apiaries": stats.apiaries,
        "total": stats.total,
        "current_apiary": current,
        "current": current_counts
    }))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn write_json_file(path: &Path, value: &Value) -> Result<String> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, &body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(sha256_hex(body.as_bytes()))
}

fn read_document(path: &Path) -> Result<Value> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read import file {}", path.display()))?;
    Ok(parse_document(&body)?)
}

fn run_export(args: &ExportArgs, repo: &Repo) -> Result<()> {
    let document = transfer::export_all(repo)?;
    let apiary_count = document.apiaries.len();
    let sha256 = write_json_file(&args.out, &serde_json::to_value(&document)?)?;
    emit_json(serde_json::json!({
        "out": args.out,
        "apiaries": apiary_count,
        "sha256": sha256
    }))
}

fn run_export_layout(args: &ExportLayoutArgs, repo: &Repo) -> Result<()> {
    let apiary_name = match &args.apiary {
        Some(name) => name.clone(),
        None => current_apiary(repo)?,
    };
    let document = transfer::export_layout(repo, &apiary_name)?;
    let sha256 = write_json_file(&args.out, &serde_json::to_value(&document)?)?;
    emit_json(serde_json::json!({
        "out": args.out,
        "apiary": apiary_name,
        "sha256": sha256
    }))
}

fn run_import(args: &ImportArgs, repo: &mut Repo) -> Result<()> {
    let document = read_document(&args.input)?;
    let summary = transfer::import_all(repo, &document)?;
    emit_json(serde_json::json!({
        "in": args.input,
        "imported_apiaries": summary.apiaries,
        "current": summary.current
    }))
}

fn run_import_layout(args: &ImportArgs, repo: &mut Repo) -> Result<()> {
    let file_name = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("import path has no file name: {}", args.input.display()))?;
    let document = read_document(&args.input)?;
    let apiary_name = transfer::import_single_layout(repo, file_name, &document, None)?;
    emit_json(serde_json::json!({
        "in": args.input,
        "apiary": apiary_name,
        "apiaries": repo.apiaries()?
    }))
}
