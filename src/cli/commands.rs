use std::fmt::Write as _;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigPaths};
use crate::editor::{
    Clock, DraftController, DraftKey, DraftRecord, DraftStore, FileDraftStore, SaveOutcome,
    SystemClock,
};
use crate::model::{Category, Note, NoteStats, PrivacyLevel, ProfilePatch, Session, UserProfile};
use crate::remote::{RestClient, TableStore};
use crate::services::{AuthService, CategoriesService, DeleteOutcome, NoteFilters, NotesService};
use crate::session::SessionStore;
use crate::validation;

use super::Commands;

pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub paths: ConfigPaths,
    pub remote: Arc<RestClient>,
    pub sessions: SessionStore,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Account email (prompted if omitted)
    pub email: Option<String>,
    /// Account password (prompted if omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Account email (prompted if omitted)
    pub email: Option<String>,
    /// Account password (prompted if omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Only notes filed under this category name
    #[arg(long)]
    pub category: Option<String>,
    /// Only notes at this privacy level (private, protected, archived)
    #[arg(long)]
    pub privacy: Option<PrivacyLevel>,
    /// Filter by a search term across title and content
    #[arg(long)]
    pub search: Option<String>,
    /// Only the most recently updated notes (count from display.recent_limit)
    #[arg(long, conflicts_with_all = ["category", "privacy", "search"])]
    pub recent: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Search terms, matched case-insensitively against title and content
    #[arg(required = true)]
    pub query: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Note identifier
    pub id: Uuid,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note (prompted if omitted)
    pub title: Option<String>,
    /// Provide the note content inline. If omitted, reads from stdin.
    #[arg(long)]
    pub content: Option<String>,
    /// File the note under this category name
    #[arg(long)]
    pub category: Option<String>,
    /// Privacy level (private, protected, archived)
    #[arg(long)]
    pub privacy: Option<PrivacyLevel>,
    /// Mark the note as encrypted
    #[arg(long)]
    pub encrypted: bool,
    /// Adopt the fallback draft left by a previous unsaved note
    #[arg(long)]
    pub recover: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Note identifier
    pub id: Uuid,
    #[arg(long)]
    pub title: Option<String>,
    /// New content. Pass - to read from stdin.
    #[arg(long)]
    pub content: Option<String>,
    /// Move the note to this category name
    #[arg(long)]
    pub category: Option<String>,
    /// Remove the note from its category
    #[arg(long, conflicts_with = "category")]
    pub uncategorized: bool,
    #[arg(long)]
    pub privacy: Option<PrivacyLevel>,
    #[arg(long)]
    pub encrypted: Option<bool>,
    /// Adopt a surviving fallback draft before applying edits
    #[arg(long)]
    pub recover: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Note identifier
    pub id: Uuid,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// List categories with their active-note counts
    List,
    /// Create a category
    New(CategoryNewArgs),
    /// Rename or restyle a category
    Edit(CategoryEditArgs),
    /// Delete a category (notes become uncategorized)
    Delete(CategoryDeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CategoryNewArgs {
    pub name: String,
    /// Hex color, e.g. #3b82f6
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub icon: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryEditArgs {
    /// Existing category name
    pub name: String,
    #[arg(long)]
    pub rename: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub icon: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryDeleteArgs {
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct DraftArgs {
    #[command(subcommand)]
    pub command: DraftCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DraftCommand {
    /// List surviving fallback drafts, newest first
    List,
    /// Discard a fallback draft
    Discard(DraftDiscardArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DraftDiscardArgs {
    /// Note the draft shadows; omit for the unsaved-note draft
    pub note: Option<Uuid>,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// Show the stored preferences
    Show,
    /// Update one or more preferences
    Set(ProfileSetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProfileSetArgs {
    #[arg(long)]
    pub display_name: Option<String>,
    /// Privacy level applied to new notes (private, protected, archived)
    #[arg(long)]
    pub default_privacy: Option<PrivacyLevel>,
    /// Auto-lock timeout in minutes (0 disables)
    #[arg(long)]
    pub auto_lock_minutes: Option<u32>,
    #[arg(long)]
    pub notifications: Option<bool>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Write to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn dispatch(context: AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Login(args) => login(&context, args).await,
        Commands::Register(args) => register(&context, args).await,
        Commands::Logout => logout(&context).await,
        Commands::Whoami => whoami(&context),
        Commands::List(args) => list(&context, args).await,
        Commands::Search(args) => search(&context, args).await,
        Commands::Show(args) => show(&context, args).await,
        Commands::New(args) => new_note(&context, args).await,
        Commands::Edit(args) => edit_note(&context, args).await,
        Commands::Delete(args) => delete_note(&context, args).await,
        Commands::Categories(args) => categories(&context, args).await,
        Commands::Stats => stats(&context).await,
        Commands::Profile(args) => profile(&context, args).await,
        Commands::Drafts(args) => drafts(&context, args).await,
        Commands::Export(args) => export(&context, args).await,
    }
}

async fn login(ctx: &AppContext, args: LoginArgs) -> Result<()> {
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password")?,
    };
    let auth = AuthService::new(Arc::clone(&ctx.remote));
    let session = auth.sign_in(&email, &password).await?;
    ctx.remote
        .set_access_token(Some(session.access_token.clone()));
    ctx.sessions.save(&session)?;
    println!("Signed in as {}", session.email);
    Ok(())
}

async fn register(ctx: &AppContext, args: RegisterArgs) -> Result<()> {
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password")?,
    };
    let strength = validation::password_strength(&password);
    println!("Password strength: {strength:?}");

    let auth = AuthService::new(Arc::clone(&ctx.remote));
    let session = auth.register(&email, &password).await?;
    ctx.remote
        .set_access_token(Some(session.access_token.clone()));
    ctx.sessions.save(&session)?;
    println!("Account created; signed in as {}", session.email);
    Ok(())
}

async fn logout(ctx: &AppContext) -> Result<()> {
    let Some(session) = ctx.sessions.load()? else {
        println!("No active session.");
        return Ok(());
    };
    let auth = AuthService::new(Arc::clone(&ctx.remote));
    if let Err(err) = auth.sign_out(&session).await {
        tracing::warn!(error = %err, "remote sign-out failed; clearing local session anyway");
    }
    ctx.sessions.clear()?;
    println!("Signed out {}.", session.email);
    Ok(())
}

fn whoami(ctx: &AppContext) -> Result<()> {
    match ctx.sessions.load()? {
        Some(session) => println!("{} ({})", session.email, session.user_id),
        None => println!("Not signed in."),
    }
    Ok(())
}

async fn list(ctx: &AppContext, args: ListArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));
    if args.recent {
        let recent = notes
            .recent(session.user_id, ctx.config.display.recent_limit)
            .await?;
        print!(
            "{}",
            format_notes(&recent, ctx.config.display.preview_lines)
        );
        return Ok(());
    }
    let category_id = match &args.category {
        Some(name) => {
            let categories = CategoriesService::new(Arc::clone(&ctx.remote));
            Some(resolve_category(&categories, session.user_id, name).await?.id)
        }
        None => None,
    };
    let filters = NoteFilters {
        category_id,
        privacy: args.privacy,
        search: args.search,
    };
    let listed = notes.list(session.user_id, &filters).await?;
    print!(
        "{}",
        format_notes(&listed, ctx.config.display.preview_lines)
    );
    Ok(())
}

async fn search(ctx: &AppContext, args: SearchArgs) -> Result<()> {
    let term = args.query.join(" ");
    if term.trim().is_empty() {
        bail!("search query cannot be empty");
    }
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));
    let hits = notes.search(session.user_id, &term).await?;
    print!("{}", format_notes(&hits, ctx.config.display.preview_lines));
    Ok(())
}

async fn show(ctx: &AppContext, args: ShowArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));
    let note = notes.get(session.user_id, args.id).await?;
    print!("{}", format_note(&note));
    Ok(())
}

async fn new_note(ctx: &AppContext, args: NewArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));

    let store = FileDraftStore::new(ctx.paths.drafts_dir.clone())?;
    let (mut editor, recovery) = DraftController::open(
        notes,
        store,
        SystemClock,
        ctx.config.auto_save.clone(),
        session.user_id,
        None,
    )?;
    let recovered = adopt_or_refuse_recovery(&mut editor, recovery, args.recover)?;
    if recovered {
        println!("Recovered unsaved draft; pass --title/--content to amend it.");
    }

    if let Some(title) = &args.title {
        editor.set_title(title)?;
    } else if !recovered {
        editor.set_title(&prompt("Title")?)?;
    }
    if let Some(content) = &args.content {
        editor.set_content(content)?;
    } else if !recovered {
        if let Some(content) = read_stdin()? {
            editor.set_content(&content)?;
        }
    }
    if let Some(name) = &args.category {
        let categories = CategoriesService::new(Arc::clone(&ctx.remote));
        let category = resolve_category(&categories, session.user_id, name).await?;
        editor.set_category(Some(category.id))?;
    }
    if let Some(privacy) = args.privacy {
        editor.set_privacy(privacy)?;
    }
    if args.encrypted {
        editor.set_encrypted(true)?;
    }

    match editor.save().await? {
        SaveOutcome::Saved => {
            let id = editor
                .draft()
                .note_id
                .context("saved note has no identifier")?;
            println!("Created note {id}");
            Ok(())
        }
        SaveOutcome::Skipped => bail!("nothing to save; title and content are both empty"),
        SaveOutcome::Failed { message } => bail!("{message} (a fallback draft was kept locally)"),
    }
}

async fn edit_note(ctx: &AppContext, args: EditArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));
    let note = notes.get(session.user_id, args.id).await?;

    let store = FileDraftStore::new(ctx.paths.drafts_dir.clone())?;
    let (mut editor, recovery) = DraftController::open(
        notes,
        store,
        SystemClock,
        ctx.config.auto_save.clone(),
        session.user_id,
        Some(&note),
    )?;
    if let Some(record) = recovery {
        if args.recover {
            editor.adopt_recovery(&record);
            println!(
                "Recovered unsaved edits from {}.",
                format_timestamp(record.saved_at)
            );
        } else {
            println!(
                "Note: a fallback draft from {} exists; pass --recover to adopt it or `secretkeeper drafts discard {}` to drop it.",
                format_timestamp(record.saved_at),
                note.id
            );
        }
    }

    let mut edited = false;
    if let Some(title) = &args.title {
        editor.set_title(title)?;
        edited = true;
    }
    if let Some(content) = &args.content {
        let content = if content == "-" {
            read_stdin()?.context("pass content on stdin when using --content -")?
        } else {
            content.clone()
        };
        editor.set_content(&content)?;
        edited = true;
    }
    if args.uncategorized {
        editor.set_category(None)?;
        edited = true;
    } else if let Some(name) = &args.category {
        let categories = CategoriesService::new(Arc::clone(&ctx.remote));
        let category = resolve_category(&categories, session.user_id, name).await?;
        editor.set_category(Some(category.id))?;
        edited = true;
    }
    if let Some(privacy) = args.privacy {
        editor.set_privacy(privacy)?;
        edited = true;
    }
    if let Some(encrypted) = args.encrypted {
        editor.set_encrypted(encrypted)?;
        edited = true;
    }

    if !edited && !editor.is_dirty() {
        println!("No changes.");
        return Ok(());
    }

    match editor.save().await? {
        SaveOutcome::Saved => {
            println!("Saved note {}", note.id);
            Ok(())
        }
        SaveOutcome::Skipped => bail!("refusing to blank the note; title and content are both empty"),
        SaveOutcome::Failed { message } => bail!("{message} (a fallback draft was kept locally)"),
    }
}

async fn delete_note(ctx: &AppContext, args: DeleteArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));
    match notes.soft_delete(session.user_id, args.id).await? {
        DeleteOutcome::Deleted => println!("Moved note {} to the recycle bin.", args.id),
        DeleteOutcome::AlreadyGone => println!("Note {} is already gone.", args.id),
    }
    Ok(())
}

async fn categories(ctx: &AppContext, args: CategoryArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let service = CategoriesService::new(Arc::clone(&ctx.remote));
    match args.command {
        CategoryCommand::List => {
            let counted = service.list_with_counts(session.user_id).await?;
            print!("{}", format_categories(&counted));
        }
        CategoryCommand::New(args) => {
            let created = service
                .create(session.user_id, &args.name, args.color, args.icon)
                .await?;
            println!("Created category '{}' ({})", created.name, created.id);
        }
        CategoryCommand::Edit(args) => {
            let existing = resolve_category(&service, session.user_id, &args.name).await?;
            let patch = crate::model::CategoryPatch {
                name: args.rename,
                color: args.color,
                icon: args.icon,
            };
            let updated = service.update(session.user_id, existing.id, patch).await?;
            println!("Updated category '{}'", updated.name);
        }
        CategoryCommand::Delete(args) => {
            let existing = resolve_category(&service, session.user_id, &args.name).await?;
            service.delete(session.user_id, existing.id).await?;
            println!("Deleted category '{}'", existing.name);
        }
    }
    Ok(())
}

async fn stats(ctx: &AppContext) -> Result<()> {
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));
    let stats = notes.stats(session.user_id).await?;
    print!("{}", format_stats(&stats));
    Ok(())
}

async fn profile(ctx: &AppContext, args: ProfileArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let auth = AuthService::new(Arc::clone(&ctx.remote));
    match args.command {
        ProfileCommand::Show => {
            let profile = auth.profile(session.user_id).await?;
            print!("{}", format_profile(&profile));
        }
        ProfileCommand::Set(args) => {
            let patch = profile_patch(&args)?;
            let updated = auth.update_profile(session.user_id, patch).await?;
            println!("Preferences updated.");
            print!("{}", format_profile(&updated));
        }
    }
    Ok(())
}

async fn drafts(ctx: &AppContext, args: DraftArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let store = FileDraftStore::new(ctx.paths.drafts_dir.clone())?;
    match args.command {
        DraftCommand::List => {
            let records = store.list(session.user_id)?;
            print!("{}", format_drafts(&records));
        }
        DraftCommand::Discard(args) => {
            let key = match args.note {
                Some(note_id) => DraftKey::Note(note_id),
                None => DraftKey::New(session.user_id),
            };
            store.remove(key)?;
            println!("Draft discarded.");
        }
    }
    Ok(())
}

async fn export(ctx: &AppContext, args: ExportArgs) -> Result<()> {
    let session = require_session(ctx)?;
    let notes = NotesService::new(Arc::clone(&ctx.remote));
    let listed = notes.list(session.user_id, &NoteFilters::default()).await?;
    let json = export_json(&listed)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json.as_bytes())
                .with_context(|| format!("writing export {}", path.display()))?;
            println!("Exported {} notes to {}", listed.len(), path.display());
        }
        None => print!("{json}"),
    }
    Ok(())
}

fn require_session(ctx: &AppContext) -> Result<Session> {
    match ctx.sessions.load()? {
        Some(session) => {
            ctx.remote
                .set_access_token(Some(session.access_token.clone()));
            Ok(session)
        }
        None => bail!("not signed in; run `secretkeeper login` first"),
    }
}

/// A surviving fallback draft must be adopted or discarded before a new draft
/// may take its slot; proceeding would overwrite the crashed session's edits.
fn adopt_or_refuse_recovery<R, S, C>(
    editor: &mut DraftController<R, S, C>,
    recovery: Option<DraftRecord>,
    recover: bool,
) -> Result<bool>
where
    R: TableStore,
    S: DraftStore,
    C: Clock,
{
    let Some(record) = recovery else {
        return Ok(false);
    };
    if !recover {
        bail!(
            "a fallback draft from {} exists; pass --recover to adopt it or `secretkeeper drafts discard` to drop it",
            format_timestamp(record.saved_at)
        );
    }
    editor.adopt_recovery(&record);
    Ok(true)
}

fn profile_patch(args: &ProfileSetArgs) -> Result<ProfilePatch> {
    let patch = ProfilePatch {
        display_name: args.display_name.clone(),
        default_privacy: args.default_privacy,
        auto_lock_minutes: args.auto_lock_minutes,
        notifications_enabled: args.notifications,
    };
    if patch.display_name.is_none()
        && patch.default_privacy.is_none()
        && patch.auto_lock_minutes.is_none()
        && patch.notifications_enabled.is_none()
    {
        bail!("nothing to update; pass at least one --display-name/--default-privacy/--auto-lock-minutes/--notifications");
    }
    Ok(patch)
}

async fn resolve_category<R: TableStore>(
    service: &CategoriesService<R>,
    user_id: Uuid,
    name: &str,
) -> Result<Category> {
    let listed = service.list(user_id).await?;
    listed
        .into_iter()
        .find(|category| category.name.eq_ignore_ascii_case(name.trim()))
        .with_context(|| format!("no category named '{name}'"))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_notes(notes: &[Note], preview_lines: usize) -> String {
    if notes.is_empty() {
        return "No notes found.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let mut headline = format!("{}  {}", note.id, display_title(note));
        if note.is_encrypted {
            headline.push_str("  [ENCRYPTED]");
        }
        match note.privacy_level {
            PrivacyLevel::Protected => headline.push_str("  [PROTECTED]"),
            PrivacyLevel::Archived => headline.push_str("  [ARCHIVED]"),
            PrivacyLevel::Private => {}
        }
        let _ = writeln!(&mut out, "{headline}");
        let _ = writeln!(&mut out, "    updated {}", format_timestamp(note.updated_at));
        if let Some(snippet) = build_snippet(note, preview_lines) {
            let _ = writeln!(&mut out, "    {snippet}");
        }
        out.push('\n');
    }
    out
}

fn format_note(note: &Note) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", display_title(note));
    let _ = writeln!(&mut out, "id        {}", note.id);
    let _ = writeln!(&mut out, "privacy   {}", note.privacy_level);
    if note.is_encrypted {
        let _ = writeln!(&mut out, "encrypted yes");
    }
    if let Some(category_id) = note.category_id {
        let _ = writeln!(&mut out, "category  {category_id}");
    }
    let _ = writeln!(&mut out, "created   {}", format_timestamp(note.created_at));
    let _ = writeln!(&mut out, "updated   {}", format_timestamp(note.updated_at));
    out.push('\n');
    out.push_str(&note.content);
    if !note.content.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn format_categories(counted: &[crate::model::CategoryWithCount]) -> String {
    if counted.is_empty() {
        return "No categories.\n".to_string();
    }
    let mut out = String::new();
    for entry in counted {
        let plural = if entry.note_count == 1 { "" } else { "s" };
        let _ = writeln!(
            &mut out,
            "{}  {} ({} note{plural})",
            entry.category.id, entry.category.name, entry.note_count
        );
    }
    out
}

fn format_stats(stats: &NoteStats) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "total        {}", stats.total);
    let _ = writeln!(&mut out, "encrypted    {}", stats.encrypted);
    let _ = writeln!(&mut out, "categorized  {}", stats.categorized);
    let _ = writeln!(&mut out, "private      {}", stats.private);
    out
}

fn format_profile(profile: &UserProfile) -> String {
    let mut out = String::new();
    let name = if profile.display_name.trim().is_empty() {
        "<unset>"
    } else {
        profile.display_name.trim()
    };
    let _ = writeln!(&mut out, "display name     {name}");
    let _ = writeln!(&mut out, "default privacy  {}", profile.default_privacy);
    let _ = writeln!(
        &mut out,
        "auto-lock        {}",
        match profile.auto_lock_minutes {
            0 => "off".to_string(),
            minutes => format!("{minutes} min"),
        }
    );
    let _ = writeln!(
        &mut out,
        "notifications    {}",
        if profile.notifications_enabled {
            "on"
        } else {
            "off"
        }
    );
    out
}

fn format_drafts(records: &[DraftRecord]) -> String {
    if records.is_empty() {
        return "No fallback drafts.\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let target = match record.note_id {
            Some(note_id) => note_id.to_string(),
            None => "(unsaved note)".to_string(),
        };
        let title = if record.title.trim().is_empty() {
            "<untitled>"
        } else {
            record.title.trim()
        };
        let _ = writeln!(
            &mut out,
            "{target}  {title}  saved {}",
            format_timestamp(record.saved_at)
        );
    }
    out
}

fn export_json(notes: &[Note]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(notes).context("serialising export")?;
    json.push('\n');
    Ok(json)
}

fn display_title(note: &Note) -> &str {
    let trimmed = note.title.trim();
    if trimmed.is_empty() {
        "<untitled>"
    } else {
        trimmed
    }
}

fn build_snippet(note: &Note, preview_lines: usize) -> Option<String> {
    if preview_lines == 0 {
        return None;
    }
    let mut segments = Vec::new();
    for line in note.content.lines().take(preview_lines) {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
    }
    if segments.is_empty() {
        None
    } else {
        let snippet = segments.join(" ");
        Some(snippet.chars().take(160).collect())
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}
