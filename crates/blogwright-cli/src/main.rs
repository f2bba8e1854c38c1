use std::env;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use blogwright_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use blogwright_contracts::conversation::{EntryPhase, Role, TranscriptEntry};
use blogwright_contracts::document::{analyze_html, drop_zones, mutate, DropZone, ImageBlock, Mutation, Section};
use blogwright_contracts::journal::SessionJournal;
use blogwright_contracts::markup::HeadingScope;
use blogwright_contracts::models::{
    GenerationRequest, ModelCatalog, ModelSelector, Provider, TargetAudience, Tone,
    DEFAULT_SECTIONS,
};
use blogwright_contracts::session::{AuthTokens, LocalStore, Screen, SessionConfig, UserProfile};
use blogwright_engine::{
    ApiClient, ApiConfig, DropOutcome, DryrunSourcing, HttpImageSourcing, ImageSourcing, Workbench,
    DEFAULT_SEARCH_LIMIT,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BLOGWRIGHT_LOG";
const STATE_DIR_ENV: &str = "BLOGWRIGHT_STATE_DIR";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Parser)]
#[command(name = "blogwright", version, about = "Streamed blog generation with image placement")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Backend base url (default: $BLOGWRIGHT_API_BASE or http://localhost:8000).
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Where session state and events.jsonl live.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
    /// Heading levels that start a section, e.g. `1-3` or `2`.
    #[arg(long, global = true, default_value = "1-3")]
    heading_levels: HeadingScope,
    /// Produce placeholder images offline instead of calling the image endpoints.
    #[arg(long, global = true)]
    dryrun_images: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Generate(GenerateArgs),
    Models,
    Sections(SectionsArgs),
    Insert(InsertArgs),
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
}

#[derive(Debug, Clone, Args)]
struct GenerationArgs {
    #[arg(long, default_value = "local")]
    provider: Provider,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value = "general")]
    audience: TargetAudience,
    #[arg(long, default_value = "informative")]
    tone: Tone,
    #[arg(long, default_value_t = i64::from(DEFAULT_SECTIONS))]
    sections: i64,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[command(flatten)]
    generation: GenerationArgs,
    /// Directory for /export and /save_image when no path is given.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    topic: String,
    #[command(flatten)]
    generation: GenerationArgs,
    /// Write the document here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SectionsArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct InsertArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    url: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    zone: DropZone,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    Show,
    CompleteLanding,
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        refresh_token: Option<String>,
    },
    SignOut,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("blogwright error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let global = cli.global;
    match cli.command {
        Command::Chat(args) => run_chat(&global, args),
        Command::Generate(args) => run_generate(&global, args),
        Command::Models => run_models(&global),
        Command::Sections(args) => run_sections(&global, args),
        Command::Insert(args) => run_insert(&global, args),
        Command::Session { action } => run_session(&global, action),
    }
}

fn state_dir(global: &GlobalArgs) -> PathBuf {
    global
        .state_dir
        .clone()
        .or_else(|| non_empty_env(STATE_DIR_ENV).map(PathBuf::from))
        .or_else(|| dirs::data_dir().map(|dir| dir.join("blogwright")))
        .unwrap_or_else(|| PathBuf::from(".blogwright"))
}

fn open_session(global: &GlobalArgs) -> (LocalStore, SessionConfig) {
    let mut store = LocalStore::new(state_dir(global).join(SESSION_FILE));
    let session = SessionConfig::load(&mut store);
    (store, session)
}

fn api_client(global: &GlobalArgs, session: &SessionConfig) -> Result<ApiClient> {
    let config = ApiConfig::resolve(global.api_base.as_deref()).with_access_token(session.access_token());
    ApiClient::new(config)
}

fn open_workbench(global: &GlobalArgs, session: SessionConfig) -> Workbench {
    let journal = SessionJournal::in_dir(&state_dir(global));
    Workbench::new(session, journal, global.heading_levels)
}

fn image_sourcing<'a>(global: &GlobalArgs, api: &'a ApiClient) -> Box<dyn ImageSourcing + 'a> {
    if global.dryrun_images {
        Box::new(DryrunSourcing::new())
    } else {
        Box::new(HttpImageSourcing::new(api))
    }
}

/// Catalog from the backend, or the built-in one when it cannot be reached.
fn load_catalog(api: &ApiClient) -> ModelCatalog {
    match api.models() {
        Ok(catalog) if !catalog.is_empty() => catalog,
        Ok(_) => {
            tracing::warn!("backend listed no models; using built-in catalog");
            ModelCatalog::new(None)
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "model list unavailable; using built-in catalog");
            ModelCatalog::new(None)
        }
    }
}

fn build_request(settings: &GenerationArgs, selector: &ModelSelector, topic: &str) -> Result<GenerationRequest> {
    let selection = selector
        .select(settings.provider, settings.model.as_deref())
        .map_err(anyhow::Error::msg)?;
    if settings.model.is_some() {
        if let Some(reason) = selection.fallback_reason.as_deref() {
            eprintln!("{reason} Using {}.", selection.model.name);
        }
    }
    Ok(GenerationRequest::new(
        topic,
        settings.provider,
        selection.model.name,
        settings.audience,
        settings.tone,
        settings.sections,
    )?)
}

fn run_generate(global: &GlobalArgs, args: GenerateArgs) -> Result<i32> {
    let (_, session) = open_session(global);
    let api = api_client(global, &session)?;
    let selector = ModelSelector::new(Some(load_catalog(&api)));
    let request = build_request(&args.generation, &selector, &args.topic)?;
    let mut bench = open_workbench(global, session);

    let mut printer = ProgressPrinter::default();
    let entry_id = bench.run_generation(&api, &request, |entry| printer.show(entry))?;
    let Some(entry) = bench.conversation().entry(entry_id) else {
        bail!("generation entry {entry_id} disappeared");
    };
    if !entry.is_complete() {
        eprintln!(
            "{}",
            entry.error_detail.as_deref().unwrap_or(entry.content.as_str())
        );
        return Ok(1);
    }

    match &args.out {
        Some(path) => {
            write_text(path, &entry.content)?;
            eprintln!("Wrote {} ({} sections)", path.display(), bench.sections().len());
        }
        None => println!("{}", entry.content),
    }
    Ok(0)
}

fn run_models(global: &GlobalArgs) -> Result<i32> {
    let (_, session) = open_session(global);
    let catalog = load_catalog(&api_client(global, &session)?);
    if catalog.is_empty() {
        println!("No models available.");
        return Ok(0);
    }
    for provider in catalog.providers() {
        let default = catalog.default_for(provider).map(|model| model.name.clone());
        println!("{provider}:");
        for model in catalog.list(provider) {
            let marker = if default.as_deref() == Some(model.name.as_str()) {
                " (default)"
            } else {
                ""
            };
            match &model.label {
                Some(label) => println!("  {} - {label}{marker}", model.name),
                None => println!("  {}{marker}", model.name),
            }
        }
    }
    Ok(0)
}

fn run_sections(global: &GlobalArgs, args: SectionsArgs) -> Result<i32> {
    let html = read_text(&args.input)?;
    let sections = analyze_html(&html, global.heading_levels);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
        return Ok(0);
    }
    if sections.is_empty() {
        println!("No sections found (heading levels {}).", global.heading_levels);
        return Ok(0);
    }
    for line in section_lines(&sections, |_| false) {
        println!("{line}");
    }
    Ok(0)
}

fn run_insert(global: &GlobalArgs, args: InsertArgs) -> Result<i32> {
    let html = read_text(&args.input)?;
    let block = ImageBlock::new(args.url.as_str(), args.description.as_str());
    match mutate(&html, &block, args.zone, global.heading_levels) {
        Mutation::Applied(updated) => {
            match &args.out {
                Some(path) => write_text(path, &updated)?,
                None => println!("{updated}"),
            }
            Ok(0)
        }
        Mutation::Stale => {
            eprintln!(
                "Drop zone {} does not exist in {}; document left unchanged.",
                args.zone,
                args.input.display()
            );
            Ok(2)
        }
    }
}

fn run_session(global: &GlobalArgs, action: SessionCommand) -> Result<i32> {
    let (mut store, mut session) = open_session(global);
    match action {
        SessionCommand::Show => {
            println!("state: {}", store.path().display());
            println!("screen: {}", session.initial_screen().as_str());
            println!("landing completed: {}", session.completed_landing);
            match &session.user {
                Some(user) => println!("user: {}", user.email),
                None => println!("user: (signed out)"),
            }
            println!(
                "access token: {}",
                if session.access_token().is_some() { "present" } else { "none" }
            );
        }
        SessionCommand::CompleteLanding => {
            session.mark_landing_completed(&mut store)?;
            println!("Landing completed.");
        }
        SessionCommand::SignIn {
            email,
            token,
            refresh_token,
        } => {
            let user = UserProfile {
                email: email.trim().to_string(),
                name: None,
            };
            let tokens = AuthTokens {
                access: token.trim().to_string(),
                refresh: refresh_token,
            };
            session.sign_in(&mut store, user, tokens)?;
            println!("Signed in as {}.", email.trim());
        }
        SessionCommand::SignOut => {
            session.sign_out(&mut store)?;
            println!("Signed out.");
        }
    }
    Ok(0)
}

fn run_chat(global: &GlobalArgs, args: ChatArgs) -> Result<i32> {
    let (mut store, mut session) = open_session(global);
    match session.initial_screen() {
        Screen::Landing => {
            println!("Welcome to Blogwright: describe a topic and watch the post being written.");
            session.mark_landing_completed(&mut store)?;
        }
        Screen::Login => {
            println!("Not signed in; requests are sent without an access token.");
        }
        Screen::Generator => {}
    }

    let api = api_client(global, &session)?;
    let sourcing = image_sourcing(global, &api);
    let selector = ModelSelector::new(Some(load_catalog(&api)));
    let mut settings = args.generation.clone();
    let out_dir = args.out.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut bench = open_workbench(global, session);

    let stdin = io::stdin();
    let mut line = String::new();

    println!("Blogwright chat started. Type a topic, or /help for commands.");

    loop {
        for id in bench.flush_notices(Instant::now()) {
            if let Some(entry) = bench.conversation().entry(id) {
                println!("* {}", entry.content);
            }
        }
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "noop" {
            continue;
        }
        let context = ChatContext {
            api: &api,
            sourcing: sourcing.as_ref(),
            selector: &selector,
            out_dir: &out_dir,
        };
        if let Err(err) = handle_intent(&mut bench, &mut settings, &context, &intent) {
            println!("Error: {err:#}");
        }
    }
    Ok(0)
}

struct ChatContext<'a> {
    api: &'a ApiClient,
    sourcing: &'a dyn ImageSourcing,
    selector: &'a ModelSelector,
    out_dir: &'a Path,
}

fn handle_intent(
    bench: &mut Workbench,
    settings: &mut GenerationArgs,
    context: &ChatContext<'_>,
    intent: &Intent,
) -> Result<()> {
    match intent.action.as_str() {
        "help" => {
            println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
        }
        "generate" => {
            let topic = intent.topic.as_deref().unwrap_or_default();
            let request = build_request(settings, context.selector, topic)?;
            let mut printer = ProgressPrinter::default();
            let id = bench.run_generation(context.api, &request, |entry| printer.show(entry))?;
            if bench
                .conversation()
                .entry(id)
                .map(TranscriptEntry::is_complete)
                .unwrap_or(false)
            {
                print_sections(bench);
            }
        }
        "set_provider" | "set_model" | "set_audience" | "set_tone" | "set_sections" => {
            for (key, value) in &intent.settings_update {
                apply_setting(settings, key, value.as_str().unwrap_or_default())?;
            }
            println!("{}", describe_settings(settings));
        }
        "toggle_sections" => {
            let indices = parse_indices(&intent.arg_list("args"))?;
            if indices.is_empty() {
                bail!("/select needs one or more section numbers");
            }
            for index in indices {
                bench.toggle_section(index)?;
            }
            print_sections(bench);
        }
        "select_all_sections" => {
            bench.select_all_sections();
            print_sections(bench);
        }
        "generate_section_images" => {
            let batch = bench.generate_section_images(context.sourcing)?;
            println!(
                "Added {} image(s); {} section(s) failed.",
                batch.added, batch.failed_sections
            );
        }
        "search_images" => {
            let query = intent.arg_str("query").unwrap_or_default();
            let added = bench.search_images(context.sourcing, query, DEFAULT_SEARCH_LIMIT)?;
            println!("Added {added} image(s).");
        }
        "search_images_for_sections" => {
            let added = bench.search_images_for_sections(context.sourcing)?;
            println!("Added {added} image(s).");
        }
        "show_gallery" => {
            if bench.gallery().is_empty() {
                println!("Gallery is empty.");
            }
            for image in bench.gallery().iter() {
                println!(
                    "{}  [{}{}]  {}",
                    image.id,
                    image.source.as_str(),
                    image
                        .section_id
                        .as_deref()
                        .map(|id| format!(" {id}"))
                        .unwrap_or_default(),
                    image.description
                );
            }
        }
        "show_zones" => {
            if bench.latest_document().is_none() {
                bail!("there is no completed document yet");
            }
            for zone in drop_zones(bench.sections()) {
                println!("{zone}");
            }
        }
        "begin_drag" => {
            let image_id = intent.arg_str("arg").unwrap_or_default();
            if image_id.is_empty() {
                bail!("/drag needs an image id (see /gallery)");
            }
            bench.begin_drag(image_id)?;
            println!("Dragging {image_id}. Use /drop <zone> (see /zones).");
        }
        "drop" => {
            let zone: DropZone = intent.arg_str("arg").unwrap_or_default().parse()?;
            match bench.drop_on(zone, Instant::now())? {
                DropOutcome::Inserted { .. } => {
                    print_sections(bench);
                    wait_for_confirmation(bench);
                }
                DropOutcome::Stale => println!("Zone {zone} no longer exists; nothing changed."),
            }
        }
        "save_image" => {
            let args = intent.arg_list("args");
            let Some(image_id) = args.first() else {
                bail!("/save_image needs an image id and an optional path");
            };
            let path = save_image(bench, image_id, args.get(1).copied(), context.out_dir)?;
            println!("Saved {}", path.display());
        }
        "export" => {
            let Some(entry) = bench.latest_document() else {
                bail!("there is no completed document yet");
            };
            let path = intent
                .arg_str("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| context.out_dir.join(format!("blog-{}.html", compact_timestamp())));
            write_text(&path, &entry.content)?;
            println!("Exported to {}", path.display());
        }
        "unknown" => {
            let command = intent.arg_str("command").unwrap_or_default();
            println!("Unknown command /{command}. Type /help.");
        }
        other => {
            tracing::debug!(action = other, "unhandled chat action");
        }
    }
    Ok(())
}

fn apply_setting(settings: &mut GenerationArgs, key: &str, raw: &str) -> Result<()> {
    let raw = raw.trim();
    match key {
        "provider" => settings.provider = raw.parse()?,
        "model" => settings.model = (!raw.is_empty()).then(|| raw.to_string()),
        "audience" => settings.audience = raw.parse()?,
        "tone" => settings.tone = raw.parse()?,
        "sections" => {
            settings.sections = raw
                .parse()
                .with_context(|| format!("section count must be a number, got `{raw}`"))?
        }
        _ => bail!("unknown setting {key}"),
    }
    Ok(())
}

fn describe_settings(settings: &GenerationArgs) -> String {
    format!(
        "provider={} model={} audience={} tone={} sections={}",
        settings.provider,
        settings.model.as_deref().unwrap_or("(default)"),
        settings.audience,
        settings.tone,
        settings.sections
    )
}

fn parse_indices(args: &[&str]) -> Result<Vec<usize>> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<usize>()
                .with_context(|| format!("`{value}` is not a section number"))
        })
        .collect()
}

fn section_lines(sections: &[Section], is_selected: impl Fn(usize) -> bool) -> Vec<String> {
    sections
        .iter()
        .map(|section| {
            format!(
                "{} [{}] {}{}",
                if is_selected(section.index) { "*" } else { " " },
                section.index,
                "  ".repeat(usize::from(section.level.saturating_sub(1))),
                section.title
            )
        })
        .collect()
}

/// Holds the prompt until the pending confirmation is due, so the flush at the top of the
/// chat loop posts it.
fn wait_for_confirmation(bench: &Workbench) -> Duration {
    let wait = bench
        .next_notice_due()
        .map(|due| due.saturating_duration_since(Instant::now()))
        .unwrap_or_default();
    std::thread::sleep(wait);
    wait
}

fn print_sections(bench: &Workbench) {
    if bench.sections().is_empty() {
        println!("The document has no sections.");
        return;
    }
    for line in section_lines(bench.sections(), |index| bench.is_selected(index)) {
        println!("{line}");
    }
}

fn save_image(bench: &Workbench, image_id: &str, path: Option<&str>, out_dir: &Path) -> Result<PathBuf> {
    let Some(image) = bench.gallery().get(image_id) else {
        bail!("image {image_id} is not in the gallery");
    };
    let Some(data) = image.base64.as_deref() else {
        bail!("image {image_id} has no inline data; download it from {}", image.url);
    };
    let bytes = BASE64
        .decode(data.trim())
        .with_context(|| format!("image {image_id} has invalid base64 data"))?;
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(|| out_dir.join(format!("{}.{}", image.id, image_extension(&image.url))));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn image_extension(url: &str) -> &'static str {
    if url.starts_with("data:image/svg") {
        "svg"
    } else if url.starts_with("data:image/jpeg") {
        "jpg"
    } else if url.starts_with("data:image/webp") {
        "webp"
    } else {
        "png"
    }
}

/// Prints each change of a streaming entry once.
#[derive(Default)]
struct ProgressPrinter {
    last: Option<(EntryPhase, String)>,
}

impl ProgressPrinter {
    fn show(&mut self, entry: &TranscriptEntry) {
        if entry.role != Role::Bot {
            return;
        }
        let snapshot = (entry.phase, entry.content.clone());
        if self.last.as_ref() == Some(&snapshot) {
            return;
        }
        match entry.phase {
            EntryPhase::Pending | EntryPhase::Streaming => {
                for line in entry.content.lines() {
                    eprintln!("  · {line}");
                }
            }
            EntryPhase::Complete => eprintln!("Done."),
            EntryPhase::Failed => {
                eprintln!("{}", entry.content);
                if let Some(detail) = &entry.error_detail {
                    tracing::warn!(error = %detail, "generation failed");
                }
            }
        }
        self.last = Some(snapshot);
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn compact_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use blogwright_contracts::document::DropZone;
    use blogwright_contracts::journal::SessionJournal;
    use blogwright_contracts::markup::HeadingScope;
    use blogwright_contracts::models::{ModelSelector, Provider, Tone};
    use blogwright_contracts::session::SessionConfig;
    use blogwright_engine::{DryrunSourcing, Workbench, CONFIRMATION_DELAY};
    use clap::Parser;

    use super::{
        apply_setting, build_request, parse_indices, save_image, section_lines,
        wait_for_confirmation, Cli, Command, GenerationArgs,
    };
    use blogwright_contracts::document::analyze_html;

    fn settings() -> GenerationArgs {
        match Cli::try_parse_from(["blogwright", "chat"]).unwrap().command {
            Command::Chat(args) => args.generation,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "blogwright",
            "insert",
            "--input",
            "post.html",
            "--url",
            "https://img/x.png",
            "--zone",
            "after-section-1",
            "--heading-levels",
            "h1-h6",
            "--dryrun-images",
        ])
        .unwrap();
        assert_eq!(cli.global.heading_levels, HeadingScope::ALL);
        assert!(cli.global.dryrun_images);
        match cli.command {
            Command::Insert(args) => assert_eq!(args.zone, DropZone::AfterSection(1)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn invalid_zone_and_levels_are_rejected() {
        assert!(Cli::try_parse_from([
            "blogwright", "insert", "--input", "a", "--url", "u", "--zone", "middle"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["blogwright", "models", "--heading-levels", "0-9"]).is_err());
    }

    #[test]
    fn chat_defaults_match_request_defaults() {
        let settings = settings();
        assert_eq!(settings.provider, Provider::Local);
        assert_eq!(settings.sections, 5);
        assert_eq!(settings.model, None);
    }

    #[test]
    fn settings_update_and_validate() {
        let mut settings = settings();
        apply_setting(&mut settings, "provider", "cloud").unwrap();
        apply_setting(&mut settings, "tone", " Persuasive ").unwrap();
        apply_setting(&mut settings, "sections", "7").unwrap();
        apply_setting(&mut settings, "model", "").unwrap();
        assert_eq!(settings.provider, Provider::Cloud);
        assert_eq!(settings.tone, Tone::Persuasive);
        assert!(apply_setting(&mut settings, "sections", "many").is_err());
        assert!(apply_setting(&mut settings, "audience", "aliens").is_err());

        let request = build_request(&settings, &ModelSelector::new(None), "Rust").unwrap();
        assert_eq!(request.model_name(), "gpt-4o-mini");
        assert_eq!(request.num_sections(), 7);

        settings.sections = 9;
        assert!(build_request(&settings, &ModelSelector::new(None), "Rust").is_err());
    }

    #[test]
    fn indices_accept_spaces_and_commas() {
        assert_eq!(parse_indices(&["0", "2,3"]).unwrap(), vec![0, 2, 3]);
        assert!(parse_indices(&["x"]).is_err());
    }

    #[test]
    fn section_lines_mark_selection_and_depth() {
        let sections = analyze_html("<h1>A</h1><h2>B</h2>", HeadingScope::default());
        let lines = section_lines(&sections, |index| index == 1);
        assert_eq!(lines, vec!["  [0] A".to_string(), "* [1]   B".to_string()]);
    }

    #[test]
    fn save_image_decodes_inline_data() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut bench = Workbench::new(
            SessionConfig::default(),
            SessionJournal::in_dir(temp.path()),
            HeadingScope::default(),
        );
        bench.search_images(&DryrunSourcing::new(), "ferris", 1)?;
        let path = save_image(&bench, "dryrun-search-ferris-0", None, temp.path())?;
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("svg"));
        assert!(std::fs::read_to_string(&path)?.starts_with("<svg"));
        assert!(save_image(&bench, "missing", None, temp.path()).is_err());
        Ok(())
    }

    #[test]
    fn drop_confirmation_is_due_after_waiting() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut bench = Workbench::new(
            SessionConfig::default(),
            SessionJournal::in_dir(temp.path()),
            HeadingScope::default(),
        );
        assert_eq!(wait_for_confirmation(&bench), Duration::ZERO);

        let id = bench.submit(&build_request(&settings(), &ModelSelector::new(None), "Rust")?)?;
        bench.ingest(
            id,
            b"data: {\"type\": \"complete\", \"blog\": \"<h1>A</h1><p>x</p>\", \"is_complete\": true}\n\n",
        )?;
        bench.finish_stream(id)?;
        bench.search_images(&DryrunSourcing::new(), "ferris", 1)?;
        bench.begin_drag("dryrun-search-ferris-0")?;
        bench.drop_on(DropZone::AfterSection(0), Instant::now())?;
        assert!(bench.flush_notices(Instant::now()).is_empty());

        let waited = wait_for_confirmation(&bench);
        assert!(waited > Duration::ZERO && waited <= CONFIRMATION_DELAY);
        assert_eq!(bench.flush_notices(Instant::now()).len(), 1);
        Ok(())
    }
}
