use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tryon_contracts::chat::{parse_intent, Intent, STUDIO_HELP_COMMANDS};
use tryon_contracts::events::{EventPayload, EventWriter};
use tryon_contracts::image::EncodedImage;
use tryon_contracts::models::{
    AvatarStyle, ClothingDetails, ClothingField, MeasurementField, TryOnResult, CLOTHING_FITS,
    CLOTHING_TYPES,
};
use tryon_contracts::store::PersistedStore;
use tryon_contracts::validation::{validate_measurement, MAX_CLOTHING_IMAGES};
use tryon_engine::export::export_gallery_html;
use tryon_engine::generation::check_try_on_inputs;
use tryon_engine::uploads::{read_images_parallel, read_photo};
use tryon_engine::{
    CompletionOutcome, FormStatus, GenerationDispatcher, Step, StudioConfig, StudioTab,
    TransportKind, WorkflowController, SAVED_TO_GALLERY,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "tryon",
    version,
    about = "Generate an avatar from a photo and try clothing on it"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Directory for store.json, events.jsonl and downloads.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// `gemini` or `dryrun`.
    #[arg(long, global = true)]
    transport: Option<String>,
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive studio session.
    Studio,
    Avatar(AvatarArgs),
    TryOn(TryOnArgs),
    Gallery(GalleryArgs),
}

#[derive(Debug, Args)]
struct AvatarArgs {
    #[arg(long)]
    photo: PathBuf,
    #[arg(long, default_value = "Hyperrealistic")]
    style: String,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TryOnArgs {
    #[arg(long)]
    avatar: PathBuf,
    #[arg(long, required = true, num_args = 1..)]
    clothing: Vec<PathBuf>,
    #[arg(long = "type")]
    item_type: String,
    #[arg(long)]
    material: String,
    #[arg(long)]
    fit: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    height: Option<String>,
    #[arg(long)]
    weight: Option<String>,
    #[arg(long)]
    chest: Option<String>,
    #[arg(long)]
    waist: Option<String>,
    #[arg(long)]
    hips: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
    /// Also prepend the result to the saved gallery.
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Args)]
struct GalleryArgs {
    #[command(subcommand)]
    action: GalleryCommand,
}

#[derive(Debug, Subcommand)]
enum GalleryCommand {
    List,
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplFlow {
    Continue,
    Quit,
}

const INPUT_POLL: Duration = Duration::from_millis(200);

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("tryon error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli.global)?;
    match cli.command {
        Command::Studio => run_studio(&config),
        Command::Avatar(args) => run_avatar(&config, args),
        Command::TryOn(args) => run_try_on(&config, args),
        Command::Gallery(args) => run_gallery(&config, args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TRYON_LOG")
        .unwrap_or_else(|_| "warn".into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn resolve_config(global: &GlobalArgs) -> Result<StudioConfig> {
    let mut config = StudioConfig::from_env()?;
    if let Some(dir) = global.data_dir.as_ref() {
        config.data_dir = dir.clone();
    }
    if let Some(transport) = global.transport.as_deref() {
        config.transport = transport.parse::<TransportKind>()?;
    }
    if let Some(model) = global
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
    {
        config.model = model.to_string();
    }
    Ok(config)
}

fn open_events(config: &StudioConfig) -> EventWriter {
    EventWriter::new(config.events_path(), Uuid::new_v4().to_string())
}

fn payload(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

fn run_studio(config: &StudioConfig) -> Result<i32> {
    let events = open_events(config);
    let client = config.build_client(Some(events.clone()))?;
    println!(
        "Try-on studio started ({} via {}). Type /help for commands.",
        client.model(),
        client.transport_name()
    );
    events.emit_quiet(
        "session_started",
        payload(json!({
            "model": client.model(),
            "transport": client.transport_name(),
            "data_dir": config.data_dir.to_string_lossy(),
        })),
    );

    let mut dispatcher = GenerationDispatcher::new(client);
    let mut controller =
        WorkflowController::new(PersistedStore::new(config.store_path())).with_events(events.clone());
    let downloads = config.downloads_dir();
    println!("{}", step_hint(controller.current_view()));

    let input = spawn_stdin_reader()?;
    print_prompt(&mut controller)?;
    loop {
        let handled = match input.recv_timeout(INPUT_POLL) {
            Ok(line) => {
                let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
                match handle_intent(&mut controller, &mut dispatcher, &intent, &downloads) {
                    Ok(ReplFlow::Continue) => {}
                    Ok(ReplFlow::Quit) => break,
                    Err(err) => println!("{err:#}"),
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => false,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        let reported = drain_completions(&mut controller, &mut dispatcher);
        if handled || reported > 0 {
            print_prompt(&mut controller)?;
        }
    }
    if dispatcher.outstanding() > 0 {
        debug!(outstanding = dispatcher.outstanding(), "session ended with requests in flight");
    }

    events.emit_quiet(
        "session_finished",
        payload(json!({ "saved": controller.gallery().len() })),
    );
    Ok(0)
}

fn handle_intent(
    controller: &mut WorkflowController,
    dispatcher: &mut GenerationDispatcher,
    intent: &Intent,
    downloads: &Path,
) -> Result<ReplFlow> {
    match intent.action.as_str() {
        "noop" => {}
        "help" => println!("Commands: {}", STUDIO_HELP_COMMANDS.join(" ")),
        "quit" => return Ok(ReplFlow::Quit),
        "status" => {
            controller.current_view();
            for line in status_lines(controller) {
                println!("{line}");
            }
        }
        "start" => {
            controller.start()?;
            println!("{}", step_hint(controller.step()));
        }
        "set_photo" => {
            let Some(path) = intent.str_arg("path") else {
                bail!("/photo requires a path");
            };
            let photo = read_photo(Path::new(path))?;
            controller.set_photo(photo)?;
            println!("Photo set to {path}");
        }
        "set_style" => {
            let Some(raw) = intent.str_arg("style") else {
                println!("Styles: {}", style_list());
                return Ok(ReplFlow::Continue);
            };
            let style = raw.parse::<AvatarStyle>()?;
            controller.set_style(style)?;
            println!("Style set to {style}");
        }
        "generate_avatar" => {
            let job = controller.submit_avatar()?;
            println!("Generating your unique avatar... This may take a moment.");
            dispatcher.dispatch(job);
        }
        "add_clothing" => {
            let paths: Vec<PathBuf> = intent.paths_arg().into_iter().map(PathBuf::from).collect();
            if paths.is_empty() {
                bail!("/clothing requires one or more image paths");
            }
            let allocation = controller.clothing_slots_for(paths.len())?;
            let images = if allocation.accepted == 0 {
                Vec::new()
            } else {
                read_images_parallel(&paths[..allocation.accepted])?
            };
            let allocation = controller.accept_clothing_images(allocation, images)?;
            if let Some(message) = allocation.message.as_deref() {
                println!("{message}");
            }
            println!(
                "Clothing images: {} of {MAX_CLOTHING_IMAGES}.",
                controller.try_on_form().clothing_images.len()
            );
        }
        "remove_clothing" => {
            let Some(index) = intent.command_args.get("index").and_then(Value::as_u64) else {
                bail!("/remove requires an image number, starting at 1");
            };
            controller.remove_clothing_image(index as usize)?;
            println!("Removed clothing image #{}.", index + 1);
        }
        "set_clothing_detail" => {
            let field = intent
                .str_arg("field")
                .unwrap_or_default()
                .parse::<ClothingField>()?;
            let value = intent.str_arg("value").unwrap_or_default();
            controller.set_clothing_detail(field, value)?;
            println!("{} set to {}", field.label(), or_placeholder(value));
        }
        "set_measurement" => {
            let field = intent
                .str_arg("field")
                .unwrap_or_default()
                .parse::<MeasurementField>()?;
            let value = intent.str_arg("value").unwrap_or_default();
            controller.set_measurement(field, value)?;
            if value.is_empty() {
                println!("{} cleared", field.label());
            } else {
                println!("{} set to {value} {}", field.label(), field.unit());
            }
        }
        "try_on" => {
            let job = controller.submit_try_on()?;
            println!("Dressing your avatar... This may take a moment.");
            dispatcher.dispatch(job);
        }
        "save_result" => println!("{}", controller.save_current_result()?),
        "download" => {
            let dir = intent
                .str_arg("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| downloads.to_path_buf());
            let path = controller.download_current_result(&dir)?;
            println!("Downloaded to {}", path.display());
        }
        "clear_try_on" => {
            controller.clear_try_on()?;
            println!("Try-on form cleared. Measurements were kept.");
        }
        "show_gallery" => {
            controller.switch_tab(StudioTab::Gallery)?;
            for line in gallery_lines(controller.gallery()) {
                println!("{line}");
            }
        }
        "show_try_on" => {
            controller.switch_tab(StudioTab::TryOn)?;
            println!("{}", step_hint(controller.step()));
        }
        "create_new_avatar" => {
            controller.create_new_avatar()?;
            println!("{}", step_hint(controller.step()));
        }
        "start_over" => {
            controller.start_over();
            println!("Started over. Your gallery and measurements are kept.");
        }
        _ => println!("Unknown command. Type /help for commands."),
    }
    Ok(ReplFlow::Continue)
}

fn print_prompt(controller: &mut WorkflowController) -> Result<()> {
    print!("[{}] > ", controller.current_view().label());
    io::stdout().flush()?;
    Ok(())
}

/// Feeds stdin lines to the session loop so generation results can be
/// reported while the user is still typing.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("tryon-stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line.clone()).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!(error = %err, "stdin read failed");
                        break;
                    }
                }
            }
        })
        .context("failed to start stdin reader")?;
    Ok(rx)
}

/// Applies every completion that has already arrived. Never waits.
fn drain_completions(
    controller: &mut WorkflowController,
    dispatcher: &mut GenerationDispatcher,
) -> usize {
    let mut reported = 0;
    while let Some(completion) = dispatcher.try_next() {
        let outcome = controller.apply_completion(completion);
        if report_completion(controller, outcome) {
            reported += 1;
        }
    }
    reported
}

/// Prints what a completion did. Returns false for discarded results.
fn report_completion(controller: &WorkflowController, outcome: CompletionOutcome) -> bool {
    match outcome {
        CompletionOutcome::AvatarReady => {
            println!();
            println!("Your avatar is ready.");
            println!("{}", step_hint(controller.step()));
        }
        CompletionOutcome::TryOnReady => {
            println!();
            println!("Your new look is ready. /save keeps it, /download writes it to disk.");
        }
        CompletionOutcome::Failed(err) => {
            println!();
            println!("{err}");
        }
        CompletionOutcome::Discarded => {
            debug!("late completion ignored");
            return false;
        }
    }
    true
}

fn step_hint(step: Step) -> String {
    match step {
        Step::Landing => "Type /start to create your avatar.".to_string(),
        Step::AvatarGenerator => format!(
            "Upload a clear, front-facing photo with /photo <path>, pick a /style ({}), then /generate.",
            style_list()
        ),
        Step::Studio(StudioTab::TryOn) => format!(
            "Add up to {MAX_CLOTHING_IMAGES} clothing images with /clothing <paths>, set /type ({}), /fit ({}), /material, /height and /weight, then /tryon.",
            CLOTHING_TYPES.join(", "),
            CLOTHING_FITS.join(", ")
        ),
        Step::Studio(StudioTab::Gallery) => {
            "Viewing the gallery. /studio returns to the try-on form.".to_string()
        }
    }
}

fn style_list() -> String {
    AvatarStyle::ALL
        .iter()
        .map(|style| style.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn or_placeholder(value: &str) -> &str {
    if value.is_empty() {
        "(empty)"
    } else {
        value
    }
}

fn status_label(status: FormStatus) -> &'static str {
    match status {
        FormStatus::Idle => "idle",
        FormStatus::InFlight(_) => "in progress",
        FormStatus::Failed => "failed",
    }
}

fn status_lines(controller: &WorkflowController) -> Vec<String> {
    let mut lines = vec![format!("Step: {}", controller.step().label())];
    match controller.step() {
        Step::Landing => {}
        Step::AvatarGenerator => {
            let form = controller.avatar_form();
            lines.push(format!(
                "Photo: {}",
                form.photo
                    .as_ref()
                    .map(|photo| photo.media_type().to_string())
                    .unwrap_or_else(|| "none".to_string())
            ));
            lines.push(format!("Style: {}", form.style));
            lines.push(format!("Request: {}", status_label(form.status)));
            if let Some(error) = form.error.as_deref() {
                lines.push(format!("Error: {error}"));
            }
        }
        Step::Studio(_) => {
            let form = controller.try_on_form();
            lines.push(format!(
                "Clothing images: {} of {MAX_CLOTHING_IMAGES}",
                form.clothing_images.len()
            ));
            for field in [
                ClothingField::ItemType,
                ClothingField::Material,
                ClothingField::Fit,
                ClothingField::Description,
            ] {
                lines.push(format!(
                    "{}: {}",
                    field.label(),
                    or_placeholder(form.details.get(field))
                ));
            }
            lines.extend(controller.measurements().lines("N/A"));
            lines.push(format!("Request: {}", status_label(form.status)));
            lines.push(format!(
                "Result: {}",
                if form.final_image.is_some() { "ready" } else { "none" }
            ));
            if let Some(error) = form.error.as_deref() {
                lines.push(format!("Error: {error}"));
            }
        }
    }
    lines.push(format!("Gallery: {} saved look(s)", controller.gallery().len()));
    lines
}

fn gallery_lines(gallery: &[TryOnResult]) -> Vec<String> {
    if gallery.is_empty() {
        return vec![
            "Your Gallery is Empty".to_string(),
            "You haven't saved any looks yet. Go to the Try-On Studio to create and save your first outfit!"
                .to_string(),
        ];
    }
    let mut lines = Vec::new();
    for (idx, result) in gallery.iter().enumerate() {
        let title = if result.clothing_details.item_type.trim().is_empty() {
            "Clothing Item"
        } else {
            result.clothing_details.item_type.as_str()
        };
        lines.push(format!("{}. {title} | {}", idx + 1, result.headline()));
        if !result.clothing_details.description.trim().is_empty() {
            lines.push(format!("   \"{}\"", result.clothing_details.description));
        }
        lines.push(format!(
            "   {} clothing image(s), saved on {}",
            result.clothing_images.len(),
            result.timestamp
        ));
        lines.push(format!("   {}", result.measurements.lines("N/A").join(", ")));
    }
    lines
}

fn write_image(image: &EncodedImage, out_path: &Path) -> Result<()> {
    let bytes = image.decode_bytes()?;
    if let Some(parent) = out_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(out_path, bytes).with_context(|| format!("failed to write {}", out_path.display()))?;
    Ok(())
}

fn default_output(config: &StudioConfig, stem: &str, image: &EncodedImage) -> PathBuf {
    config.downloads_dir().join(format!(
        "{stem}-{}.{}",
        Utc::now().timestamp_millis(),
        image.file_extension()
    ))
}

fn run_avatar(config: &StudioConfig, args: AvatarArgs) -> Result<i32> {
    let style = args.style.parse::<AvatarStyle>()?;
    let photo = read_photo(&args.photo)?;
    let client = config.build_client(Some(open_events(config)))?;
    let avatar = client.generate_avatar(&photo, style)?;
    let out_path = args
        .out
        .unwrap_or_else(|| default_output(config, "avatar", &avatar));
    write_image(&avatar, &out_path)?;
    println!("Avatar written to {}", out_path.display());
    Ok(0)
}

fn run_try_on(config: &StudioConfig, args: TryOnArgs) -> Result<i32> {
    let store = PersistedStore::new(config.store_path());
    let mut measurements = store.load_measurements();
    let overrides = [
        (MeasurementField::Height, &args.height),
        (MeasurementField::Weight, &args.weight),
        (MeasurementField::Chest, &args.chest),
        (MeasurementField::Waist, &args.waist),
        (MeasurementField::Hips, &args.hips),
    ];
    let mut changed = false;
    for (field, value) in overrides {
        if let Some(value) = value {
            validate_measurement(field, value)?;
            measurements.set(field, value.as_str());
            changed = true;
        }
    }
    if changed {
        store.save_measurements(&measurements);
    }

    let details = ClothingDetails {
        item_type: args.item_type.trim().to_string(),
        material: args.material.trim().to_string(),
        fit: args.fit.trim().to_string(),
        description: args.description.trim().to_string(),
    };
    let avatar = read_photo(&args.avatar)?;
    let clothing = read_images_parallel(&args.clothing)?;
    check_try_on_inputs(&clothing, &details, &measurements)?;

    let client = config.build_client(Some(open_events(config)))?;
    let look = client.perform_try_on(&avatar, &clothing, &details, &measurements)?;
    let out_path = args
        .out
        .unwrap_or_else(|| default_output(config, "try-on-result", &look));
    write_image(&look, &out_path)?;
    println!("Try-on result written to {}", out_path.display());

    if args.save {
        let mut gallery = store.load_gallery();
        gallery.insert(
            0,
            TryOnResult::new(look, avatar, clothing, details, measurements, Utc::now()),
        );
        store.save_gallery(&gallery);
        println!("{SAVED_TO_GALLERY}");
    }
    Ok(0)
}

fn run_gallery(config: &StudioConfig, args: GalleryArgs) -> Result<i32> {
    let store = PersistedStore::new(config.store_path());
    let gallery = store.load_gallery();
    match args.action {
        GalleryCommand::List => {
            for line in gallery_lines(&gallery) {
                println!("{line}");
            }
        }
        GalleryCommand::Export { out } => {
            export_gallery_html(&gallery, &out)?;
            println!("Exported {} look(s) to {}", gallery.len(), out.display());
        }
    }
    Ok(0)
}
