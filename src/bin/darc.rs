/// Interactive console for copying files between disk images, archives and host directories

use diskarc::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::collections::BTreeMap;
use std::path::PathBuf;

type Console = Editor<CommandCompleter, DefaultHistory>;

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "copy", "exit", "extract", "help", "host", "ls", "new", "quit", "rm", "sample",
                "set", "slots",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only complete the first word (command name)
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// What to do when a file already exists at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictPolicy {
    Ask,
    Skip,
    Overwrite,
    Cancel,
}

/// Console settings changed with `set`
#[derive(Debug, Clone, Copy)]
struct Settings {
    options: TransferOptions,
    conflict: ConflictPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            options: TransferOptions::default().preserve(PreserveMode::Naps),
            conflict: ConflictPolicy::Ask,
        }
    }
}

/// Prints progress and resolves collisions according to the conflict policy
struct ConsoleHandler<'r> {
    policy: ConflictPolicy,
    rl: &'r mut Console,
}

impl TransferHandler for ConsoleHandler<'_> {
    fn handle(&mut self, facts: &CallbackFacts) -> CallbackResult {
        match facts {
            CallbackFacts::Progress {
                orig_path,
                new_path,
                percent,
                part,
                ..
            } => {
                println!("{:3}% {} -> {} ({})", percent, orig_path, new_path, part);
                CallbackResult::Skip
            }
            CallbackFacts::ResourceForkIgnored { path, .. } => {
                println!("     {}: resource fork ignored", path);
                CallbackResult::Skip
            }
            CallbackFacts::FileNameExists { path, .. } => match self.policy {
                ConflictPolicy::Skip => CallbackResult::Skip,
                ConflictPolicy::Overwrite => CallbackResult::Overwrite,
                ConflictPolicy::Cancel => CallbackResult::Cancel,
                ConflictPolicy::Ask => self.ask(path),
            },
        }
    }
}

impl ConsoleHandler<'_> {
    fn ask(&mut self, path: &str) -> CallbackResult {
        let prompt = format!("'{}' exists: [o]verwrite, [s]kip, [a]ll, [c]ancel? ", path);
        loop {
            let answer = match self.rl.readline(&prompt) {
                Ok(line) => line.trim().to_lowercase(),
                Err(_) => return CallbackResult::Cancel,
            };
            match answer.as_str() {
                "o" | "overwrite" => return CallbackResult::Overwrite,
                "s" | "skip" => return CallbackResult::Skip,
                "a" | "all" => {
                    self.policy = ConflictPolicy::Overwrite;
                    return CallbackResult::Overwrite;
                }
                "c" | "cancel" => return CallbackResult::Cancel,
                _ => println!("Please answer o, s, a or c"),
            }
        }
    }
}

/// Get the path to the history file
fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".diskarc_history");
        p
    })
}

/// Log to a daily file under the user's cache directory
fn init_logging() {
    let Some(cache_dir) = dirs::cache_dir() else {
        return;
    };
    let logfile = tracing_appender::rolling::daily(cache_dir.join("diskarc").join("logs"), "log");
    tracing_subscriber::fmt()
        .compact()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logfile)
        .init();
}

fn main() {
    init_logging();
    tracing::debug!("starting console");

    println!("=== diskarc ===");
    println!("Interactive console for copying files between disk images and archives.");
    println!("Type 'help' for available commands\n");

    let mut rl: Console = match Editor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Failed to create editor: {}", err);
            return;
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    // Load history if available
    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    let mut slots: BTreeMap<String, Box<dyn Container>> = BTreeMap::new();
    let mut settings = Settings::default();

    loop {
        let readline = rl.readline("> ");
        let input = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Add to history
        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();
        let args: Vec<&str> = parts[1..].iter().map(String::as_str).collect();

        match command.as_str() {
            "help" => print_help(),
            "quit" | "exit" => break,
            "new" | "sample" => {
                if args.len() < 2 {
                    println!("Usage: {} <slot> <prodos|hfs|dos|pascal|cpm|nufx|zip> [name]", command);
                    continue;
                }
                let name = args.get(2).copied().unwrap_or("NEW.DISK");
                match create_container(args[1], name, command == "sample") {
                    Ok(container) => {
                        println!("{}: new {} container", args[0], container.characteristics().name);
                        slots.insert(args[0].to_string(), container);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "host" => {
                if args.len() < 2 {
                    println!("Usage: host <slot> <directory> [xattr]");
                    continue;
                }
                let xattr = args.get(2).is_some_and(|a| *a == "xattr");
                match HostDir::open(args[1]).and_then(|h| h.with_extended_attributes(xattr)) {
                    Ok(host) => {
                        println!("{}: {}", args[0], host.root_path().display());
                        slots.insert(args[0].to_string(), Box::new(host));
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "slots" => {
                for (name, container) in &slots {
                    let chars = container.characteristics();
                    let flags = if container.is_read_only() { " (read-only)" } else { "" };
                    println!("{:<10} {:<8}{}", name, chars.name, flags);
                }
            }
            "ls" => {
                let Some(container) = args.first().and_then(|s| slots.get(*s)) else {
                    println!("Usage: ls <slot>");
                    continue;
                };
                if let Err(e) = list_entries(&**container) {
                    println!("Error: {}", e);
                }
            }
            "copy" | "extract" => {
                if args.len() < 2 {
                    println!("Usage: {} <from-slot> <to-slot> [from-path] [to-dir]", command);
                    continue;
                }
                if args[0] == args[1] {
                    println!("Source and destination must differ");
                    continue;
                }
                let Some(mut dest) = slots.remove(args[1]) else {
                    println!("Unknown slot: {}", args[1]);
                    continue;
                };
                let Some(source) = slots.get(args[0]) else {
                    println!("Unknown slot: {}", args[0]);
                    slots.insert(args[1].to_string(), dest);
                    continue;
                };
                let mut handler = ConsoleHandler {
                    policy: settings.conflict,
                    rl: &mut rl,
                };
                let result = run_transfer(
                    &**source,
                    &mut *dest,
                    &settings,
                    &mut handler,
                    args.get(2).copied(),
                    args.get(3).copied(),
                    command == "extract",
                );
                slots.insert(args[1].to_string(), dest);
                match result {
                    Ok(TransferOutcome::Completed) => println!("Done"),
                    Ok(TransferOutcome::Cancelled) => println!("Cancelled"),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "rm" => {
                if args.len() < 2 {
                    println!("Usage: rm <slot> <path>");
                    continue;
                }
                let Some(container) = slots.get_mut(args[0]) else {
                    println!("Unknown slot");
                    continue;
                };
                let result = find_by_path(&**container, args[1], '/')
                    .and_then(|id| container.delete_entry(id));
                if let Err(e) = result {
                    println!("Error: {}", e);
                }
            }
            "set" => {
                if args.len() < 2 {
                    print_settings(&settings);
                    continue;
                }
                if let Err(msg) = apply_setting(&mut settings, args[0], args[1]) {
                    println!("{}", msg);
                }
            }
            _ => {
                println!("Unknown command: {}", command);
                println!("Type 'help' for available commands");
            }
        }
    }

    // Save history before exiting
    if let Some(history_path) = history_path() {
        let _ = rl.save_history(&history_path);
    }
    tracing::debug!("closing console");
    println!("Goodbye!");
}

fn create_container(format: &str, name: &str, sample: bool) -> Result<Box<dyn Container>> {
    let archive = match format.to_lowercase().as_str() {
        "nufx" | "shk" => Some(ArchiveKind::NuFx),
        "zip" => Some(ArchiveKind::Zip),
        _ => None,
    };
    if let Some(kind) = archive {
        let arc = if sample {
            sample::sample_archive(kind)?
        } else {
            MemArchive::new(kind)
        };
        return Ok(Box::new(arc));
    }

    let profile = FsProfile::from_name(format)
        .ok_or_else(|| DiskArcError::unsupported(format!("unknown format '{}'", format)))?;
    let mut fs = MemFileSystem::new(profile, name);
    if sample {
        sample::populate(&mut fs)?;
    }
    Ok(Box::new(fs))
}

/// Copy from `source` to `dest`. `from` selects a directory to reroot at or a
/// single file; `to` selects the destination directory.
fn run_transfer(
    source: &dyn Container,
    dest: &mut dyn Container,
    settings: &Settings,
    handler: &mut dyn TransferHandler,
    from: Option<&str>,
    to: Option<&str>,
    foreign: bool,
) -> Result<TransferOutcome> {
    let mut options = settings.options;
    let (entries, reroot) = match from.filter(|p| *p != "/") {
        Some(path) => {
            let id = find_by_path(source, path, '/')?;
            if source.entry(id)?.is_directory() {
                (walk_entries(source, id)?, Some(id))
            } else {
                options.strip_paths = true;
                (vec![id], None)
            }
        }
        None => (walk_entries(source, EntryId::ROOT)?, None),
    };
    let target = match to.filter(|p| *p != "/") {
        Some(path) => Some(find_by_path(dest, path, '/')?),
        None => None,
    };

    let set = build(source, &entries, reroot, &options);
    let list = if foreign {
        set.foreign_entries()
    } else {
        set.direct_entries()
    };
    let mut streams = ContainerStreamSource::new(source);
    TransferWorker::new(options, handler, &mut streams).transfer(dest, target, list)
}

fn list_entries(container: &dyn Container) -> Result<()> {
    println!(
        "{:<40} {:>4} {:>6} {:>8} {:>8} {:<16}",
        "Name", "Type", "Aux", "Data", "Rsrc", "Modified"
    );
    println!("{}", "-".repeat(87));
    let mut count = 0;
    for id in walk_entries(container, EntryId::ROOT)? {
        let entry = container.entry(id)?;
        let attribs = &entry.attribs;
        let length = |len: Option<u64>| len.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
        let modified = attribs
            .mod_when
            .map(|when| when.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let name = if entry.is_directory() {
            format!("{}{}", entry.full_path(), attribs.path_sep)
        } else {
            entry.full_path().to_string()
        };
        let flag = if entry.is_damaged { "!" } else { "" };
        println!(
            "{:<40} ${:02X} ${:04X} {:>8} {:>8} {:<16}{}",
            name,
            attribs.file_type,
            attribs.aux_type,
            length(attribs.data_length()),
            length(attribs.rsrc_length()),
            modified,
            flag
        );
        count += 1;
    }
    println!("\n{} entries", count);
    Ok(())
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> std::result::Result<(), String> {
    let flag = || match value {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(format!("Expected on/off, got '{}'", value)),
    };
    match key {
        "preserve" => {
            settings.options.preserve = match value {
                "none" => PreserveMode::None,
                "naps" => PreserveMode::Naps,
                "host" => PreserveMode::Host,
                _ => return Err("Usage: set preserve <none|naps|host>".to_string()),
            }
        }
        "raw" => settings.options.raw_mode = flag()?,
        "strip" => settings.options.strip_paths = flag()?,
        "maczip" => settings.options.mac_zip = flag()?,
        "conflict" => {
            settings.conflict = match value {
                "ask" => ConflictPolicy::Ask,
                "skip" => ConflictPolicy::Skip,
                "overwrite" => ConflictPolicy::Overwrite,
                "cancel" => ConflictPolicy::Cancel,
                _ => return Err("Usage: set conflict <ask|skip|overwrite|cancel>".to_string()),
            }
        }
        _ => return Err(format!("Unknown setting: {}", key)),
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    let on_off = |b: bool| if b { "on" } else { "off" };
    println!("preserve  {:?}", settings.options.preserve);
    println!("raw       {}", on_off(settings.options.raw_mode));
    println!("strip     {}", on_off(settings.options.strip_paths));
    println!("maczip    {}", on_off(settings.options.mac_zip));
    println!("conflict  {:?}", settings.conflict);
}

fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(current.clone());
                    current.clear();
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn print_help() {
    println!("Available commands:");
    println!("  new <slot> <format> [name]     - Create an empty volume or archive");
    println!("                                   (prodos, hfs, dos, pascal, cpm, nufx, zip)");
    println!("  sample <slot> <format>         - Create a volume or archive holding sample files");
    println!("  host <slot> <directory> [xattr] - Use a host directory (use quotes for paths with spaces);");
    println!("                                   xattr keeps forks and types in extended attributes");
    println!("  slots                          - List open containers");
    println!("  ls <slot>                      - List all entries");
    println!("  copy <from> <to> [path] [dir]  - Copy files, keeping types and forks");
    println!("                                   (path: directory to reroot at, or a single file)");
    println!("  extract <from> <to> [path] [dir] - Copy to a destination without type support");
    println!("  rm <slot> <path>               - Delete an entry");
    println!("  set [<option> <value>]         - Show or change settings:");
    println!("                                   preserve none|naps|host, raw/strip/maczip on|off,");
    println!("                                   conflict ask|skip|overwrite|cancel");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}
