//! Headless mode for the logbook driver.
//!
//! Simple line-oriented protocol:
//! - Lines starting with `#` are commands (status, revert, mount, ...)
//! - Any other line is appended to the mounted logbook as an entry

use nova_core::persist::{export_to_dir, export_file_name};
use nova_core::{EntryInput, InitOutcome, ManagerConfig, SaveManager, SaveStatus};
use std::io::{self, BufRead, Write};

/// Run the driver until `#quit` or end of input.
pub async fn run_headless(mut manager: SaveManager) -> anyhow::Result<()> {
    println!("=== Aqua Nova Logbook ===");
    match manager.initialize().await {
        InitOutcome::Loaded { name } => println!("[LOADED] {name}"),
        InitOutcome::Bootstrapped { name } => println!("[BOOTSTRAPPED] {name}"),
        InitOutcome::RequiresImport { reason } => {
            println!("[IMPORT REQUIRED] {reason}");
            println!("  Use #import <path> then #mount <index>, or #fresh <name>.");
        }
    }
    print_status(&manager);
    println!();
    println!("Enter log entries (one per line), or #help for commands:");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let (name, rest) = command
                .split_once(char::is_whitespace)
                .map(|(n, r)| (n, r.trim()))
                .unwrap_or((command, ""));

            if matches!(name, "quit" | "exit") {
                println!("Goodbye!");
                break;
            }
            run_command(&mut manager, name, rest).await;
            stdout.flush().ok();
            continue;
        }

        match manager.append_entry(EntryInput::new(line)).await {
            Ok(entry) => {
                println!("[LOGGED] {}", entry.id);
                report_save(&manager);
            }
            Err(e) => println!("[ERROR] {e}"),
        }
    }

    manager.shutdown().await?;
    Ok(())
}

async fn run_command(manager: &mut SaveManager, name: &str, rest: &str) {
    match name {
        "status" => print_status(manager),
        "entries" => match manager.mounted() {
            Some(logbook) => {
                println!("[ENTRIES] {}", logbook.name);
                for entry in &logbook.entries {
                    let revert = if entry.metadata.can_revert { "" } else { " (locked)" };
                    println!("  {} {} [{}]{revert}", entry.id, entry.timestamp, entry.entry_type);
                    println!("      {}", entry.content);
                }
            }
            None => println!("[ERROR] No logbook is mounted"),
        },
        "log" => {
            if rest.is_empty() {
                println!("[ERROR] Usage: #log <text> [+tag ...]");
                return;
            }
            let (tags, words): (Vec<&str>, Vec<&str>) =
                rest.split_whitespace().partition(|w| w.starts_with('+'));
            let mut input = EntryInput::new(words.join(" "));
            for tag in tags {
                input = input.with_tag(tag.trim_start_matches('+'));
            }
            match manager.append_entry(input).await {
                Ok(entry) => {
                    println!("[LOGGED] {}", entry.id);
                    report_save(manager);
                }
                Err(e) => println!("[ERROR] {e}"),
            }
        }
        "revert" => {
            if rest.is_empty() {
                println!("[ERROR] Usage: #revert <entry-id>");
                return;
            }
            match manager.revert_to(rest).await {
                Ok(()) => {
                    let remaining = manager.mounted().map_or(0, |l| l.entries.len());
                    println!("[REVERTED] to {rest}; {remaining} entries remain");
                    report_save(manager);
                }
                Err(e) => println!("[ERROR] Revert failed: {e}"),
            }
        }
        "books" => {
            println!("[BOOKSHELF]");
            let cursor = manager.bookshelf().current_index();
            for (i, book) in manager.bookshelf().books().iter().enumerate() {
                let marker = if i == cursor { ">" } else { " " };
                let mounted = if book.mounted { " (mounted)" } else { "" };
                println!(
                    "  {marker}{i}: {} - {} entries{mounted}",
                    book.name, book.statistics.total_entries
                );
            }
        }
        "next" => {
            manager.next_book();
            print_cursor(manager);
        }
        "prev" => {
            manager.prev_book();
            print_cursor(manager);
        }
        "mount" => {
            let result = if rest.is_empty() {
                manager.mount_current().await
            } else {
                match rest.parse::<usize>() {
                    Ok(index) => manager.mount(index).await,
                    Err(_) => {
                        println!("[ERROR] Usage: #mount [index]");
                        return;
                    }
                }
            };
            match result {
                Ok(()) => {
                    println!("[MOUNTED] {}", manager.mounted().map_or("", |l| l.name.as_str()));
                    report_save(manager);
                }
                Err(e) => println!("[ERROR] Mount failed: {e}"),
            }
        }
        "fresh" => {
            let name = if rest.is_empty() { "New Logbook" } else { rest };
            match manager.start_fresh(name).await {
                Ok(index) => println!("[FRESH] Mounted new logbook at {index}"),
                Err(e) => println!("[ERROR] {e}"),
            }
        }
        "export" => {
            let Some(logbook) = manager.mounted() else {
                println!("[ERROR] No logbook is mounted");
                return;
            };
            let dir = if rest.is_empty() { "." } else { rest };
            match export_to_dir(logbook, dir).await {
                Ok(path) => println!("[EXPORTED] {}", path.display()),
                Err(e) => println!(
                    "[ERROR] Export of {} failed: {e}",
                    export_file_name(logbook)
                ),
            }
        }
        "import" => {
            if rest.is_empty() {
                println!("[ERROR] Usage: #import <path>");
                return;
            }
            let content = match tokio::fs::read_to_string(rest).await {
                Ok(c) => c,
                Err(e) => {
                    println!("[ERROR] Could not read {rest}: {e}");
                    return;
                }
            };
            match manager.import_file(&content).await {
                Ok(index) => {
                    let name = manager.bookshelf().get(index).map_or("", |l| l.name.as_str());
                    println!("[IMPORTED] {name} at index {index}");
                }
                Err(e) => println!("[ERROR] Import failed: {e}"),
            }
        }
        "get" => match manager.store().get(rest) {
            Some(value) => println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            ),
            None => println!("(absent)"),
        },
        "set" => {
            let Some((path, raw)) = rest.split_once(char::is_whitespace) else {
                println!("[ERROR] Usage: #set <path> <json>");
                return;
            };
            // Bare words are taken as strings.
            let value = serde_json::from_str(raw.trim())
                .unwrap_or_else(|_| serde_json::Value::String(raw.trim().to_string()));
            manager.store_mut().set(path, value);
            println!("[SET] {path}");
        }
        "contacts" => match manager.reload_contacts().await {
            Ok(()) => println!("[CONTACTS] Reconciled contact definitions"),
            Err(e) => println!("[ERROR] {e}"),
        },
        "save" => match manager.save_all().await {
            Ok(()) => println!("[SAVED]"),
            Err(e) => println!("[ERROR] Save failed: {e}"),
        },
        "help" => print_help(),
        _ => println!("[ERROR] Unknown command. Type #help for help."),
    }
}

fn print_status(manager: &SaveManager) {
    println!("[STATUS]");
    match manager.mounted() {
        Some(logbook) => {
            println!("  Logbook: {}", logbook.name);
            println!("  Entries: {}", logbook.statistics.total_entries);
            if let Some(latest) = logbook.latest_entry() {
                println!("  Latest: {} at {}", latest.id, latest.timestamp);
            }
        }
        None => println!("  Logbook: (none mounted)"),
    }
    println!("  Bookshelf: {} logbook(s)", manager.bookshelf().len());
    println!("  Requires import: {}", manager.requires_import());
    if let Some(depth) = manager.store().get("navigation.depth") {
        println!("  Depth: {depth}m");
    }
}

fn print_cursor(manager: &SaveManager) {
    let shelf = manager.bookshelf();
    match shelf.current() {
        Some(book) => println!("[BOOK {}] {}", shelf.current_index(), book.name),
        None => println!("[BOOKSHELF] empty"),
    }
}

fn report_save(manager: &SaveManager) {
    if let SaveStatus::Failed(reason) = manager.last_save() {
        println!("[WARNING] Not saved to disk: {reason}");
    }
}

fn print_help() {
    println!("[HELP]");
    println!("  #status             - Show logbook and bookshelf status");
    println!("  #entries            - List entries in the mounted logbook");
    println!("  #log <text> [+tag]  - Append an entry with tags");
    println!("  #revert <id>        - Rewind to an entry, discarding later ones");
    println!("  #books              - List the bookshelf");
    println!("  #next / #prev       - Move the bookshelf cursor");
    println!("  #mount [index]      - Mount a logbook (default: cursor)");
    println!("  #fresh [name]       - Start a new empty logbook");
    println!("  #export [dir]       - Export the mounted logbook");
    println!("  #import <path>      - Import a logbook file");
    println!("  #get <path>         - Read a state value");
    println!("  #set <path> <json>  - Write a state value");
    println!("  #contacts           - Reconcile contact definitions");
    println!("  #save               - Save now");
    println!("  #quit               - Exit");
    println!("  (anything else is logged as an entry)");
}

/// Apply command-line overrides to `config`.
pub fn parse_config_from_args(mut config: ManagerConfig, args: &[String]) -> ManagerConfig {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--storage" => {
                if let Some(dir) = args.get(i + 1) {
                    config.storage_dir = dir.into();
                    i += 1;
                }
            }
            "--content" => {
                if let Some(root) = args.get(i + 1) {
                    config.content_root = root.clone();
                    i += 1;
                }
            }
            "--bootstrap" => {
                if let Some(name) = args.get(i + 1) {
                    config.bootstrap_resource = name.clone();
                    i += 1;
                }
            }
            "--contacts" => {
                if let Some(name) = args.get(i + 1) {
                    config.contacts_resource = name.clone();
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    config
}
