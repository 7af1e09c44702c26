use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::{Color, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use opm_core::{
    infer_platform, normalize_version, refresh_repository, ArchMatch, Config, Context,
    HttpFetcher, OpmError, PluginManager, Result, TrustPolicy, Verification,
};

mod args;
use args::{Cli, Commands, ConfigAction, Shell};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let result = Config::load(&config_path).and_then(|mut config| {
        if let Some(path) = &cli.plugin_path {
            config.plugin_path = path.clone();
        }
        if let Some(repo) = &cli.repo {
            config.repository.path = repo.clone();
        }
        run(cli, config, config_path)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli, config: Config, config_path: PathBuf) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Some(Commands::List) => handle_list(config),
        Some(Commands::Install {
            plugin_id,
            version,
            untrusted,
        }) => handle_install(config, &plugin_id, version.as_deref(), untrusted, quiet),
        Some(Commands::Remove { plugin_id, yes }) => handle_remove(config, &plugin_id, yes),
        Some(Commands::Update {
            plugin_id,
            dry_run,
            yes,
            untrusted,
        }) => handle_update(config, plugin_id.as_deref(), dry_run, yes, untrusted, quiet),
        Some(Commands::Available { query }) => handle_available(config, &query),
        Some(Commands::Refresh) => handle_refresh(&config, quiet),
        Some(Commands::Infer { names, release }) => {
            handle_infer(&names, release.as_deref());
            Ok(())
        }
        Some(Commands::Config { action }) => handle_config(action, config, &config_path),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "opm", &mut io::stdout());
}

fn load_manager(config: Config) -> Result<PluginManager> {
    let ctx = Context::load(config)?;
    PluginManager::new(ctx)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn download_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} Downloading [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print rows as aligned columns, colouring each column; muted rows are greyed
fn print_table(headers: &[&str], rows: &[Vec<String>], colors: &[Option<Color>], muted: &[bool]) {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .max()
                .unwrap_or(0)
                .max(h.len())
        })
        .collect();

    let header: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", h, w = *w))
        .collect();
    println!("{}", header.join("  ").bold());

    for (i, row) in rows.iter().enumerate() {
        let mute = muted.get(i).copied().unwrap_or(false);
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .zip(colors)
            .map(|((cell, w), color)| {
                let cell = format!("{:<w$}", cell, w = *w);
                match (mute, color) {
                    (true, _) => cell.bright_black().to_string(),
                    (false, Some(c)) => cell.color(*c).to_string(),
                    (false, None) => cell,
                }
            })
            .collect();
        println!("{}", cells.join("  "));
    }
}

fn handle_list(config: Config) -> Result<()> {
    let manager = load_manager(config)?;
    let installed = manager.list_installed()?;

    if installed.is_empty() {
        println!("{}", "No plugins installed".yellow());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = installed
        .iter()
        .map(|p| {
            vec![
                p.name.clone().unwrap_or_else(|| p.installed.id.clone()),
                p.author.clone().unwrap_or_default(),
                p.installed.version.clone().unwrap_or_else(|| "?".to_string()),
                p.installed.id.clone(),
            ]
        })
        .collect();
    let muted: Vec<bool> = installed
        .iter()
        .map(|p| p.name.is_none() || p.installed.version.is_none())
        .collect();

    println!("{}", "Installed Plugins".bold());
    print_table(
        &["Name", "Author", "Version", "Id"],
        &rows,
        &[
            Some(Color::Cyan),
            Some(Color::Magenta),
            Some(Color::Green),
            Some(Color::BrightBlack),
        ],
        &muted,
    );
    Ok(())
}

fn handle_install(
    config: Config,
    plugin_id: &str,
    version: Option<&str>,
    untrusted: bool,
    quiet: bool,
) -> Result<()> {
    let manager = load_manager(config)?;
    install_one(&manager, plugin_id, version, untrusted, quiet)
}

fn install_one(
    manager: &PluginManager,
    plugin_id: &str,
    version: Option<&str>,
    untrusted: bool,
    quiet: bool,
) -> Result<()> {
    if version.is_none() && !quiet {
        let newest = manager
            .repository()
            .plugin(plugin_id)?
            .resolve_version(None)?
            .version;
        println!(
            "{}",
            format!("No version specified, defaulting to newest one ({})", newest).yellow()
        );
    }

    let pb = download_bar(quiet);
    let on_progress = |done: u64, total: Option<u64>| {
        if let Some(total) = total {
            pb.set_length(total);
        }
        pb.set_position(done);
    };

    let result = manager.install(
        plugin_id,
        version,
        TrustPolicy::from_untrusted_flag(untrusted),
        Some(&on_progress),
    );
    pb.finish_and_clear();
    let outcome = result?;

    if outcome.verification == Verification::Unverified {
        println!(
            "{} No checksum for plugin found, download could not be verified (sha256 {})",
            "WARNING:".red().bold(),
            outcome.sha256.bright_black()
        );
    }
    if outcome.arch_match == ArchMatch::Fallback {
        println!(
            "{} No artifact declares this machine's architecture, installed the first one for this OS",
            "WARNING:".yellow().bold()
        );
    }

    println!(
        "{} {} {}",
        "Installed".green(),
        outcome.name,
        outcome.version.green()
    );
    if !quiet {
        println!(
            "  {} bin, {} data files -> {}",
            outcome.report.bin_files,
            outcome.report.data_files,
            outcome.report.path.display()
        );
    }
    Ok(())
}

fn handle_remove(config: Config, plugin_id: &str, yes: bool) -> Result<()> {
    let manager = load_manager(config)?;

    if !manager.state().is_present(plugin_id) {
        return Err(OpmError::NotInstalled {
            id: plugin_id.to_string(),
        });
    }

    let name = manager.display_name(plugin_id);
    if !yes && !confirm(&format!("{} {}?", "Uninstall".red(), name))? {
        println!("Aborted.");
        return Ok(());
    }

    let name = manager.uninstall(plugin_id)?;
    println!("{} {}", "Uninstalled".green(), name);
    Ok(())
}

fn handle_update(
    config: Config,
    plugin_id: Option<&str>,
    dry_run: bool,
    yes: bool,
    untrusted: bool,
    quiet: bool,
) -> Result<()> {
    let manager = load_manager(config)?;
    let updates = manager.pending_updates(plugin_id)?;

    if updates.is_empty() {
        println!("{}", "All plugins are up to date".green());
        return Ok(());
    }

    println!("{}", "Updates available:".bold());
    for update in &updates {
        println!(
            "  {} {} -> {}",
            manager.display_name(&update.id).cyan(),
            update.installed.as_deref().unwrap_or("?").bright_black(),
            update.latest.green()
        );
    }

    if dry_run {
        return Ok(());
    }
    if !yes && !confirm("Update these plugins?")? {
        println!("Aborted.");
        return Ok(());
    }

    for update in &updates {
        install_one(&manager, &update.id, Some(&update.latest), untrusted, quiet)?;
    }
    Ok(())
}

fn handle_available(config: Config, query: &str) -> Result<()> {
    let manager = load_manager(config)?;
    let available = manager.available(query);

    if available.is_empty() {
        println!(
            "{}",
            format!("No plugins available for {}", manager.context().platform).yellow()
        );
        return Ok(());
    }

    let rows: Vec<Vec<String>> = available
        .iter()
        .map(|p| {
            vec![
                p.entry.name.clone(),
                p.entry.author.clone(),
                p.latest.to_string(),
                format_timestamp(p.timestamp),
                p.installed.clone().unwrap_or_default(),
                p.id.to_string(),
            ]
        })
        .collect();

    print_table(
        &["Name", "Author", "Latest", "Published", "Installed", "Id"],
        &rows,
        &[
            Some(Color::Cyan),
            Some(Color::Magenta),
            Some(Color::Green),
            None,
            Some(Color::Yellow),
            Some(Color::BrightBlack),
        ],
        &[],
    );
    Ok(())
}

/// Show RFC 3339 timestamps as dates; anything else is shown as is
fn format_timestamp(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

fn handle_refresh(config: &Config, quiet: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.download.timeout_secs))?;
    let pb = download_bar(quiet);
    let on_progress = |done: u64, total: Option<u64>| {
        if let Some(total) = total {
            pb.set_length(total);
        }
        pb.set_position(done);
    };

    let result = refresh_repository(config, &fetcher, Some(&on_progress));
    pb.finish_and_clear();
    let (path, repository) = result?;

    println!(
        "{} {} plugins -> {}",
        "Refreshed:".green(),
        repository.plugins.len(),
        path.display()
    );
    Ok(())
}

fn handle_infer(names: &[String], release: Option<&str>) {
    let guessed = |guess: bool| {
        if guess {
            " (guessed)".yellow().to_string()
        } else {
            String::new()
        }
    };

    for name in names {
        let (os, arch) = infer_platform(name);
        let arch_list: Vec<&str> = arch.value().iter().map(|a| a.id()).collect();
        println!(
            "{}  os={}{}  arch=[{}]{}",
            name.cyan(),
            os.value().id().green(),
            guessed(os.is_guessed()),
            arch_list.join(",").green(),
            guessed(arch.is_guessed())
        );
    }

    if let Some(release) = release {
        println!(
            "{}  version={}",
            release.cyan(),
            normalize_version(release).green()
        );
    }
}

fn handle_config(action: ConfigAction, mut config: Config, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{} {}", "Config:".bold(), path.display());
            for (key, value) in config.list() {
                println!("  {} = {}", key.cyan(), value);
            }
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init => {
            Config::init(path)?;
            println!("{} {}", "Config:".green(), path.display());
        }
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => return Err(OpmError::ConfigKeyNotFound { key }),
        },
        ConfigAction::Set { key, value } => {
            // Reload so CLI overrides are not persisted
            config = Config::load(path)?;
            config.set(&key, &value)?;
            config.save(path)?;
            println!("{} {} = {}", "Set:".green(), key.cyan(), value);
        }
    }
    Ok(())
}
