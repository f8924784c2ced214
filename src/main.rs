mod cli;

use std::path::Path;
use std::sync::Arc;

use acmectl::{Acme, ClientConfig, MountedFs, Window};
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load(),
    };
    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&config, cli.log_level.as_deref())?;

    let mount = config.mount_point(cli.mount.as_deref());
    tracing::debug!("Using editor tree at {}", mount.display());
    let acme = Acme::new(Arc::new(MountedFs::new(mount)));

    match &cli.command {
        Command::List => {
            for info in acme.windows()? {
                let marker = if info.params.modified { '*' } else { ' ' };
                println!("{:>5}{} {}", info.params.id, marker, info.tag);
            }
        }
        Command::Namespace => {
            let namespace = config.namespace()?;
            namespace.ensure_dir()?;
            println!("{}", namespace);
        }
        Command::Info => {
            let mut win = open_window(&acme, &cli)?;
            let params = win.read_ctl()?;
            println!(
                "id {}\ntag {} chars\nbody {} chars\ndirectory {}\nmodified {}",
                params.id, params.tag_chars, params.body_chars, params.dir, params.modified
            );
        }
        Command::Addr => {
            let mut win = open_window(&acme, &cli)?;
            println!("{}", win.addr()?.to_expr());
        }
        Command::Lines => {
            let mut win = open_window(&acme, &cli)?;
            let (start, end) = win.line_number()?;
            println!("{},{}", start, end);
        }
        Command::Selection => {
            let mut win = open_window(&acme, &cli)?;
            print!("{}", win.selected()?);
        }
        Command::Tag { append } => {
            let win = open_window(&acme, &cli)?;
            match append {
                Some(text) => win.append_tag(text)?,
                None => println!("{}", win.tag()?),
            }
        }
        Command::Ctl { msg } => {
            let mut win = open_window(&acme, &cli)?;
            win.ctl(msg)?;
        }
        Command::Events { write_back } => {
            let win = open_window(&acme, &cli)?;
            print_events(&win, *write_back, config.events.queue_capacity)?;
        }
    }

    Ok(())
}

fn init_logging(config: &ClientConfig, cli_level: Option<&str>) -> Result<Option<WorkerGuard>> {
    let level = cli_level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("Invalid log level {level:?}"))?;

    match &config.logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre!("Log file has no name: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn open_window(acme: &Acme<MountedFs>, cli: &Cli) -> Result<Window<MountedFs>> {
    let id = cli
        .window
        .as_deref()
        .ok_or_else(|| eyre!("No window id: pass --window or set $winid"))?;
    Ok(acme.window(id)?)
}

fn print_events(win: &Window<MountedFs>, write_back: bool, capacity: usize) -> Result<()> {
    let mut events = win.events_with_capacity(capacity)?;
    tracing::info!("Reading events from {}", events.path());

    for event in events.iter() {
        println!("{}", event);
        if event.is_chorded() {
            let arg = events.read_chorded_argument()?;
            println!("\targument {:?} from {}", arg.text, arg.origin);
        }
        if write_back && event.can_write_back() {
            events.write_back(&event)?;
        }
    }

    events.close()?;
    Ok(())
}
