use anyhow::{bail, Context};
use exvi_core::{Host, JsonStore, Mode, RopeBuffer, Session, Vi};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: exvi FILE [-c CMD]... [-m STORE.json] [-o OUT]";

#[derive(Debug, Default)]
struct Args {
    file: PathBuf,
    commands: Vec<String>,
    store: Option<PathBuf>,
    output: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut file = None;
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" => args.commands.push(iter.next().context(USAGE)?),
            "-m" => args.store = Some(iter.next().context(USAGE)?.into()),
            "-o" => args.output = Some(iter.next().context(USAGE)?.into()),
            "-h" | "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            _ if file.is_none() => file = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument: {arg}\n{USAGE}"),
        }
    }
    args.file = file.context(USAGE)?;
    Ok(args)
}

/// Runs `!` commands through the shell and prompts on the terminal.
struct Terminal;

impl Host for Terminal {
    fn mode_changed(&mut self, from: Mode, to: Mode) {
        debug!(from = from.name(), to = to.name(), "mode");
    }

    fn exec(&mut self, command: &str) -> bool {
        match process::Command::new("sh").arg("-c").arg(command).status() {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(command, error = %e, "exec failed");
                false
            }
        }
    }

    fn prompt(&mut self, name: &str, default: &str) -> Option<String> {
        eprint!("{name} [{default}]: ");
        io::stderr().flush().ok()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let line = line.trim_end_matches(['\r', '\n']);
        Some(if line.is_empty() { default } else { line }.to_string())
    }
}

/// Expands key names such as `<Esc>`, `<CR>`, `<BS>` and `<C-v>`.
fn keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('>') else {
            rest = tail;
            break;
        };
        let name = &tail[1..end];
        let key = match name.to_ascii_lowercase().as_str() {
            "esc" => Some('\x1b'),
            "cr" | "enter" => Some('\r'),
            "bs" => Some('\x08'),
            "lt" => Some('<'),
            ctrl if ctrl.len() == 3 && ctrl.starts_with("c-") => ctrl
                .chars()
                .nth(2)
                .filter(char::is_ascii_lowercase)
                .map(|c| char::from(c as u8 - b'a' + 1)),
            _ => None,
        };
        match key {
            Some(key) => {
                out.push(key);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = parse_args()?;
    let buffer = if args.file.exists() {
        RopeBuffer::from_file(&args.file).with_context(|| format!("reading {}", args.file.display()))?
    } else {
        let mut buffer = RopeBuffer::new();
        buffer.set_file_path(args.file.clone());
        buffer
    };

    let mut session = Session::new();
    let mut store = args.store.as_ref().map(JsonStore::new);
    if let Some(store) = &store {
        if !session.macros.load(store) {
            bail!("cannot load macros from {}", store.path().display());
        }
    }

    let mut vi = Vi::new(buffer);
    vi.set_host(Box::new(Terminal));
    for command in &args.commands {
        let command = keys(command);
        if !vi.command(&mut session, &command) {
            warn!(command, "command failed");
        }
    }

    if let Some(store) = &mut store {
        if !session.macros.save(store) {
            bail!("cannot save macros to {}", store.path().display());
        }
    }

    let text = vi.buffer().text();
    match &args.output {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "written");
        }
        None => io::stdout().write_all(text.as_bytes())?,
    }
    Ok(())
}
