use std::{
    env, fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use pure_compose::{ComposerConfig, ContentFlags, EditorSession, Mode, interop};

const USAGE: &str = "Usage: pure-compose [--width N] [--quote] [--plain] [--no-magic-links] \
    [--signature FILE] [--top-signature] [--output html|plain|ftml|markdown] [<file>]";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocumentFormat {
    Html,
    Ftml,
    Markdown,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("md") | Some("markdown") | Some("mkd") | Some("mdown") | Some("mdtxt") => {
                DocumentFormat::Markdown
            }
            Some("ftml") => DocumentFormat::Ftml,
            _ => DocumentFormat::Html,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Plain,
    Ftml,
    Markdown,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self> {
        Ok(match value {
            "html" => OutputFormat::Html,
            "plain" | "text" => OutputFormat::Plain,
            "ftml" => OutputFormat::Ftml,
            "markdown" | "md" => OutputFormat::Markdown,
            other => bail!("unknown output format `{other}`"),
        })
    }
}

struct Options {
    input: Option<PathBuf>,
    width: Option<usize>,
    quote: bool,
    plain: bool,
    magic_links: bool,
    signature: Option<PathBuf>,
    top_signature: bool,
    output: Option<OutputFormat>,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>> {
        let mut options = Options {
            input: None,
            width: None,
            quote: false,
            plain: false,
            magic_links: true,
            signature: None,
            top_signature: false,
            output: None,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "--width" => {
                    let value = args.next().context("--width needs a value")?;
                    let width = value
                        .parse()
                        .with_context(|| format!("invalid width `{value}`"))?;
                    options.width = Some(width);
                }
                "--output" => {
                    let value = args.next().context("--output needs a value")?;
                    options.output = Some(OutputFormat::parse(&value)?);
                }
                "--signature" => {
                    let value = args.next().context("--signature needs a file")?;
                    options.signature = Some(PathBuf::from(value));
                }
                "--top-signature" => options.top_signature = true,
                "--quote" => options.quote = true,
                "--plain" => options.plain = true,
                "--no-magic-links" => options.magic_links = false,
                flag if flag.starts_with("--") => bail!("unknown option `{flag}`"),
                path => {
                    if options.input.replace(PathBuf::from(path)).is_some() {
                        bail!("only one input file is supported");
                    }
                }
            }
        }
        Ok(Some(options))
    }

    fn config(&self) -> Result<ComposerConfig> {
        let mut config = ComposerConfig::default()
            .with_magic_links(self.magic_links)
            .with_top_signature(self.top_signature);
        if let Some(width) = self.width {
            config = config.with_paragraph_width(width)?;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    init_logging();
    run()
}

/// `PURE_COMPOSE_LOG` wins over `RUST_LOG`; without either only warnings
/// are shown.
fn init_logging() {
    let filter = EnvFilter::try_from_env("PURE_COMPOSE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<()> {
    let Some(options) = Options::parse(env::args().skip(1))? else {
        eprintln!("{USAGE}");
        return Ok(());
    };
    let config = options.config()?;

    let markup = load_markup(options.input.as_deref())?;
    let mut session = if options.quote {
        let mut session = EditorSession::new(config);
        session
            .insert_content(&markup, true, true)
            .context("failed to quote the input")?;
        session
    } else {
        EditorSession::from_markup(&markup, config).context("failed to load the input")?
    };

    if let Some(path) = options.signature.as_deref() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_html = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
        let top = session.config().top_signature;
        session
            .insert_signature(content.trim_end(), is_html, top, true)
            .context("failed to insert the signature")?;
    }

    if options.plain {
        session
            .set_mode(Mode::PlainText)
            .context("failed to convert to plain text")?;
    }

    let output = options.output.unwrap_or(if options.plain {
        OutputFormat::Plain
    } else {
        OutputFormat::Html
    });
    let rendered = render(&session, output)?;

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("failed to write output")?;
    if !rendered.ends_with('\n') {
        writeln!(stdout).context("failed to write output")?;
    }
    Ok(())
}

/// Reads the input as composer markup, converting FTML and Markdown files
/// on the way. Without a path the markup comes from stdin.
fn load_markup(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("failed to read stdin")?;
        return Ok(content);
    };

    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let document = match DocumentFormat::from_path(path) {
        DocumentFormat::Html => return Ok(content),
        DocumentFormat::Ftml => interop::read_ftml(&content),
        DocumentFormat::Markdown => interop::read_markdown(&content),
    }
    .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(document.inner_markup(document.body()))
}

fn render(session: &EditorSession, output: OutputFormat) -> Result<String> {
    let rendered = match output {
        OutputFormat::Html => session
            .get_content(ContentFlags::TO_SEND_HTML)?
            .to_send_html,
        OutputFormat::Plain => session
            .get_content(ContentFlags::TO_SEND_PLAIN)?
            .to_send_plain,
        OutputFormat::Ftml => {
            let ftml = interop::write_ftml(session.document()).context("failed to render FTML")?;
            Some(ftml)
        }
        OutputFormat::Markdown => {
            let markdown = interop::write_markdown(session.document())
                .context("failed to render Markdown")?;
            Some(markdown)
        }
    };
    rendered.context("no content was produced")
}
