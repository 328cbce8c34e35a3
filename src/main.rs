//! Purpose: `pluckite` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Extracted values go to stdout; notices and errors go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use bstr::ByteSlice;
use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

mod color_json;
mod notice;

use color_json::colorize_json;
use notice::{Notice, notice_json};
use pluckite::api::{
    Diagnostics, Doc, Error, ErrorKind, Extractor, FieldType, doc_from_slice, doc_from_str,
    in_range, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::InvalidParam)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run with --help for usage."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    dispatch(cli.command, color_mode).map_err(|err| (err, color_mode))
}

fn clap_error_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

#[derive(Parser)]
#[command(
    name = "pluckite",
    version,
    about = "Typed field extraction for JSON documents",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Extract one field from a parsed JSON document into a chosen type,
with missing-field defaults, range checks, and fixed-capacity copies.

Mental model:
  - `get` extracts one field
  - `pick` extracts several fields into one object
"#,
    after_help = r#"EXAMPLES
  $ echo '{"name":"alice","port":8080}' | pluckite get name --as string --raw
  $ pluckite get port config.json --as uint --min 1 --max 65535
  $ pluckite pick config.json --field name:string --field port:uint

LEARN MORE
  $ pluckite <command> --help
  https://github.com/sandover/pluckite"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TypeArg {
    String,
    Int,
    Uint,
    Bool,
    Strings,
    Json,
}

impl From<TypeArg> for FieldType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::String => FieldType::String,
            TypeArg::Int => FieldType::Int,
            TypeArg::Uint => FieldType::Uint,
            TypeArg::Bool => FieldType::Bool,
            TypeArg::Strings => FieldType::Strings,
            TypeArg::Json => FieldType::Json,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ErrorPolicyCli {
    Stop,
    Skip,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Extract one field from a JSON document",
        long_about = r#"Extract one field from a JSON document into a chosen destination type.

The field must be a direct child of the document root. The destination type
decides how the value is converted; a missing field can be papered over with
--default, and unsigned values can be range-checked with --min/--max."#,
        after_help = r#"EXAMPLES
  $ pluckite get name config.json --as string --raw
  $ pluckite get port config.json --as uint --min 1 --max 65535
  $ pluckite get debug config.json --as bool --default false
  $ pluckite get label config.json --capacity 32
  $ cat events.jsonl | pluckite get status --as string --each --errors skip

NOTES
  - Default type is json (the field's subtree, any JSON type)
  - --capacity implies string extraction; exit 4 when the value does not fit
  - --min/--max imply uint extraction and must be given together
  - --default takes JSON; bare text is accepted for string extraction
  - --each reads JSON Lines and extracts from every record"#
    )]
    Get {
        #[arg(help = "Field name (direct child of the document root)")]
        field: String,
        #[arg(
            help = "Input file (default: stdin; use - for stdin)",
            value_hint = ValueHint::FilePath
        )]
        file: Option<String>,
        #[arg(
            long = "as",
            value_enum,
            help = "Destination type: string|int|uint|bool|strings|json (default: json)"
        )]
        ty: Option<TypeArg>,
        #[arg(
            long,
            value_name = "VALUE",
            help = "Default applied when the field is missing (JSON, or bare text for strings)"
        )]
        default: Option<String>,
        #[arg(
            long,
            value_name = "BYTES",
            help = "Copy into a fixed buffer of this capacity (string extraction only)"
        )]
        capacity: Option<usize>,
        #[arg(
            long,
            value_name = "N",
            requires = "max",
            help = "Lower bound for uint extraction (closed range, requires --max)"
        )]
        min: Option<u64>,
        #[arg(
            long,
            value_name = "N",
            requires = "min",
            help = "Upper bound for uint extraction (closed range, requires --min)"
        )]
        max: Option<u64>,
        #[arg(long, help = "Treat input as JSON Lines; extract from every record")]
        each: bool,
        #[arg(
            long,
            value_enum,
            default_value = "stop",
            help = "Stream error policy for --each: stop|skip"
        )]
        errors: ErrorPolicyCli,
        #[arg(long, help = "Print bare string values without JSON quoting")]
        raw: bool,
        #[arg(long, help = "Suppress per-field informational logs")]
        quiet: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Extract several fields into one JSON object",
        long_about = r#"Extract several fields from a JSON document and emit them as one object.

Each --field takes NAME or NAME:TYPE; without a type the field's subtree is
extracted as-is."#,
        after_help = r#"EXAMPLES
  $ pluckite pick config.json --field name:string --field port:uint
  $ cat events.jsonl | pluckite pick --field id:uint --field tags:strings --each"#
    )]
    Pick {
        #[arg(
            help = "Input file (default: stdin; use - for stdin)",
            value_hint = ValueHint::FilePath
        )]
        file: Option<String>,
        #[arg(
            long = "field",
            value_name = "NAME[:TYPE]",
            required = true,
            help = "Field to extract (repeatable; TYPE one of string,int,uint,bool,strings,json)"
        )]
        fields: Vec<String>,
        #[arg(long, help = "Treat input as JSON Lines; extract from every record")]
        each: bool,
        #[arg(
            long,
            value_enum,
            default_value = "stop",
            help = "Stream error policy for --each: stop|skip"
        )]
        errors: ErrorPolicyCli,
        #[arg(long, help = "Suppress per-field informational logs")]
        quiet: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout."#,
        after_help = r#"EXAMPLES
  $ pluckite completion bash > ~/.local/share/bash-completion/completions/pluckite
  $ pluckite completion zsh > ~/.zfunc/_pluckite
  $ pluckite completion fish > ~/.config/fish/completions/pluckite.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn dispatch(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "pluckite", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Get {
            field,
            file,
            ty,
            default,
            capacity,
            min,
            max,
            each,
            errors,
            raw,
            quiet,
        } => {
            let spec = build_get_spec(field, ty, default, capacity, min, max, quiet)?;
            let diag = Diagnostics::new();
            if each {
                let field_label = spec.field.clone();
                return stream_records(file.as_deref(), errors, "get", &field_label, |doc| {
                    extract_get(doc, &diag, &spec).map(|value| render_compact(&value, raw))
                });
            }
            let doc = read_doc(file.as_deref())?;
            let value = extract_get(&doc, &diag, &spec)?;
            emit_value(&value, raw, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Pick {
            file,
            fields,
            each,
            errors,
            quiet,
        } => {
            let specs = fields
                .iter()
                .map(|raw| parse_pick_field(raw))
                .collect::<Result<Vec<_>, Error>>()?;
            let diag = Diagnostics::new();
            let extract = |doc: &Doc| -> Result<Value, Error> {
                let ex = doc.fields(&diag);
                let ex = if quiet { ex.silent() } else { ex };
                let mut out = Map::new();
                for (name, ty) in &specs {
                    out.insert(name.clone(), ex.get_tagged(name, *ty)?);
                }
                Ok(Value::Object(out))
            };
            if each {
                let field_label = specs
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                return stream_records(file.as_deref(), errors, "pick", &field_label, |doc| {
                    extract(doc).map(|value| value.to_string())
                });
            }
            let doc = read_doc(file.as_deref())?;
            let value = extract(&doc)?;
            emit_value(&value, false, color_mode);
            Ok(RunOutcome::ok())
        }
    }
}

/// One resolved `get` invocation: the effective destination type plus
/// the mode-selecting options that survived validation.
#[derive(Debug)]
struct GetSpec {
    field: String,
    ty: FieldType,
    default: Option<Value>,
    capacity: Option<usize>,
    range: Option<(u64, u64)>,
    quiet: bool,
}

fn build_get_spec(
    field: String,
    ty: Option<TypeArg>,
    default: Option<String>,
    capacity: Option<usize>,
    min: Option<u64>,
    max: Option<u64>,
    quiet: bool,
) -> Result<GetSpec, Error> {
    let range = match (min, max) {
        (Some(lo), Some(hi)) => Some((lo, hi)),
        _ => None,
    };
    if capacity.is_some() && !matches!(ty, None | Some(TypeArg::String)) {
        return Err(Error::new(ErrorKind::InvalidParam)
            .with_message("--capacity applies to string extraction")
            .with_hint("Drop --as, or pass --as string."));
    }
    if range.is_some() && !matches!(ty, None | Some(TypeArg::Uint)) {
        return Err(Error::new(ErrorKind::InvalidParam)
            .with_message("--min/--max apply to uint extraction")
            .with_hint("Drop --as, or pass --as uint."));
    }
    if capacity.is_some() && range.is_some() {
        return Err(Error::new(ErrorKind::InvalidParam)
            .with_message("--capacity cannot be combined with --min/--max"));
    }
    let ty = if capacity.is_some() {
        FieldType::String
    } else if range.is_some() {
        FieldType::Uint
    } else {
        ty.map(FieldType::from).unwrap_or(FieldType::Json)
    };
    let default = default.map(|text| parse_default(&text, ty)).transpose()?;
    Ok(GetSpec {
        field,
        ty,
        default,
        capacity,
        range,
        quiet,
    })
}

fn parse_default(text: &str, ty: FieldType) -> Result<Value, Error> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        // Bare text is common for string defaults; anything else must be JSON.
        Err(_) if ty == FieldType::String => Ok(Value::String(text.to_owned())),
        Err(err) => Err(Error::new(ErrorKind::InvalidParam)
            .with_message(format!("--default is not valid json: {text}"))
            .with_hint("Pass a JSON literal, e.g. --default 42 or --default '\"text\"'.")
            .with_source(err)),
    }
}

fn parse_pick_field(raw: &str) -> Result<(String, FieldType), Error> {
    match raw.split_once(':') {
        Some((name, ty)) if !name.is_empty() => Ok((name.to_string(), ty.parse()?)),
        None if !raw.is_empty() => Ok((raw.to_string(), FieldType::Json)),
        _ => Err(Error::new(ErrorKind::InvalidParam)
            .with_message(format!("invalid --field value '{raw}'"))
            .with_hint("Use NAME or NAME:TYPE, e.g. --field port:uint.")),
    }
}

fn extract_get(doc: &Doc, diag: &Diagnostics, spec: &GetSpec) -> Result<Value, Error> {
    let ex = doc.fields(diag);
    let ex = if spec.quiet { ex.silent() } else { ex };
    if let Some(capacity) = spec.capacity {
        return extract_fixed(&ex, spec, capacity);
    }
    if let Some((lo, hi)) = spec.range {
        let value = match &spec.default {
            Some(default) => {
                let default = default.as_u64().ok_or_else(|| {
                    Error::new(ErrorKind::InvalidParam)
                        .with_field(&spec.field)
                        .with_message("default value does not fit type 'uint'")
                })?;
                ex.get_checked_or(&spec.field, in_range(lo, hi), default)?
            }
            None => ex.get_checked(&spec.field, in_range(lo, hi))?,
        };
        return Ok(Value::from(value));
    }
    match &spec.default {
        Some(default) => ex.get_tagged_or(&spec.field, spec.ty, default),
        None => ex.get_tagged(&spec.field, spec.ty),
    }
}

fn extract_fixed(ex: &Extractor<'_>, spec: &GetSpec, capacity: usize) -> Result<Value, Error> {
    let mut buf = vec![0u8; capacity];
    let written = match &spec.default {
        Some(default) => {
            let default = default.as_str().ok_or_else(|| {
                Error::new(ErrorKind::InvalidParam)
                    .with_field(&spec.field)
                    .with_message("default value does not fit type 'string'")
            })?;
            ex.fixed_str_or(&spec.field, default, &mut buf)?
        }
        None => ex.fixed_str(&spec.field, &mut buf)?,
    };
    Ok(Value::String(
        String::from_utf8_lossy(&buf[..written]).into_owned(),
    ))
}

fn stream_records<F>(
    file: Option<&str>,
    errors: ErrorPolicyCli,
    cmd: &str,
    field_label: &str,
    mut handle: F,
) -> Result<RunOutcome, Error>
where
    F: FnMut(&Doc) -> Result<String, Error>,
{
    let mut reader = open_input(file)?;
    let mut buf = Vec::new();
    let mut record_no = 0u64;
    let mut ok = 0u64;
    let mut last_failure = 0;
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read input stream")
                .with_source(err)
        })?;
        if read == 0 {
            break;
        }
        record_no += 1;
        let record = buf.trim();
        if record.is_empty() {
            continue;
        }
        match doc_from_slice(record).and_then(|doc| handle(&doc)) {
            Ok(line) => {
                println!("{line}");
                ok += 1;
            }
            Err(err) => match errors {
                ErrorPolicyCli::Stop => return Err(err),
                ErrorPolicyCli::Skip => {
                    last_failure = to_exit_code(err.kind());
                    emit_skip_notice(cmd, field_label, record_no, &err);
                }
            },
        }
    }
    if ok == 0 && last_failure != 0 {
        Ok(RunOutcome::with_code(last_failure))
    } else {
        Ok(RunOutcome::ok())
    }
}

fn open_input(file: Option<&str>) -> Result<Box<dyn BufRead>, Error> {
    match file {
        None | Some("-") => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(path) => {
            let file = File::open(path).map_err(|err| io_error(path, err))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

fn read_doc(file: Option<&str>) -> Result<Doc, Error> {
    let input = match file {
        None | Some("-") => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            input
        }
        Some(path) => std::fs::read_to_string(path).map_err(|err| io_error(path, err))?,
    };
    doc_from_str(&input)
}

fn io_error(path: &str, err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(format!("failed to read input '{path}'"))
        .with_source(err)
}

fn render_compact(value: &Value, raw: bool) -> String {
    if raw {
        if let Value::String(text) = value {
            return text.clone();
        }
    }
    value.to_string()
}

fn emit_value(value: &Value, raw: bool, color_mode: ColorMode) {
    if raw {
        if let Value::String(text) = value {
            println!("{text}");
            return;
        }
    }
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    // `always` forces colored pretty output even through a pipe.
    if is_tty || use_color {
        println!("{}", colorize_json(value, use_color));
    } else {
        println!("{value}");
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Io\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_skip_notice(cmd: &str, field: &str, record: u64, err: &Error) {
    let mut details = Map::new();
    details.insert("record".to_string(), Value::from(record));
    details.insert("kind".to_string(), Value::from(format!("{:?}", err.kind())));
    let notice = Notice {
        kind: "skip".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: cmd.to_string(),
        field: field.to_string(),
        message: error_message(err),
        details,
    };
    let json = serde_json::to_string(&notice_json(&notice)).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"skip\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Mismatch => "type mismatch".to_string(),
        ErrorKind::NotFound => "field not found".to_string(),
        ErrorKind::BufferTooSmall => "destination buffer is too small".to_string(),
        ErrorKind::InvalidParam => "invalid parameter".to_string(),
        ErrorKind::NoMemory => "out of memory".to_string(),
        ErrorKind::Parse => "invalid json".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_text(err: &Error, use_color: bool) -> String {
    let label = if use_color {
        "\u{1b}[31merror:\u{1b}[0m"
    } else {
        "error:"
    };
    let mut text = format!("{label} {}", error_message(err));
    if let Some(field) = err.field() {
        text.push_str(&format!(" (field: {field})"));
    }
    if let Some(hint) = err.hint() {
        text.push_str(&format!("\n  hint: {hint}"));
    }
    text
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), Value::from(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), Value::from(error_message(err)));
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), Value::from(field));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), Value::from(hint));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), Value::from(causes));
    }
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}
