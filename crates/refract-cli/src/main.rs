use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use refract_config::{init_tracing, json_schema_string, load_for_workspace, RefractConfig};
use refract_core::{Document, FileId, LineColumnSelection, ProgressMonitor, TextRange};
use refract_refactor::{
    generate_preview, perform_change, resolve_in_source, ChangeContext, ElementModel, ElementRef,
    ExtractTemp, FsModel, InitializeIn, MatchCategory, PerformOutcome, ProceedPolicy,
    PromoteTempToField, RefactoringKind, RefactoringPreview, RefactoringScanner,
    RefactoringSession, RefactoringStatus, RenamePackage, RenameParameters, RenameTemp,
    ReorderParameters, ScanFlags, SelfEncapsulateField, UndoStack, Visibility,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "refract", version, about = "Refract CLI (Java refactorings, textual scans)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a refactoring on a selection; previews the change unless `--apply` is given
    Refactor(RefactorArgs),
    /// Report the program element a selection designates
    Resolve(ResolveArgs),
    /// Find whole-word occurrences of a name in comments, Javadoc and string literals
    Scan(ScanArgs),
    /// Print the JSON schema of `refract.toml`
    ConfigSchema,
}

#[derive(Args)]
struct SourceArgs {
    /// Java source file
    file: PathBuf,
    /// Workspace root; file ids and `refract.toml` discovery are relative to it
    /// (defaults to the file's directory)
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(Args)]
struct RefactorArgs {
    /// One of rename-temp, extract-temp, inline-temp, promote-temp, reorder-parameters,
    /// rename-parameters, rename-package, self-encapsulate
    kind: RefactoringKind,
    #[command(flatten)]
    source: SourceArgs,
    /// `LINE:COL-LINE:COL` (1-based, end exclusive) or a caret `LINE:COL`
    #[arg(long)]
    selection: LineColumnSelection,
    /// New name (variable, temp, field or package)
    #[arg(long)]
    name: Option<String>,
    /// New parameter name, as `INDEX=NAME` (repeatable)
    #[arg(long = "param", value_name = "INDEX=NAME")]
    params: Vec<String>,
    /// New parameter order as old indices, e.g. `2,0,1`
    #[arg(long, value_delimiter = ',')]
    order: Vec<usize>,
    #[arg(long)]
    getter: Option<String>,
    #[arg(long)]
    setter: Option<String>,
    /// public, protected, package or private
    #[arg(long)]
    visibility: Option<Visibility>,
    /// method, field or constructor
    #[arg(long)]
    initialize_in: Option<InitializeIn>,
    #[arg(long = "static")]
    declare_static: bool,
    #[arg(long = "final")]
    declare_final: bool,
    /// Replace only the selected occurrence when extracting
    #[arg(long)]
    single_occurrence: bool,
    /// Also rename occurrences in comments, Javadoc and strings
    #[arg(long)]
    textual_matches: bool,
    /// Leave imports and qualified names untouched when renaming a package
    #[arg(long)]
    no_references: bool,
    /// Keep direct field accesses inside the declaring class
    #[arg(long)]
    keep_declaring_class: bool,
    /// Highest severity that still lets the refactoring proceed
    #[arg(long, value_enum, default_value_t = Proceed::Ok)]
    proceed: Proceed,
    /// Write the change to disk instead of printing a preview
    #[arg(long)]
    apply: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Proceed {
    Ok,
    Warnings,
    Errors,
}

impl From<Proceed> for ProceedPolicy {
    fn from(value: Proceed) -> Self {
        match value {
            Proceed::Ok => ProceedPolicy::OnlyOk,
            Proceed::Warnings => ProceedPolicy::AllowWarnings,
            Proceed::Errors => ProceedPolicy::AllowErrors,
        }
    }
}

#[derive(Args)]
struct ResolveArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long)]
    selection: LineColumnSelection,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ScanArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Identifier to search for
    #[arg(long)]
    pattern: String,
    #[arg(long)]
    no_comments: bool,
    #[arg(long)]
    no_javadoc: bool,
    #[arg(long)]
    no_strings: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Refactor(args) => refactor(args),
        Command::Resolve(args) => {
            let workspace = Workspace::open(&args.source)?;
            let range = workspace.selection(&args.selection)?;
            let element = resolve_in_source(&workspace.file, workspace.document.text(), range);
            let report = ResolveReport::new(&workspace, element);
            let found = report.element.is_some();
            print_output(&report, args.json)?;
            Ok(if found { 0 } else { 1 })
        }
        Command::Scan(args) => {
            let workspace = Workspace::open(&args.source)?;
            let mut scanner =
                RefactoringScanner::new(args.pattern.clone()).with_flags(workspace.scan_flags());
            if args.no_comments {
                scanner.set_analyze_comments(false);
            }
            if args.no_javadoc {
                scanner.set_analyze_javadoc(false);
            }
            if args.no_strings {
                scanner.set_analyze_strings(false);
            }
            let result = scanner.scan(workspace.document.text());
            let matches: Vec<ScanHit> = result
                .all()
                .into_iter()
                .map(|m| ScanHit::new(&workspace.document, m.range(), m.category))
                .collect();
            let report = ScanReport {
                file: workspace.file.clone(),
                pattern: args.pattern,
                total: result.total(),
                javadoc: result.javadoc.len(),
                comments: result.comments.len(),
                strings: result.strings.len(),
                matches,
            };
            print_output(&report, args.json)?;
            Ok(0)
        }
        Command::ConfigSchema => {
            println!("{}", json_schema_string()?);
            Ok(0)
        }
    }
}

/// A source file opened inside a workspace root, with the root's configuration loaded.
struct Workspace {
    model: Arc<FsModel>,
    file: FileId,
    document: Document,
    config: RefractConfig,
}

impl Workspace {
    fn open(args: &SourceArgs) -> Result<Self> {
        let path = args
            .file
            .canonicalize()
            .with_context(|| format!("failed to open {}", args.file.display()))?;
        let root = match &args.root {
            Some(root) => root
                .canonicalize()
                .with_context(|| format!("failed to resolve workspace root {}", root.display()))?,
            None => path
                .parent()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?,
        };
        let (config, config_path) = load_for_workspace(&root)?;
        init_tracing(&config.logging);
        if let Some(path) = &config_path {
            tracing::debug!(target: "refract.cli", path = %path.display(), "loaded config");
        }
        for warning in config.validate() {
            tracing::warn!(target: "refract.cli", "{warning}");
        }

        let model = Arc::new(FsModel::new(root));
        let file = model.file_id(&path).ok_or_else(|| {
            anyhow!(
                "{} is not inside the workspace root {}",
                path.display(),
                model.root().display()
            )
        })?;
        let text = model.read_source(&file)?;
        Ok(Self {
            model,
            file,
            document: Document::new(text),
            config,
        })
    }

    fn selection(&self, selection: &LineColumnSelection) -> Result<TextRange> {
        selection
            .resolve(&self.document)
            .with_context(|| format!("invalid selection {selection} in {}", self.file))
    }

    fn scan_flags(&self) -> ScanFlags {
        let scanner = self.config.scanner;
        ScanFlags {
            comments: scanner.comments,
            javadoc: scanner.javadoc,
            strings: scanner.strings,
        }
    }
}

fn refactor(args: RefactorArgs) -> Result<i32> {
    let workspace = Workspace::open(&args.source)?;
    let range = workspace.selection(&args.selection)?;
    let model: Arc<dyn ElementModel> = workspace.model.clone();
    let monitor = ProgressMonitor::new();
    let policy = ProceedPolicy::from(args.proceed);

    let mut session = RefactoringSession::new(args.kind.create(model, workspace.file.clone(), range));
    let mut report = RefactorReport {
        refactoring: args.kind,
        name: String::new(),
        file: workspace.file.clone(),
        selection: args.selection,
        status: RefactoringStatus::new(),
        blocked: false,
        applied: false,
        preview: None,
        skipped: Vec::new(),
    };

    let activation = session.check_activation(&monitor)?;
    report.status.merge(activation);
    if !report.status.has_fatal_error() {
        configure(&mut session, &args, &workspace)?;
        let input = session.check_input(&monitor)?;
        report.status.merge(input);
    }
    report.name = session.refactoring().name();
    if report.status.has_fatal_error() || !policy.allows(&report.status) {
        tracing::info!(
            target: "refract.cli",
            refactoring = %report.name,
            severity = %report.status.severity(),
            "refactoring blocked"
        );
        report.blocked = true;
        print_output(&report, args.json)?;
        return Ok(1);
    }

    let change = session.create_change(&monitor)?;
    report.preview = Some(generate_preview(workspace.model.as_ref(), change.as_ref())?);

    if args.apply {
        let mut undo = UndoStack::with_limit(workspace.config.refactoring.undo_limit);
        let mut ctx = ChangeContext::new(workspace.model.as_ref());
        match perform_change(change, &mut ctx, &mut undo, &monitor)? {
            PerformOutcome::Performed => report.applied = true,
            PerformOutcome::Cancelled => bail!("refactoring was cancelled"),
        }
        report.skipped = ctx.skipped().to_vec();
        tracing::debug!(target: "refract.cli", undo = ?undo.peek_undo_label(), "change applied");
    }

    print_output(&report, args.json)?;
    Ok(0)
}

fn configure(
    session: &mut RefactoringSession,
    args: &RefactorArgs,
    workspace: &Workspace,
) -> Result<()> {
    let defaults = &workspace.config.refactoring;
    let textual = args.textual_matches || defaults.update_textual_matches;
    let flags = workspace.scan_flags();
    let name = args.name.clone();

    match args.kind {
        RefactoringKind::RenameTemp => session.configure::<RenameTemp>(|r| {
            if let Some(name) = name {
                r.set_new_name(name);
            }
            r.set_update_textual_matches(textual);
            r.set_textual_scan_flags(flags);
        })?,
        RefactoringKind::ExtractTemp => {
            let replace_all = defaults.replace_all && !args.single_occurrence;
            let declare_final = defaults.declare_final || args.declare_final;
            session.configure::<ExtractTemp>(|r| {
                if let Some(name) = name {
                    r.set_temp_name(name);
                }
                r.set_replace_all_occurrences(replace_all);
                r.set_declare_final(declare_final);
            })?
        }
        RefactoringKind::InlineTemp => {}
        RefactoringKind::PromoteTempToField => {
            session.configure::<PromoteTempToField>(|r| {
                if let Some(name) = name {
                    r.set_field_name(name);
                }
                if let Some(visibility) = args.visibility {
                    r.set_visibility(visibility);
                }
                if let Some(place) = args.initialize_in {
                    r.set_initialize_in(place);
                }
                r.set_declare_static(args.declare_static);
                r.set_declare_final(args.declare_final);
            })?
        }
        RefactoringKind::ReorderParameters => {
            if !args.order.is_empty() {
                let order = args.order.clone();
                session.configure::<ReorderParameters>(|r| r.set_new_order(order))?;
            }
        }
        RefactoringKind::RenameParameters => {
            let renames = args
                .params
                .iter()
                .map(|param| parse_param(param))
                .collect::<Result<Vec<_>>>()?;
            session.configure::<RenameParameters>(|r| {
                for (index, new_name) in renames {
                    r.set_new_name(index, new_name);
                }
                r.set_update_textual_matches(textual);
                r.set_textual_scan_flags(flags);
            })?
        }
        RefactoringKind::RenamePackage => session.configure::<RenamePackage>(|r| {
            if let Some(name) = name {
                r.set_new_name(name);
            }
            r.set_update_references(!args.no_references);
            r.set_update_textual_matches(textual);
            r.set_textual_scan_flags(flags);
        })?,
        RefactoringKind::SelfEncapsulateField => {
            session.configure::<SelfEncapsulateField>(|r| {
                if let Some(getter) = args.getter.clone() {
                    r.set_getter_name(getter);
                }
                if let Some(setter) = args.setter.clone() {
                    r.set_setter_name(setter);
                }
                if let Some(visibility) = args.visibility {
                    r.set_accessor_visibility(visibility);
                }
                r.set_encapsulate_declaring_class(!args.keep_declaring_class);
            })?
        }
    }
    Ok(())
}

fn parse_param(param: &str) -> Result<(usize, String)> {
    let (index, name) = param
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid --param `{param}` (expected INDEX=NAME)"))?;
    let index = index
        .trim()
        .parse()
        .with_context(|| format!("invalid parameter index in `{param}`"))?;
    Ok((index, name.trim().to_string()))
}

#[derive(Serialize)]
struct RefactorReport {
    refactoring: RefactoringKind,
    name: String,
    file: FileId,
    selection: LineColumnSelection,
    status: RefactoringStatus,
    blocked: bool,
    applied: bool,
    preview: Option<RefactoringPreview>,
    skipped: Vec<String>,
}

#[derive(Serialize)]
struct ResolveReport {
    file: FileId,
    element: Option<ElementRef>,
    /// 1-based position of the element's range.
    position: Option<LineColumnSelection>,
}

impl ResolveReport {
    fn new(workspace: &Workspace, element: Option<ElementRef>) -> Self {
        let position = element
            .as_ref()
            .map(|element| LineColumnSelection::from_range(&workspace.document, element.range));
        Self {
            file: workspace.file.clone(),
            element,
            position,
        }
    }
}

#[derive(Serialize)]
struct ScanReport {
    file: FileId,
    pattern: String,
    total: usize,
    javadoc: usize,
    comments: usize,
    strings: usize,
    matches: Vec<ScanHit>,
}

#[derive(Serialize)]
struct ScanHit {
    line: u32,
    column: u32,
    category: MatchCategory,
}

impl ScanHit {
    fn new(document: &Document, range: TextRange, category: MatchCategory) -> Self {
        let position = LineColumnSelection::from_range(document, range);
        Self {
            line: position.start_line,
            column: position.start_column,
            category,
        }
    }
}

fn category_label(category: MatchCategory) -> &'static str {
    match category {
        MatchCategory::Javadoc => "javadoc",
        MatchCategory::Comment => "comment",
        MatchCategory::String => "string",
    }
}

fn print_status(status: &RefactoringStatus) {
    if status.is_empty() {
        println!("status: OK");
        return;
    }
    println!("status: {}", status.severity());
    for entry in status.entries() {
        println!("  {entry}");
    }
}

fn print_output<T: Serialize + 'static>(value: &T, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(value)?;
        println!("{out}");
        return Ok(());
    }

    // Human output for key types. Everything else falls back to pretty JSON.
    let any = value as &dyn std::any::Any;
    if let Some(report) = any.downcast_ref::<RefactorReport>() {
        println!("{} ({})", report.name, report.refactoring);
        print_status(&report.status);
        if report.blocked {
            println!("blocked: {} findings are not accepted", report.status.severity());
            return Ok(());
        }
        if let Some(preview) = &report.preview {
            if report.applied {
                println!(
                    "applied: {} edits in {} files",
                    preview.total_edits, preview.total_files
                );
                for skipped in &report.skipped {
                    println!("  skipped {skipped}");
                }
            } else {
                for file in &preview.files {
                    print!("{}", file.unified_diff);
                }
                println!(
                    "preview: {} edits in {} files (pass --apply to write them)",
                    preview.total_edits, preview.total_files
                );
            }
        }
    } else if let Some(report) = any.downcast_ref::<ResolveReport>() {
        match (&report.element, &report.position) {
            (Some(element), Some(position)) => {
                let kind = serde_json::to_value(element.kind)?;
                println!(
                    "{}:{}: {} `{}`",
                    report.file,
                    position,
                    kind.as_str().unwrap_or_default(),
                    element.name
                );
            }
            _ => println!("{}: no element at the selection", report.file),
        }
    } else if let Some(report) = any.downcast_ref::<ScanReport>() {
        for hit in &report.matches {
            println!(
                "{}:{}:{}: {}",
                report.file,
                hit.line,
                hit.column,
                category_label(hit.category)
            );
        }
        println!(
            "{} matches for `{}` ({} javadoc, {} comments, {} strings)",
            report.total, report.pattern, report.javadoc, report.comments, report.strings
        );
    } else {
        let out = serde_json::to_string_pretty(value)?;
        println!("{out}");
    }
    Ok(())
}

