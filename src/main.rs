use std::fs::File;
use std::io::BufWriter;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use structopt::StructOpt;

use joosc::api;
use joosc::data::span::FileCache;
use joosc::ErrorList;

#[derive(Debug, StructOpt)]
#[structopt(name = "joosc", about = "Compiler for the Joos programming language.")]
struct Arguments {
    /// Stop after lexical analysis
    #[structopt(long = "lex")]
    lex_only: bool,

    /// Stop after parsing
    #[structopt(long = "parse")]
    parse_only: bool,

    /// Stop after weeding
    #[structopt(long = "weed")]
    weed_only: bool,

    /// Stop after name and type analysis
    #[structopt(long = "check")]
    check_only: bool,

    /// Dump IR streams instead of generating assembly
    #[structopt(long = "ir")]
    ir_only: bool,

    /// Print diagnostics in the one-line simple form
    #[structopt(long = "simple-errors")]
    simple: bool,

    /// Directory for generated assembly files
    #[structopt(short = "D", default_value = "output", parse(from_os_str))]
    output_dir: PathBuf,

    /// Source files to compile (user sources plus the library)
    #[structopt(parse(from_os_str))]
    files: Vec<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Arguments::from_args();
    let code = match run(&args) {
        Ok(true) => 0,
        Ok(false) => joosc::EXIT_COMPILE_ERROR,
        Err(error) => {
            eprintln!("joosc: {:#}", error);
            joosc::EXIT_INTERNAL_ERROR
        }
    };
    std::process::exit(code);
}

/// Runs the pipeline, stopping at the first fatal stage boundary.
/// `Ok(true)` is a successful compile, `Ok(false)` a reported one.
fn run(args: &Arguments) -> anyhow::Result<bool> {
    let mut cache = FileCache::default();
    let mut sources = Vec::new();
    for path in &args.files {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let file = cache.add(path.display().to_string(), &source);
        sources.push((file, source));
    }

    let mut errors = ErrorList::new();

    let report = |errors: &ErrorList, cache: &FileCache| -> anyhow::Result<bool> {
        let stderr = std::io::stderr();
        let mut stderr = stderr.lock();
        if args.simple {
            errors.print_simple(&mut stderr)?;
        } else {
            errors.print_rich(cache, &mut stderr)?;
        }
        Ok(!errors.is_fatal())
    };

    // Lex.
    log::info!("lexing {} files", sources.len());
    let mut tokens = Vec::new();
    for (file, source) in &sources {
        tokens.push((*file, api::lex(*file, source, &mut errors)));
    }
    if errors.is_fatal() || args.lex_only {
        return report(&errors, &cache);
    }

    // Parse.
    log::info!("parsing");
    let mut units = Vec::new();
    for (file, tokens) in &tokens {
        if let Some(unit) = api::parse(*file, tokens, &mut errors) {
            units.push(unit);
        }
    }
    let mut program = joosc::data::ast::Program { units };
    if errors.is_fatal() || args.parse_only {
        return report(&errors, &cache);
    }

    // Weed.
    log::info!("weeding");
    api::weed(&program, &mut errors);
    if errors.is_fatal() || args.weed_only {
        return report(&errors, &cache);
    }

    // Name and type analysis.
    log::info!("checking");
    let checked = api::check(&mut program, &mut errors);
    let (type_set, tinfo_map, strings) = match checked {
        Some(world) => world,
        None => return report(&errors, &cache),
    };
    if errors.is_fatal() || args.check_only {
        return report(&errors, &cache);
    }

    // Back end.
    log::info!("generating code for {} types", tinfo_map.len());
    let links = api::RuntimeLinkIds::resolve(&type_set, &tinfo_map);
    let filenames: Vec<String> = cache.names().map(str::to_string).collect();
    let ir = api::emit_program(&program, &tinfo_map, &links, &filenames);

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;

    if args.ir_only {
        use joosc::data::sexp::Serialize as _;
        let path = args.output_dir.join("ir.sexp");
        let mut out = BufWriter::new(File::create(&path)?);
        ir.sexp().write(80, &mut out)?;
        writeln!(out)?;
        return report(&errors, &cache);
    }

    let offsets = api::OffsetTable::build(&tinfo_map);
    let mut frames = api::FrameTable::default();

    for unit in &ir.units {
        let path = args.output_dir.join(api::mangle::unit_file(unit.file));
        let mut out = BufWriter::new(File::create(&path)?);
        api::write_unit(unit, &tinfo_map, &offsets, &links, &mut frames, &mut out)?;
    }

    let path = args.output_dir.join("start.s");
    let mut out = BufWriter::new(File::create(&path)?);
    api::write_boot(
        &tinfo_map,
        &offsets,
        &links,
        &strings,
        &frames,
        &filenames,
        &mut out,
    )?;

    report(&errors, &cache)
}
