use anyhow::{Context, Result};
use geneprep::cli::{parse_args, setup_logging, ClassifyArgs, Commands, PrepareArgs};
use geneprep::data::loader::MatrixLoader;
use geneprep::data::writer::{save_fingerprint, save_matrix};
use geneprep::pipeline::{DedupExemptions, Pipeline, PreprocessConfig, RawPreprocessConfig};
use geneprep::reference::{ReferencePaths, ReferenceTables};
use geneprep::resolve::{classify, is_ensembl, IdentifierKind};
use geneprep::utils::{ensure_parent_dir, format_duration, format_number, preview, require_file};
use std::time::Instant;
use tracing::{error, info, warn};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", geneprep::info());

    let result = match cli.command {
        Commands::Prepare(args) => run_prepare(args),
        Commands::Classify(args) => run_classify(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    let started = Instant::now();
    info!("Input file: {:?}", args.input);
    info!("Model path: {}", args.model);

    require_file(&args.input, "Input matrix")?;
    require_file(&args.references, "Reference list")?;

    let file_config = args
        .config
        .as_ref()
        .map(|path| {
            RawPreprocessConfig::from_json_file(path)
                .with_context(|| format!("Failed to read request config {:?}", path))
        })
        .transpose()?;
    let config = PreprocessConfig::from_raw(&args.raw_config(file_config))?;
    info!(
        "Config: {:?}, {:?}, gene set {}",
        config.is_log_transformed, config.expression_unit, config.gene_set
    );

    info!("Loading reference tables...");
    let paths = ReferencePaths::from_file(&args.references)
        .with_context(|| format!("Failed to read reference list {:?}", args.references))?;
    let tables = ReferenceTables::load(&paths).context("Failed to load reference tables")?;

    info!("Loading upload...");
    let upload = MatrixLoader::new()
        .load(&args.input)
        .with_context(|| format!("Failed to load matrix from {:?}", args.input))?;
    info!(
        "Loaded {} genes x {} samples",
        format_number(upload.n_genes()),
        upload.n_samples()
    );

    let pipeline = Pipeline::new(&tables, args.model)
        .with_policy(args.resolution.policy())
        .with_exemptions(DedupExemptions::new(&args.keep_duplicates));
    let prepared = pipeline
        .run(&upload, &config)
        .context("Preparation failed")?;

    ensure_parent_dir(&args.output)?;
    save_matrix(&args.output, &prepared.matrix)?;
    info!("Prepared matrix saved to: {:?}", args.output);

    match (&args.fingerprint_out, &prepared.fingerprint) {
        (Some(path), Some(fingerprint)) => {
            ensure_parent_dir(path)?;
            save_fingerprint(path, fingerprint)?;
            info!("Fingerprint saved to: {:?}", path);
        }
        (Some(_), None) => warn!("The {} path produces no fingerprint", args.model),
        _ => {}
    }

    if let Some(path) = &args.report {
        ensure_parent_dir(path)?;
        prepared.report.save(path)?;
        info!("Report saved to: {:?}", path);
    }

    prepared.report.print();
    if !prepared.report.unresolved.is_empty() {
        info!("Unresolved: {}", preview(&prepared.report.unresolved, 10));
    }
    info!(
        "Done in {}",
        format_duration(started.elapsed().as_secs_f64())
    );

    Ok(())
}

fn run_classify(args: ClassifyArgs) -> Result<()> {
    require_file(&args.input, "Input matrix")?;
    let upload = MatrixLoader::new()
        .load(&args.input)
        .with_context(|| format!("Failed to load matrix from {:?}", args.input))?;

    let unique = upload.unique_genes();
    let kind = classify(&unique);
    let ensembl: Vec<&String> = unique.iter().filter(|id| is_ensembl(id)).collect();

    println!("Identifier kind: {}", kind);
    println!("Rows: {}", format_number(upload.n_genes()));
    println!("Unique identifiers: {}", format_number(unique.len()));
    println!("Ensembl identifiers: {}", format_number(ensembl.len()));
    println!("Samples: {}", upload.n_samples());

    if args.list_ensembl && kind == IdentifierKind::Mixed {
        for id in ensembl {
            println!("{}", id);
        }
    }

    Ok(())
}
