use clap::{Parser, Subcommand};
use fhir::{Bundle, ObservationCategory};
use obds_core::{ConsolidatedTumorState, CoreConfig, ObservationProcessor, Provenance, ReportLedger};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "obds")]
#[command(about = "oBDS report consolidation and FHIR mapping CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a ledger file into a FHIR transaction bundle
    Process {
        /// Ledger file (JSON array of report export records)
        ledger: PathBuf,
        /// Code/display configuration overriding the bundled one
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the bundle here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the consolidated tumor states of a ledger file
    Resolve {
        /// Ledger file (JSON array of report export records)
        ledger: PathBuf,
    },
    /// Validate a code/display configuration (the bundled one if no file is given)
    CheckConfig {
        /// Configuration file
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("obds=info".parse()?)
                .add_directive("adt=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Process {
            ledger,
            config,
            output,
        }) => {
            let config = CoreConfig::load(config)?;
            let processor = ObservationProcessor::new(&config);
            let ledger = ReportLedger::from_file(&ledger)?;

            match processor.process(&ledger) {
                Some(bundle) => {
                    let json = Bundle::render(&bundle)?;
                    match output {
                        Some(path) => {
                            std::fs::write(&path, json)?;
                            println!(
                                "Wrote bundle {} with {} observations to {}",
                                bundle.id,
                                bundle.len(),
                                path.display()
                            );
                        }
                        None => println!("{json}"),
                    }
                }
                None => eprintln!("No observations produced."),
            }
        }
        Some(Commands::Resolve { ledger }) => {
            let config = CoreConfig::load(None)?;
            let processor = ObservationProcessor::new(&config);
            let ledger = ReportLedger::from_file(&ledger)?;

            let states = processor.resolve(&ledger);
            if states.is_empty() {
                println!("No tumor cases found.");
            }
            for state in &states {
                print_state(state);
            }
        }
        Some(Commands::CheckConfig { config }) => {
            let source = config
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "bundled configuration".into());
            let config = CoreConfig::load(config)?;
            println!("{source} is valid:");
            for category in ObservationCategory::ALL {
                let mapping = config.fhir().category(category);
                println!(
                    "  {:<20} {} ({})",
                    category.slug(),
                    mapping.code.code,
                    mapping.code.display
                );
            }
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

fn print_state(state: &ConsolidatedTumorState) {
    println!("Patient {} / tumor {}", state.patient_ref, state.tumor_id);

    let describe = |provenance: &Provenance| {
        format!(
            "[record {}, report {} v{}, {}]",
            provenance.sequence_id, provenance.report_id, provenance.version, provenance.source
        )
    };

    if let Some(histology) = &state.histology {
        let morphology = histology
            .value
            .morphology_code
            .as_ref()
            .map(|code| code.to_string())
            .unwrap_or_default();
        println!("  histology           {morphology} {}", describe(&histology.provenance));
    }
    if let Some(grading) = &state.grading {
        println!("  grading             {} {}", grading.value.code, describe(&grading.provenance));
    }
    if let Some(staging) = &state.clinical_tnm {
        println!("  clinical TNM        {} {}", staging.value.formula(), describe(&staging.provenance));
    }
    if let Some(staging) = &state.pathological_tnm {
        println!(
            "  pathological TNM    {} {}",
            staging.value.formula(),
            describe(&staging.provenance)
        );
    }
    if let Some(metastasis) = &state.distant_metastasis {
        let sites: Vec<String> = metastasis
            .value
            .sites
            .iter()
            .map(|site| {
                site.localisation
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "unspecified".into())
            })
            .collect();
        println!(
            "  distant metastasis  {} {}",
            sites.join(", "),
            describe(&metastasis.provenance)
        );
    }
    if let Some(vital_status) = &state.vital_status {
        let cause = vital_status
            .value
            .cause_icd
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();
        println!("  death               {cause} {}", describe(&vital_status.provenance));
    }
}
