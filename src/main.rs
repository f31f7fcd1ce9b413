// =============================================================================
// METASYNTH — Point d'entrée en ligne de commande
// =============================================================================
//
//   metasynth demo
//       le scénario Order/Customer : raffinement, puis exécution des
//       règles sur un petit graphe d'objets
//
//   metasynth synthesize --source S.json --target T.json [--config C.json] [--json]
//       mode énumération : meilleur plan entre deux catalogues
//
//   metasynth refine --metamodel M.json [--rules R.txt] [--config C.json] [--json]
//       mode raffinement : un métamodèle vers sa copie
//
// Les catalogues sont lus au format CatalogSpec (JSON). Les traces vont
// sur stderr ; `-v` passe au niveau debug, RUST_LOG est respecté.
//
// =============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use metasynth::config::SynthesisConfig;
use metasynth::core::catalog::{Cardinality, Catalog, CatalogSpec, Side};
use metasynth::core::execute::execute;
use metasynth::core::expr::UseCase;
use metasynth::core::instance::Instance;
use metasynth::core::refine::refine;
use metasynth::core::score::{select_best_plan, PlanReport};
use metasynth::core::synthesize::synthesize;
use metasynth::core::typecheck::typecheck_use_case;
use metasynth::core::typeside::{Type, Value};

#[derive(Parser, Debug)]
#[command(name = "metasynth")]
#[command(about = "Synthèse de correspondances entre métamodèles")]
struct Args {
    /// Traces détaillées (niveau debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scénario Order/Customer de bout en bout
    Demo,

    /// Meilleur plan et contraintes entre deux catalogues
    Synthesize {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Sortie JSON au lieu du texte
        #[arg(long)]
        json: bool,
    },

    /// Raffinement d'un métamodèle, avec un module de règles optionnel
    Refine {
        #[arg(long)]
        metamodel: PathBuf,
        #[arg(long)]
        rules: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

/// Ce que `--json` imprime
#[derive(Serialize)]
struct Output<'a> {
    plan: PlanReport,
    use_case: &'a UseCase,
    diagnostics: Vec<String>,
    type_errors: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match args.command {
        Command::Demo => demo(),
        Command::Synthesize { source, target, config, json } => run_synthesize(&source, &target, config.as_deref(), json),
        Command::Refine { metamodel, rules, config, json } => run_refine(&metamodel, rules.as_deref(), config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<SynthesisConfig> {
    match path {
        Some(path) => SynthesisConfig::load(path).with_context(|| format!("configuration {}", path.display())),
        None => Ok(SynthesisConfig::default()),
    }
}

fn load_catalog(path: &Path, side: Side) -> Result<Catalog> {
    let text = fs::read_to_string(path).with_context(|| format!("lecture de {}", path.display()))?;
    let spec: CatalogSpec = serde_json::from_str(&text).with_context(|| format!("catalogue {}", path.display()))?;
    Ok(Catalog::from_spec(&spec, side)?)
}

fn print_outcome(output: &Output<'_>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
        return Ok(());
    }
    println!("{}\n", output.plan);
    println!("{}\n", output.use_case);
    for diagnostic in &output.diagnostics {
        println!("! {}", diagnostic);
    }
    for error in &output.type_errors {
        println!("✗ {}", error);
    }
    Ok(())
}

// =============================================================================
// Mode énumération
// =============================================================================

fn run_synthesize(source: &Path, target: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let source = load_catalog(source, Side::Source)?;
    let target = load_catalog(target, Side::Target)?;

    let best = select_best_plan(&source, &target, config.tie_break)?;
    info!(score = best.score, candidates = best.candidates, "plan choisi");
    let mut use_case = synthesize(&source, &target, &best.plan)?.into_use_case("Correspondence");
    let type_errors = if config.typecheck {
        typecheck_use_case(&mut use_case, &source, &target)
    } else {
        Vec::new()
    };

    let output = Output {
        plan: best.plan.report(&source, &target),
        use_case: &use_case,
        diagnostics: Vec::new(),
        type_errors: type_errors.iter().map(|e| e.to_string()).collect(),
    };
    print_outcome(&output, json)
}

// =============================================================================
// Mode raffinement
// =============================================================================

fn run_refine(metamodel: &Path, rules: Option<&Path>, config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let metamodel = load_catalog(metamodel, Side::Source)?;
    let rules = match rules {
        Some(path) => Some(fs::read_to_string(path).with_context(|| format!("lecture de {}", path.display()))?),
        None => None,
    };

    let outcome = refine(&metamodel, rules.as_deref(), &config)?;
    let output = Output {
        plan: outcome.plan.report(&outcome.source, &outcome.target),
        use_case: &outcome.use_case,
        diagnostics: outcome.diagnostics.clone(),
        type_errors: outcome.type_errors.iter().map(|e| e.to_string()).collect(),
    };
    print_outcome(&output, json)
}

// =============================================================================
// Démonstration
// =============================================================================

const DEMO_RULES: &str = "
module Business
  -- un montant n'est jamais négatif
  IN$Order :: true => total >= 0.0 ;
  -- les grosses commandes ont un client
  IN$Order :: total > 100.0 => customer.$id /= null ;
end
";

fn demo() -> Result<()> {
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   METASYNTH — Synthèse de correspondances        ║");
    println!("╚══════════════════════════════════════════════════╝\n");

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 1 : le métamodèle
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 1 : Métamodèle ═══\n");

    let mut shop = Catalog::new("Shop", Side::Source);
    shop.add_entity("Order")
        .add_entity("Customer")
        .add_attribute("Order", "total", Type::Real)
        .add_attribute("Customer", "name", Type::String)
        .add_association("Order", "customer", "Customer", Cardinality::Many, Cardinality::One);
    println!("{}\n", shop);

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 2 : raffinement (copies IN$ / OUT$, plan, règles)
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 2 : Raffinement ═══\n");

    let outcome = refine(&shop, Some(DEMO_RULES), &SynthesisConfig::default())?;
    println!("{}\n", outcome.plan.report(&outcome.source, &outcome.target));
    println!("{}\n", outcome.use_case);
    if outcome.type_errors.is_empty() {
        println!("✓ Toutes les contraintes sont bien typées\n");
    }
    for error in &outcome.type_errors {
        println!("✗ {}", error);
    }

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 3 : exécution sur un graphe d'objets
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 3 : Exécution ═══\n");

    let source = &outcome.source;
    let mut data = Instance::new("ShopData", source);
    let ada = data.insert(source, "IN$Customer", &[
        ("$id", Value::String("c1".into())),
        ("name", Value::String("Ada".into())),
    ]);
    let big = data.insert(source, "IN$Order", &[
        ("$id", Value::String("o1".into())),
        ("total", Value::Real(250.0)),
    ]);
    data.insert(source, "IN$Order", &[
        ("$id", Value::String("o2".into())),
        ("total", Value::Real(180.0)),
    ]);
    data.link(big, "customer", ada);
    println!("{}", data);

    let run = execute(&outcome.use_case, source, &outcome.target, &data)?;
    println!("{}", run.target);
    println!(
        "{} règles déclenchées, {} objets créés, {} affectations",
        run.report.fired, run.report.created, run.report.assigned
    );
    for violation in &run.report.violations {
        println!("✗ {}", violation);
    }
    Ok(())
}
