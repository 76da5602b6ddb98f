mod display;
mod logging;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use eurogenius_db::db::{SqliteStore, db_path};
use eurogenius_db::models::{NewDraw, Window, validate_draw};
use eurogenius_stats::generator::RngSource;
use eurogenius_stats::ingest::RecordOutcome;
use eurogenius_stats::provider::{CsvProvider, DrawProvider, JsonProvider};
use eurogenius_stats::{Constraints, Period, Report, StatsConfig, StatsEngine, Strategy};

use crate::display::{
    display_catalog, display_combinations, display_dashboard, display_draws, display_frequencies,
    display_gaps, display_hot_cold, display_next_draw, display_origin, display_positions,
    display_sync_report, display_tuples,
};

#[derive(Parser)]
#[command(name = "eurogenius", about = "Statistiques et grilles EuroMillions")]
struct Cli {
    /// Base SQLite
    #[arg(long, global = true, env = "EUROGENIUS_DB")]
    db: Option<PathBuf>,

    /// Fichier de configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sortie JSON au lieu des tableaux
    #[arg(long, global = true)]
    json: bool,

    /// Journaux au format JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer des tirages (export CSV FDJ ou JSON)
    Import {
        /// Chemin vers le fichier
        #[arg(short, long, default_value = "assets/euromillions_202002.csv")]
        file: PathBuf,

        /// Nombre maximal de tirages récents à importer
        #[arg(short, long, default_value = "10000")]
        limit: usize,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages
    List {
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Ajouter un tirage manuellement
    Add,

    /// Fréquences des boules et étoiles
    Frequencies {
        /// Fenêtre d'analyse (0 = tout l'historique)
        #[arg(short, long, default_value = "0")]
        window: u32,
    },

    /// Répartition des boules par position
    Positions {
        #[arg(short, long, default_value = "0")]
        window: u32,
    },

    /// Retards et écarts
    Gaps {
        #[arg(short, long, default_value = "0")]
        window: u32,
    },

    /// Paires les plus fréquentes
    Pairs {
        #[arg(short, long, default_value = "0")]
        window: u32,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Triplets les plus fréquents
    Triplets {
        #[arg(short, long, default_value = "0")]
        window: u32,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Numéros chauds et froids sur une période
    HotCold {
        #[arg(short, long, default_value = "recent")]
        period: Period,
    },

    /// Statistiques cumulées et classement par rapport à la moyenne
    Catalog,

    /// Générer des grilles
    Generate {
        #[arg(short, long, default_value = "balanced")]
        strategy: Strategy,

        /// Boules imposées
        #[arg(long, value_delimiter = ',')]
        include: Vec<u8>,

        /// Boules exclues
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<u8>,

        /// Étoiles imposées
        #[arg(long, value_delimiter = ',')]
        include_stars: Vec<u8>,

        /// Étoiles exclues
        #[arg(long, value_delimiter = ',')]
        exclude_stars: Vec<u8>,

        /// Nombre de grilles
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Tableau de bord
    Dashboard,

    /// Date du prochain tirage
    Next,

    /// Recalculer tous les agrégats depuis l'historique
    Rebuild,
}

fn window(last: u32) -> Window {
    if last == 0 { Window::All } else { Window::Last(last) }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_json);

    let config = match &cli.config {
        Some(path) => StatsConfig::load(path)?,
        None => StatsConfig::default(),
    };
    let path = cli.db.clone().unwrap_or_else(db_path);

    if let Command::DbPath = cli.command {
        println!("{}", path.display());
        return Ok(());
    }

    tracing::debug!(db = %path.display(), "opening store");
    let store = SqliteStore::open(&path, config.store_timeout())
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    let engine = StatsEngine::new(Arc::new(store), config);
    let top = engine.config().default_top_k;
    let json = cli.json;

    match cli.command {
        Command::Import { file, limit } => cmd_import(&engine, &file, limit, json),
        Command::DbPath => Ok(()),
        Command::List { last } => cmd_list(&engine, last, json),
        Command::Add => cmd_add(&engine),
        Command::Frequencies { window: w } => {
            emit(json, &engine.frequencies(window(w))?, display_frequencies)
        }
        Command::Positions { window: w } => {
            emit(json, &engine.positions(window(w))?, |rows| display_positions(rows))
        }
        Command::Gaps { window: w } => emit(json, &engine.gaps(window(w))?, display_gaps),
        Command::Pairs { window: w, limit } => {
            let report = engine.top_pairs(window(w), limit.unwrap_or(top))?;
            emit(json, &report, |pairs| display_tuples("Paires les plus fréquentes", pairs))
        }
        Command::Triplets { window: w, limit } => {
            let report = engine.top_triplets(window(w), limit.unwrap_or(top))?;
            emit(json, &report, |triplets| {
                display_tuples("Triplets les plus fréquents", triplets)
            })
        }
        Command::HotCold { period } => emit(json, &engine.hot_cold(period)?, display_hot_cold),
        Command::Catalog => emit(json, &engine.catalog()?, display_catalog),
        Command::Generate {
            strategy,
            include,
            exclude,
            include_stars,
            exclude_stars,
            count,
            seed,
        } => {
            let constraints = Constraints {
                include_numbers: include,
                exclude_numbers: exclude,
                include_stars,
                exclude_stars,
            };
            let mut rng = RngSource::from_seed_option(seed);
            let report = engine.generate(strategy, &constraints, count, &mut rng)?;
            emit(json, &report, |combinations| display_combinations(combinations))
        }
        Command::Dashboard => {
            let top = engine.config().dashboard_top_k;
            emit(json, &engine.dashboard()?, |dashboard| display_dashboard(dashboard, top))
        }
        Command::Next => {
            let today = chrono::Local::now().date_naive();
            emit(json, &engine.next_draw_date(today)?, display_next_draw)
        }
        Command::Rebuild => {
            let replayed = engine.rebuild()?;
            println!("Agrégats recalculés sur {} tirages.", replayed);
            Ok(())
        }
    }
}

fn emit<T: Serialize>(json: bool, report: &Report<T>, render: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        display_origin(report.origin);
        render(&report.data);
    }
    Ok(())
}

fn provider_for(file: &Path) -> Box<dyn DrawProvider> {
    match file.extension().and_then(|e| e.to_str()) {
        Some("json") => Box::new(JsonProvider::new(file)),
        _ => Box::new(CsvProvider::new(file)),
    }
}

fn cmd_import(engine: &StatsEngine, file: &Path, limit: usize, json: bool) -> Result<()> {
    let provider = provider_for(file);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let report = engine.sync(provider.as_ref(), limit, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display_sync_report(&report);
    }
    Ok(())
}

fn cmd_list(engine: &StatsEngine, last: u32, json: bool) -> Result<()> {
    if engine.draw_count()? == 0 {
        println!("Base vide. Lancez d'abord : eurogenius import");
        return Ok(());
    }
    let draws = engine.draws(Window::Last(last))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&draws)?);
    } else {
        display_draws(&draws);
    }
    Ok(())
}

fn cmd_add(engine: &StatsEngine) -> Result<()> {
    println!("Ajout d'un tirage manuellement\n");

    let raw_date = prompt("Date (JJ/MM/AAAA) : ")?;
    let date = NaiveDate::parse_from_str(&raw_date, "%d/%m/%Y")
        .with_context(|| format!("Format de date invalide: '{}'", raw_date))?;

    let numbers = prompt_numbers()?;
    let stars = prompt_stars()?;
    let jackpot = prompt("Jackpot en € (vide si inconnu) : ")?;
    let jackpot = if jackpot.is_empty() {
        None
    } else {
        Some(
            jackpot
                .replace(',', ".")
                .parse::<f64>()
                .with_context(|| format!("Montant invalide: '{}'", jackpot))?,
        )
    };

    let draw = NewDraw::new(date, numbers, stars, jackpot)?;
    println!(
        "\nTirage à insérer : {} | {:?} | {:?}",
        draw.draw_date.format("%d/%m/%Y"),
        draw.numbers,
        draw.stars
    );

    let confirm = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    if confirm.trim().to_lowercase() != "o" {
        println!("Insertion annulée.");
        return Ok(());
    }
    match engine.record_draw(&draw)? {
        RecordOutcome::Inserted(stored) => {
            println!("Tirage inséré avec succès.");
            display_draws(&[stored]);
        }
        RecordOutcome::Backfilled(stored) => {
            println!("Tirage antérieur inséré, agrégats recalculés sur tout l'historique.");
            display_draws(&[stored]);
        }
        RecordOutcome::Duplicate(_) => println!("Ce tirage existe déjà (doublon ignoré)."),
    }
    Ok(())
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    Ok(input.trim().to_string())
}

fn parse_values(input: &str) -> Option<Vec<u8>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u8>().ok())
        .collect()
}

fn prompt_numbers() -> Result<[u8; 5]> {
    for _ in 0..3 {
        let input = prompt("5 boules (séparées par des espaces, 1-50) : ")?;
        match parse_values(&input) {
            Some(v) if v.len() == 5 => {
                let arr = [v[0], v[1], v[2], v[3], v[4]];
                if validate_draw(&arr, &[1, 2]).is_ok() {
                    return Ok(arr);
                }
                println!("Numéros invalides (1-50, pas de doublons). Réessayez.");
            }
            _ => println!("Entrez exactement 5 numéros. Réessayez."),
        }
    }
    bail!("Trop de saisies invalides")
}

fn prompt_stars() -> Result<[u8; 2]> {
    for _ in 0..3 {
        let input = prompt("2 étoiles (séparées par un espace, 1-12) : ")?;
        match parse_values(&input) {
            Some(v) if v.len() == 2 => {
                let arr = [v[0], v[1]];
                if validate_draw(&[1, 2, 3, 4, 5], &arr).is_ok() {
                    return Ok(arr);
                }
                println!("Étoiles invalides (1-12, pas de doublons). Réessayez.");
            }
            _ => println!("Entrez exactement 2 numéros. Réessayez."),
        }
    }
    bail!("Trop de saisies invalides")
}
