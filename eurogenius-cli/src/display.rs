use chrono::{Datelike, NaiveDate, Weekday};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};

use eurogenius_db::models::Draw;
use eurogenius_stats::Origin;
use eurogenius_stats::catalog::{CatalogView, EntityView, PoolView};
use eurogenius_stats::cooccurrence::TupleFrequency;
use eurogenius_stats::engine::Dashboard;
use eurogenius_stats::frequency::{EntityFrequency, FrequencyTable, PositionalCount};
use eurogenius_stats::gaps::{GapAnalysis, GapRecord};
use eurogenius_stats::generator::Combination;
use eurogenius_stats::hotcold::{Heat, WindowedClasses, WindowedHotCold};
use eurogenius_stats::provider::SyncReport;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn join(values: &[u8]) -> String {
    values
        .iter()
        .map(|v| format!("{:2}", v))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn heat_cell(heat: Heat) -> Cell {
    let color = match heat {
        Heat::Hot => Color::Green,
        Heat::Cold => Color::Red,
        Heat::Neutral => Color::White,
    };
    Cell::new(heat.to_string()).fg(color)
}

pub fn display_origin(origin: Origin) {
    if origin == Origin::Simulated {
        println!("⚠️  Base indisponible : valeurs théoriques simulées\n");
    }
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["#", "Date", "Boules", "Étoiles", "Jackpot"]);
    for draw in draws {
        let jackpot = match draw.jackpot {
            Some(amount) => format!("{:.2} €", amount),
            None => "—".to_string(),
        };
        table.add_row(vec![
            draw.id.to_string(),
            draw.draw_date.format("%d/%m/%Y").to_string(),
            join(&draw.numbers),
            join(&draw.stars),
            jackpot,
        ]);
    }
    println!("{table}");
}

pub fn display_next_draw(date: &NaiveDate) {
    let day = match date.weekday() {
        Weekday::Tue => "mardi",
        Weekday::Fri => "vendredi",
        _ => "le",
    };
    println!("Prochain tirage : {} {}", day, date.format("%d/%m/%Y"));
}

pub fn display_sync_report(report: &SyncReport) {
    println!("Import terminé :");
    println!("  Tirages lus       : {}", report.fetched);
    println!("  Insérés           : {}", report.inserted);
    println!("  Doublons ignorés  : {}", report.skipped);
    if report.rejected > 0 {
        println!("  Rejetés           : {}", report.rejected);
    }
    if report.rebuilt {
        println!("  Agrégats recalculés (tirages antérieurs à l'historique)");
    }
}

fn frequency_rows(title: &str, rows: &[EntityFrequency]) {
    println!("── {title} ──");
    let mut table = new_table(vec!["Numéro", "Sorties", "Fréquence", "%"]);
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));
    for row in &sorted {
        table.add_row(vec![
            format!("{:2}", row.value),
            row.count.to_string(),
            format!("{:.4}", row.frequency),
            format!("{:.2}", row.percentage),
        ]);
    }
    println!("{table}");
}

pub fn display_frequencies(table: &FrequencyTable) {
    println!("\n📊 Fréquences sur {} tirages\n", table.window_size);
    frequency_rows("Boules (1-50)", &table.numbers);
    println!();
    frequency_rows("Étoiles (1-12)", &table.stars);
}

pub fn display_positions(rows: &[PositionalCount]) {
    println!("\n📍 Répartition par position (boules triées)\n");
    let mut table = new_table(vec!["Numéro", "P1", "P2", "P3", "P4", "P5"]);
    for row in rows.iter().filter(|r| r.positions.iter().any(|&c| c > 0)) {
        let mut cells = vec![format!("{:2}", row.number)];
        cells.extend(row.positions.iter().map(|c| c.to_string()));
        table.add_row(cells);
    }
    println!("{table}");
}

fn gap_rows(title: &str, records: &[GapRecord]) {
    println!("── {title} ──");
    let mut table = new_table(vec!["Numéro", "Retard", "Écart moyen", "Écart max", "Sorties", "Ratio"]);
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.current_gap.cmp(&a.current_gap).then(a.value.cmp(&b.value)));
    for record in &sorted {
        table.add_row(vec![
            format!("{:2}", record.value),
            record.current_gap.to_string(),
            format!("{:.2}", record.average_gap),
            record.max_gap.to_string(),
            record.appearances.to_string(),
            record.ratio.map(|r| format!("{:.2}", r)).unwrap_or_else(|| "—".into()),
        ]);
    }
    println!("{table}");
}

pub fn display_gaps(analysis: &GapAnalysis) {
    println!("\n⏳ Retards sur {} tirages\n", analysis.window_size);
    gap_rows("Boules (1-50)", &analysis.numbers);
    println!();
    gap_rows("Étoiles (1-12)", &analysis.stars);
}

pub fn display_tuples(title: &str, tuples: &[TupleFrequency]) {
    println!("\n🔗 {title}\n");
    if tuples.is_empty() {
        println!("Aucune combinaison.");
        return;
    }
    let mut table = new_table(vec!["#", "Numéros", "Sorties", "%"]);
    for (i, tuple) in tuples.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            join(&tuple.numbers),
            tuple.count.to_string(),
            format!("{:.2}", tuple.percentage),
        ]);
    }
    println!("{table}");
}

fn classes_row(table: &mut Table, label: &str, classes: &WindowedClasses) {
    table.add_row(vec![
        Cell::new(label),
        Cell::new(format!("≥ {}", classes.threshold)),
        Cell::new(join(&classes.hot)).fg(Color::Green),
        Cell::new(join(&classes.cold)).fg(Color::Red),
    ]);
}

pub fn display_hot_cold(result: &WindowedHotCold) {
    println!(
        "\n🌡️  Chauds / froids ({}, {} tirages)\n",
        result.period, result.window_size
    );
    let mut table = new_table(vec!["", "Seuil", "Chauds", "Froids (0 sortie)"]);
    classes_row(&mut table, "Boules", &result.numbers);
    classes_row(&mut table, "Étoiles", &result.stars);
    println!("{table}");
}

fn entity_rows(title: &str, views: &[EntityView]) {
    println!("── {title} ──");
    let mut table = new_table(vec!["Numéro", "Sorties", "%", "Retard", "Écart moyen", "Écart max", "Tag"]);
    for view in views {
        table.add_row(vec![
            Cell::new(format!("{:2}", view.value)),
            Cell::new(view.frequency.to_string()),
            Cell::new(format!("{:.2}", view.percentage)),
            Cell::new(view.current_gap.to_string()),
            Cell::new(format!("{:.2}", view.average_gap)),
            Cell::new(view.max_gap.to_string()),
            heat_cell(view.heat),
        ]);
    }
    println!("{table}");
}

fn class_summary(pool: &PoolView) {
    let hot: Vec<u8> = pool.classes.hot.iter().map(|c| c.value).collect();
    let cold: Vec<u8> = pool.classes.cold.iter().map(|c| c.value).collect();
    println!("  Moyenne : {:.2}", pool.classes.mean);
    println!("  Chauds  : {}", join(&hot));
    println!("  Froids  : {}", join(&cold));
}

pub fn display_catalog(view: &CatalogView) {
    println!("\n📚 Statistiques cumulées ({} tirages)\n", view.draw_count);
    entity_rows("Boules (1-50)", &view.numbers.by_frequency);
    class_summary(&view.numbers);
    println!();
    entity_rows("Étoiles (1-12)", &view.stars.by_frequency);
    class_summary(&view.stars);
}

pub fn display_combinations(combinations: &[Combination]) {
    println!("\n🎲 Grilles suggérées\n");
    let mut table = new_table(vec!["#", "Boules", "Étoiles", "Stratégie", "Confiance"]);
    for (i, combination) in combinations.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            join(&combination.numbers),
            join(&combination.stars),
            combination.strategy.to_string(),
            format!("{:.2}", combination.confidence),
        ]);
    }
    println!("{table}");
}

pub fn display_dashboard(dashboard: &Dashboard, top: usize) {
    let catalog = &dashboard.catalog;
    println!("\n🏠 Tableau de bord ({} tirages)\n", catalog.draw_count);

    let top_numbers: Vec<EntityView> = catalog.numbers.by_frequency.iter().take(top).cloned().collect();
    entity_rows("Boules les plus sorties", &top_numbers);
    let overdue: Vec<EntityView> = catalog.numbers.by_gap.iter().take(top).cloned().collect();
    entity_rows("Boules en retard", &overdue);
    entity_rows("Étoiles", &catalog.stars.by_frequency);

    display_tuples("Paires les plus fréquentes", &dashboard.top_pairs);
    display_tuples("Triplets les plus fréquents", &dashboard.top_triplets);
}
