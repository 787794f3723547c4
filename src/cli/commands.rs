use crate::config::{load_config, load_rows};
use crate::core::report::{Report, ReportCategory};
use crate::core::{AggregationType, Analysis, AnalysisReport, ReportOptions};
use crate::error::{AnalysisError, AnalysisResult};
use colored::Colorize;
use std::path::PathBuf;

const TOTAL_LABEL: &str = "Total";
const EMPTY_CATEGORY_LABEL: &str = "(empty)";

/// Execute the validate command
pub fn validate(file: PathBuf) -> AnalysisResult<()> {
    println!("{}", "✅ Validating analysis".bold().green());
    println!("   File: {}\n", file.display());

    let config = load_config(&file)?;
    let analysis = match Analysis::new(&config) {
        Ok(analysis) => analysis,
        Err(e) => {
            println!("{}", format!("❌ Analysis could not be loaded: {e}").bold().red());
            return Err(e);
        }
    };

    println!(
        "   Found {} tables, {} fields, {} values, {} columns",
        config.tables.len(),
        config.fields.len(),
        analysis.values().len(),
        analysis.result_columns().len()
    );

    let tables: Vec<String> = analysis
        .significant_query_result_table_indices()
        .iter()
        .map(|index| index.to_string())
        .collect();
    println!("   Query tables: {}", tables.join(", ").cyan());

    for column in analysis.result_columns() {
        println!(
            "      {} ({})",
            column.label().bright_blue(),
            column.aggregation_type().name()
        );
    }

    let problems = analysis.validate();
    println!();
    if problems.is_empty() {
        println!("{}", "✅ All value formulas are valid!".bold().green());
        return Ok(());
    }

    println!(
        "{}",
        format!("❌ Found {} invalid value formulas!", problems.len())
            .bold()
            .red()
    );
    for problem in &problems {
        println!("   {}", problem.red());
    }

    Err(AnalysisError::Validation(format!(
        "{} value formula(s) could not be parsed",
        problems.len()
    )))
}

/// Execute the report command
pub fn report(
    config: PathBuf,
    rows: PathBuf,
    json: bool,
    report_mode: bool,
    max_steps: usize,
    verbose: bool,
) -> AnalysisResult<()> {
    let analysis = Analysis::new(&load_config(&config)?)?;
    let rows = load_rows(&rows)?;

    let options = ReportOptions {
        max_steps,
        report_mode,
    };
    let report = AnalysisReport::new(&analysis)
        .with_options(options)
        .compute(&rows);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", format!("📊 {}", report.analysis).bold().green());
    if verbose {
        println!(
            "   {} rows, {} stepping rounds",
            report.rows,
            report.steps
        );
    }
    println!();

    print_table(&report);

    if report.pending_dropped > 0 {
        println!(
            "\n{}",
            format!(
                "⚠️  {} results were still pending after {} steps",
                report.pending_dropped, report.steps
            )
            .yellow()
        );
    }

    Ok(())
}

/// Execute the aggregations command
pub fn aggregations() -> AnalysisResult<()> {
    println!("{}", "🧮 Aggregation types".bold().green());
    for aggregation in AggregationType::available_types() {
        println!(
            "   {:<8} {}",
            aggregation.name().bright_blue().bold(),
            aggregation.label()
        );
    }
    println!(
        "\n   {}",
        "Text values concatenate unless their aggregation is static".cyan()
    );
    Ok(())
}

fn print_table(report: &Report) {
    let mut lines: Vec<Vec<String>> = Vec::new();

    let mut header = vec![String::new()];
    header.extend(report.columns.iter().map(|c| c.label.clone()));
    lines.push(header);

    for category in &report.categories {
        let key = if category.key.is_empty() {
            EMPTY_CATEGORY_LABEL
        } else {
            category.key.as_str()
        };
        lines.push(row_cells(key, category));
        for x in &category.x_categories {
            let mut cells = vec![format!("  {}", x.key)];
            cells.extend(x.values.iter().map(|v| v.display.clone()));
            lines.push(cells);
        }
    }
    lines.push(row_cells(TOTAL_LABEL, &report.total));

    let widths: Vec<usize> = (0..lines[0].len())
        .map(|i| {
            lines
                .iter()
                .map(|line| line.get(i).map_or(0, |cell| cell.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let last = lines.len() - 1;
    for (index, line) in lines.iter().enumerate() {
        let text = line
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                if i == 0 {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ");

        if index == 0 || index == last {
            println!("   {}", text.bold());
        } else {
            println!("   {}", text);
        }
    }
}

fn row_cells(key: &str, category: &ReportCategory) -> Vec<String> {
    let mut cells = vec![key.to_string()];
    cells.extend(category.values.iter().map(|v| v.display.clone()));
    cells
}
