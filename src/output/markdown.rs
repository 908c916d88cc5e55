//! Markdown report generation
//!
//! This module renders a human-readable market report: the last run, a
//! ranked product table and per-category totals.

use crate::output::profit::{format_margin_eur, format_margin_percent, ProfitCalculator};
use crate::output::traits::{MarketSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report for `summary` to `output_path`
///
/// # Arguments
///
/// * `summary` - The market summary data
/// * `calculator` - Fee model for the net margin column
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_report(
    summary: &MarketSummary,
    calculator: &ProfitCalculator,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_report(summary, calculator);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a market summary as markdown
pub fn format_markdown_report(summary: &MarketSummary, calculator: &ProfitCalculator) -> String {
    let mut md = String::new();

    md.push_str("# Resale-Scout Market Report\n\n");

    // Summary block
    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- **Generated**: {}\n",
        summary.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    md.push_str(&format!(
        "- **Window**: sales since {}\n",
        summary.window_start.format("%Y-%m-%d")
    ));
    md.push_str(&format!("- **Products**: {}\n", summary.total_products()));
    md.push_str(&format!("- **Sales**: {}\n", summary.total_sales()));
    md.push_str(&format!(
        "- **Volume**: {:.2}€\n",
        summary.total_volume_eur()
    ));
    md.push_str(&format!(
        "- **Above MSRP**: {:.1}% of ranked products\n",
        summary.profitable_rate()
    ));
    md.push_str(&format!(
        "- **Fee model**: {:.0}% of sale price\n\n",
        calculator.fee_rate() * 100.0
    ));

    if let Some(run) = &summary.last_run {
        md.push_str("## Last Run\n\n");
        md.push_str(&format!("- **Run ID**: {}\n", run.id));
        md.push_str(&format!("- **Started**: {}\n", run.started_at.to_rfc3339()));
        if let Some(completed) = run.completed_at {
            let seconds = (completed - run.started_at).num_seconds();
            md.push_str(&format!("- **Completed**: {}\n", completed.to_rfc3339()));
            md.push_str(&format!("- **Duration**: {} seconds\n", seconds));
        }
        md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
        if let Some(query) = &run.search_query {
            md.push_str(&format!("- **Query**: {}\n", query));
        }
        md.push_str(&format!(
            "- **Recognized**: {} products, {} sales\n",
            run.products_count, run.sales_count
        ));
        if let Some(error) = &run.error_message {
            md.push_str(&format!("- **Error**: {}\n", error));
        }
        if let Some(hash) = &run.config_hash {
            md.push_str(&format!("- **Config Hash**: {}\n", hash));
        }
        md.push('\n');
    }

    // Ranked products
    md.push_str("## Top Products\n\n");
    if summary.products.is_empty() {
        md.push_str("No products with sales in this window.\n\n");
    } else {
        md.push_str(
            "| # | Product | Category | Sales | Avg | Min | Max | MSRP | Margin | Net | Tier |\n",
        );
        md.push_str(
            "|---|---------|----------|-------|-----|-----|-----|------|--------|-----|------|\n",
        );

        for (i, stat) in summary.products.iter().enumerate() {
            let msrp = stat
                .msrp
                .map(|m| format!("{:.2}€", m))
                .unwrap_or_else(|| "N/A".to_string());
            let net = if stat.has_msrp() {
                format_margin_eur(Some(calculator.for_stats(stat).net_margin_eur))
            } else {
                "N/A".to_string()
            };

            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.2}€ | {:.2}€ | {:.2}€ | {} | {} | {} | {} |\n",
                i + 1,
                escape_cell(&stat.canonical_name),
                stat.category,
                stat.sales_count,
                stat.avg_price,
                stat.min_price,
                stat.max_price,
                msrp,
                format_margin_percent(stat.margin_percent),
                net,
                stat.profitability(),
            ));
        }
        md.push('\n');
    }

    // Category totals
    if !summary.category_totals.is_empty() {
        md.push_str("## By Category\n\n");
        md.push_str("| Category | Products | Sales | Volume |\n");
        md.push_str("|----------|----------|-------|--------|\n");

        for (category, totals) in &summary.category_totals {
            md.push_str(&format!(
                "| {} | {} | {} | {:.2}€ |\n",
                category, totals.products, totals.sales, totals.volume_eur
            ));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}
