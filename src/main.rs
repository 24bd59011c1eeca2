use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bill_tracker::{
    analytics, AppConfig, BillPipeline, Category, ExpenseFilter, ExpenseRecord, ExpenseStore,
    ExpenseUpdate, GeminiExtractor, ImageOutcome, NewExpense, SupabaseStore,
};

#[derive(Parser)]
#[command(name = "bill-tracker", version, about = "Extract items from bill photos and track expenses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract items from bill images and save them
    Process {
        /// Bill image files (JPEG/PNG)
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Who made the purchase
        #[arg(long, default_value = "")]
        person: String,
    },
    /// List saved expenses
    List {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        person: Option<String>,
    },
    /// Search expenses by item name
    Search { text: String },
    /// Add one expense manually
    Add {
        #[arg(long)]
        item: String,
        #[arg(long, default_value = "1 piece")]
        quantity: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "Other")]
        category: Category,
        #[arg(long, default_value = "")]
        person: String,
    },
    /// Update fields of a saved expense
    Update {
        id: i64,
        #[arg(long)]
        item: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        person: Option<String>,
    },
    /// Delete a saved expense
    Delete { id: i64 },
    /// Spending report
    Summary {
        /// Limit to the last N days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Write all expenses to a CSV file
    Export { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Fail fast: both credentials are checked before any command runs.
    let config = AppConfig::from_env().context("startup failed")?;
    let store = SupabaseStore::new(&config)?;

    match cli.command {
        Command::Process { images, person } => run_process(&config, &store, &images, &person).await,
        Command::List { from, to, category, person } => {
            let filter = ExpenseFilter { from, to, category, person };
            let records = store.list(&filter).await?;
            print_records(&records);
            Ok(())
        }
        Command::Search { text } => {
            let records = store.search(&text).await?;
            if records.is_empty() {
                println!("No items matching '{text}'.");
            } else {
                print_records(&records);
            }
            Ok(())
        }
        Command::Add { item, quantity, date, amount, category, person } => {
            let expense = NewExpense {
                item,
                quantity,
                date: date.unwrap_or_else(|| Utc::now().date_naive()),
                amount,
                category,
                person,
            };
            // Manual entries pass the same rules as extracted ones.
            if expense.item.trim().is_empty() || !expense.amount.is_finite() || expense.amount < 0.0 {
                anyhow::bail!("item must be non-empty and amount must be a non-negative number");
            }
            let saved = store.insert(expense).await?;
            println!("Added #{}: {} — {:.2}", saved.id, saved.item, saved.amount);
            Ok(())
        }
        Command::Update { id, item, quantity, date, amount, category, person } => {
            let update = ExpenseUpdate { item, quantity, date, amount, category, person };
            match store.update(id, &update).await {
                Ok(saved) => {
                    println!("Updated #{}: {} — {:.2}", saved.id, saved.item, saved.amount);
                    Ok(())
                }
                Err(e) if e.is_not_found() => {
                    println!("{e}. Run `bill-tracker list` to refresh your view.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Delete { id } => {
            match store.delete(id).await {
                Ok(()) => {
                    println!("Deleted #{id}.");
                    Ok(())
                }
                Err(e) if e.is_not_found() => {
                    println!("{e}. Run `bill-tracker list` to refresh your view.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Summary { days } => run_summary(&store, days).await,
        Command::Export { path } => run_export(&store, &path).await,
    }
}

async fn run_process(
    config: &AppConfig,
    store: &SupabaseStore,
    paths: &[PathBuf],
    person: &str,
) -> Result<()> {
    let (images, intake_failures) = bill_tracker::load_images(paths);
    for failure in &intake_failures {
        println!("✗ {failure}");
    }
    if images.is_empty() {
        anyhow::bail!("no usable images in the batch");
    }

    let extractor = GeminiExtractor::new(config)?;
    let pipeline = BillPipeline::new(&extractor, store);
    let outcome = pipeline
        .process_images(images, person, Utc::now().date_naive())
        .await;

    for report in &outcome.reports {
        match &report.outcome {
            ImageOutcome::Processed { saved, skipped, store_failures } => {
                println!("✓ {}: saved {} item(s)", report.label, saved.len());
                for record in saved {
                    println!("    #{} {} — {:.2} [{}]", record.id, record.item, record.amount, record.category);
                }
                for notice in skipped {
                    println!("    {notice}");
                }
                for failure in store_failures {
                    println!("    not saved: {failure}");
                }
            }
            ImageOutcome::Failed(e) => println!("✗ {}: {e}", report.label),
        }
    }

    let total_images = outcome.reports.len();
    let failed = outcome.failed_images() + intake_failures.len();
    println!(
        "\nProcessed {} of {} image(s); saved {} item(s).",
        total_images - outcome.failed_images(),
        total_images + intake_failures.len(),
        outcome.total_saved()
    );
    if failed > 0 && outcome.total_saved() > 0 {
        println!("Partial success: the saved items above are safe to review with `bill-tracker list`.");
    }
    Ok(())
}

async fn run_summary(store: &SupabaseStore, days: Option<u32>) -> Result<()> {
    let today = Utc::now().date_naive();
    let all = store.list(&ExpenseFilter::default()).await?;
    let records = match days {
        Some(days) => analytics::within_last_days(&all, days, today),
        None => all,
    };

    if records.is_empty() {
        println!("No expenses found. Start by processing some bills!");
        return Ok(());
    }

    println!("Total: {:.2} across {} item(s)", analytics::total_amount(&records), records.len());
    println!("This month: {:.2}", analytics::current_month_total(&records, today));

    println!("\nBy category:");
    for (category, total) in analytics::totals_by_category(&records) {
        if total > 0.0 {
            println!("  {category:<14} {total:>10.2}");
        }
    }

    println!("\nBy person:");
    for (person, total) in analytics::totals_by_person(&records) {
        let name = if person.is_empty() { "(unspecified)" } else { person.as_str() };
        println!("  {name:<14} {total:>10.2}");
    }

    println!("\nBy month:");
    for (month, total) in analytics::monthly_totals(&records) {
        println!("  {month:<14} {total:>10.2}");
    }
    Ok(())
}

async fn run_export(store: &SupabaseStore, path: &std::path::Path) -> Result<()> {
    let records = store.list(&ExpenseFilter::default()).await?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("cannot write {}", path.display()))?;

    writer.write_record(["id", "item", "quantity", "date", "amount", "category", "person", "created_at"])?;
    for record in &records {
        writer.write_record([
            record.id.to_string(),
            record.item.clone(),
            record.quantity.clone(),
            record.date.to_string(),
            format!("{:.2}", record.amount),
            record.category.to_string(),
            record.person.clone(),
            record.created_at.to_rfc3339(),
        ])?;
    }
    writer.flush()?;
    println!("Exported {} record(s) to {}", records.len(), path.display());
    Ok(())
}

fn print_records(records: &[ExpenseRecord]) {
    if records.is_empty() {
        println!("No expenses found. Start by processing some bills!");
        return;
    }
    println!(
        "{:>6}  {:<24} {:<10} {:<10} {:>10}  {:<14} {}",
        "id", "item", "quantity", "date", "amount", "category", "person"
    );
    for r in records {
        println!(
            "{:>6}  {:<24} {:<10} {:<10} {:>10.2}  {:<14} {}",
            r.id, r.item, r.quantity, r.date.to_string(), r.amount, r.category.to_string(), r.person
        );
    }
    println!("\n{} item(s), total {:.2}", records.len(), records.iter().map(|r| r.amount).sum::<f64>());
}
