use super::ui;
use crate::core::{BASE_CURRENCY, CurrencyCode, CurrencyKind, RateCache, RateSnapshot};
use crate::scheduler::{CycleOutcome, RateUpdateScheduler};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::Cell;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn freshness_label(snapshot: &RateSnapshot, max_age: Duration, now: DateTime<Utc>) -> String {
    let age = snapshot.age_at(now);
    let age_text = format!("{}m {}s ago", age.num_minutes(), age.num_seconds() % 60);
    if snapshot.is_stale_at(max_age, now) {
        format!(
            "{} ({})",
            ui::style_text("stale", ui::StyleType::Stale),
            age_text
        )
    } else {
        format!(
            "{} ({})",
            ui::style_text("fresh", ui::StyleType::Fresh),
            age_text
        )
    }
}

/// Renders every cached rate against the base currency.
pub fn display_snapshot(snapshot: &RateSnapshot, max_age: Duration, now: DateTime<Utc>) -> String {
    if snapshot.is_empty() {
        return ui::style_text("No exchange rates cached", ui::StyleType::Error);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Name"),
        ui::header_cell("Kind"),
        ui::header_cell(&format!("Value ({BASE_CURRENCY})")),
        ui::header_cell(&format!("Per {BASE_CURRENCY}")),
        ui::header_cell("Source"),
        ui::header_cell("Observed"),
    ]);

    for entry in snapshot.rates().values() {
        let info = entry.currency.info();
        let kind = match info.kind {
            CurrencyKind::Fiat => "fiat",
            CurrencyKind::Crypto => "crypto",
        };
        table.add_row(vec![
            Cell::new(entry.currency),
            Cell::new(info.name),
            Cell::new(kind),
            ui::rate_cell(entry.rate_to_base),
            ui::rate_cell(1.0 / entry.rate_to_base),
            Cell::new(entry.source),
            Cell::new(entry.observed_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ]);
    }

    let mut output = format!(
        "{}\n\n",
        ui::style_text("Exchange rates", ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{} {} {}",
        ui::style_text("Captured:", ui::StyleType::Label),
        snapshot.captured_at().format("%Y-%m-%d %H:%M:%S UTC"),
        freshness_label(snapshot, max_age, now)
    ));
    output
}

pub fn print_snapshot(cache: &RateCache, max_age: Duration) {
    println!("{}", display_snapshot(&cache.read_all(), max_age, Utc::now()));
}

pub fn display_outcome(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Succeeded { rates } => ui::style_text(
            &format!("Updated {rates} rates"),
            ui::StyleType::Fresh,
        ),
        CycleOutcome::PartiallyFailed { rates, missing } => {
            let missing = missing
                .iter()
                .map(|code| code.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            ui::style_text(
                &format!("Updated {rates} rates, not refreshed: {missing}"),
                ui::StyleType::Stale,
            )
        }
        CycleOutcome::Failed => ui::style_text(
            "Update failed, no provider returned usable rates",
            ui::StyleType::Error,
        ),
        CycleOutcome::Skipped => ui::style_text(
            "Update skipped, another refresh is running",
            ui::StyleType::Subtle,
        ),
    }
}

pub fn print_outcome(outcome: &CycleOutcome) {
    println!("{}\n", display_outcome(outcome));
}

pub fn print_cross_rate(
    from: &CurrencyCode,
    to: &CurrencyCode,
    rate: f64,
    cache: &RateCache,
    max_age: Duration,
) {
    let snapshot = cache.read_all();
    println!(
        "1 {} = {} {}  {}",
        ui::style_text(from.as_str(), ui::StyleType::Label),
        ui::style_text(&ui::format_rate(rate), ui::StyleType::Fresh),
        ui::style_text(to.as_str(), ui::StyleType::Label),
        ui::style_text(
            &freshness_label(&snapshot, max_age, Utc::now()),
            ui::StyleType::Subtle
        )
    );
}

/// Runs the scheduler and prints each new snapshot until Ctrl-C.
pub async fn watch(scheduler: &Arc<RateUpdateScheduler>, max_age: Duration) -> Result<()> {
    let mut updates = scheduler.cache().subscribe();
    print_snapshot(scheduler.cache(), max_age);

    let handle = scheduler.start();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, stopping scheduler");
                break;
            }
            snapshot = updates.changed() => {
                let Some(snapshot) = snapshot else { break };
                ui::print_separator();
                println!("{}", display_snapshot(&snapshot, max_age, Utc::now()));
            }
        }
    }
    handle.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProviderId, RateEntry};
    use std::collections::BTreeMap;

    fn snapshot(captured_at: DateTime<Utc>) -> RateSnapshot {
        let eur: CurrencyCode = "EUR".parse().unwrap();
        RateSnapshot::new(
            captured_at,
            BTreeMap::from([(
                eur,
                RateEntry {
                    currency: eur,
                    rate_to_base: 1.25,
                    observed_at: captured_at,
                    source: ProviderId::FiatProvider,
                },
            )]),
        )
    }

    #[test]
    fn test_snapshot_table_lists_rates() {
        let now = Utc::now();
        let output = display_snapshot(&snapshot(now), Duration::from_secs(300), now);
        assert!(output.contains("EUR"));
        assert!(output.contains("Euro"));
        assert!(output.contains("1.2500"));
        assert!(output.contains("0.80000000"));
        assert!(output.contains("FiatProvider"));
        assert!(output.contains("fresh"));
    }

    #[test]
    fn test_old_snapshot_is_marked_stale() {
        let now = Utc::now();
        let old = snapshot(now - chrono::Duration::seconds(3600));
        let output = display_snapshot(&old, Duration::from_secs(300), now);
        assert!(output.contains("stale"));
        assert!(output.contains("60m 0s ago"));
    }

    #[test]
    fn test_empty_snapshot() {
        let output = display_snapshot(&RateSnapshot::empty(), Duration::from_secs(300), Utc::now());
        assert!(output.contains("No exchange rates cached"));
    }

    #[test]
    fn test_partial_outcome_names_missing_codes() {
        let outcome = CycleOutcome::PartiallyFailed {
            rates: 5,
            missing: vec!["EUR".parse().unwrap(), "GBP".parse().unwrap()],
        };
        assert!(display_outcome(&outcome).contains("not refreshed: EUR, GBP"));
    }
}
