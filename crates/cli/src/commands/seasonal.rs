use chrono::{DateTime, Datelike, NaiveDate, Utc};
use smartscoop_core::domain::product::parse_price;
use smartscoop_core::seasonal::SeasonalOptimizer;

use crate::commands::{exit, CommandResult};

/// Evaluates the standard seasonal calendar for one product. `at` pins the
/// evaluation instant (RFC 3339 or `YYYY-MM-DD`); it defaults to now.
pub fn run(product_id: &str, price: &str, at: Option<&str>) -> CommandResult {
    let Some(current_price) = parse_price(price) else {
        return CommandResult::failure(
            "seasonal",
            "invalid_input",
            format!("`{price}` is not a valid price"),
            exit::INVALID_INPUT,
        );
    };
    let now = match at.map(parse_instant).transpose() {
        Ok(instant) => instant.unwrap_or_else(Utc::now),
        Err(message) => {
            return CommandResult::failure(
                "seasonal",
                "invalid_input",
                message,
                exit::INVALID_INPUT,
            );
        }
    };

    let mut optimizer = SeasonalOptimizer::new();
    optimizer.register_standard_year(now.year());
    let should_wait = optimizer.should_wait_for_sale_at(product_id, current_price, now);

    let mut lines = vec![format!("should_wait_for_sale: {should_wait}")];
    let upcoming = optimizer.upcoming_events_at(now);
    if upcoming.is_empty() {
        lines.push("no upcoming sales".to_string());
    } else {
        lines.push("upcoming sales:".to_string());
        lines.extend(upcoming.iter().map(|sale| format!("- {}", sale.describe())));
    }

    CommandResult::success("seasonal", lines.join("\n"))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("`{raw}` is not an RFC 3339 instant or YYYY-MM-DD date"))
}
