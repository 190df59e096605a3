use std::fmt::Write;

use coinfolio_core::models::market::MarketCoin;
use coinfolio_core::models::view::{ChangeClass, DashboardViewModel, MarketCard};
use coinfolio_core::services::market_service::MarketService;
use coinfolio_core::services::presentation_service::market_cards;
use coinfolio_core::services::refresh_service::{DashboardStatus, NoticeKind};

fn arrow(class: ChangeClass) -> &'static str {
    match class {
        ChangeClass::Positive => "▲",
        ChangeClass::Negative => "▼",
    }
}

/// Plain-text rendering of the dashboard, one screen per update.
pub fn render_status(status: &DashboardStatus, market_filter: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "── coinfolio ── state: {}", status.state);

    if let Some(notice) = &status.notice {
        let tag = match notice.kind {
            NoticeKind::Info => "info",
            NoticeKind::Error => "error",
        };
        let _ = writeln!(out, "[{tag}] {}", notice.message);
    }

    match &status.latest {
        Some(update) => {
            let _ = writeln!(out, "cycle #{} ({})", update.cycle, update.trigger);
            let matches: Vec<MarketCoin> = MarketService::new()
                .search(&update.market, market_filter)
                .into_iter()
                .cloned()
                .collect();
            out.push_str(&render_view(&update.view, &market_cards(&matches)));
        }
        None => out.push_str("Loading prices...\n"),
    }
    out
}

pub fn render_view(view: &DashboardViewModel, cards: &[MarketCard]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total {}   24h {} {} ({})   as of {} [{:?}]",
        view.total_value,
        arrow(view.change_class),
        view.change_amount,
        view.change_percent,
        view.as_of.format("%Y-%m-%d %H:%M:%S UTC"),
        view.source,
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<4} {:<12} {:>14} {:>9} {:>12} {:>14} {:>7}",
        "", "Asset", "Price", "24h", "Holdings", "Value", "Alloc"
    );
    for row in &view.holdings {
        let _ = writeln!(
            out,
            "{:<4} {:<12} {:>14} {:>9} {:>12} {:>14} {:>7}",
            row.icon,
            format!("{} {}", row.symbol, row.name),
            row.price,
            row.change,
            row.quantity,
            row.value,
            row.allocation,
        );
    }

    if !view.performance.labels.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Performance");
        for (label, value) in view.performance.labels.iter().zip(&view.performance.values) {
            let _ = writeln!(out, "  {label}  {value:>12.2}");
        }
    }

    if !cards.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Market overview");
        for card in cards {
            let _ = writeln!(
                out,
                "  {:<6} {:<14} {:>14} {} {:>8}  cap {:>10}  vol {:>9}",
                card.symbol,
                card.name,
                card.price,
                arrow(card.change_class),
                card.change,
                card.market_cap,
                card.volume,
            );
        }
    }
    out
}
