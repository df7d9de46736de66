//! Markdown message bodies.

use crate::observer::QualityReading;
use crate::risk::ActiveTrade;
use crate::strategy::{ActionHint, Candidate, StrategyKind};
use crate::utils::{price_decimals, to_price};
use chrono::Duration;
use std::fmt::Write;

/// Price rendered with the same precision as the trade plan levels.
pub fn format_price(price: f64) -> String {
    to_price(price, price_decimals(price))
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|| format!("{}", price))
}

fn format_duration(d: Duration) -> String {
    let mins = d.num_minutes();
    if mins % 60 != 0 {
        format!("{} min", mins)
    } else if mins >= 60 * 24 && mins % (60 * 24) == 0 {
        format!("{}d", mins / (60 * 24))
    } else {
        format!("{}h", mins / 60)
    }
}

/// Alert body for a selected candidate.
pub fn signal_message(
    candidate: &Candidate,
    thresholds_version: &str,
    hint: Option<ActionHint>,
) -> String {
    let kind = candidate.strategy;
    let plan = &candidate.plan;
    let mut msg = String::new();

    let _ = writeln!(msg, "{} *{}* {}", kind.emoji(), kind, kind.emoji());
    let _ = writeln!(msg);
    let _ = writeln!(
        msg,
        "{} *{}* — {}",
        candidate.direction.emoji(),
        candidate.symbol,
        candidate.direction
    );
    let _ = writeln!(msg, "🏅 Score: {:.1}", candidate.adjusted_score);
    if let Some(hint) = hint {
        let _ = writeln!(msg, "🧭 Action: {}", hint);
    }
    let _ = writeln!(msg);
    let _ = writeln!(msg, "💰 Price: {}", format_price(candidate.price));
    let _ = writeln!(msg, "💠 Entry: {}", plan.entry);
    let _ = writeln!(msg, "🎯 TP: {} / {}", plan.take_profit_1, plan.take_profit_2);
    let _ = writeln!(msg, "🛑 SL: {}", plan.stop_loss);
    let _ = writeln!(msg, "🔁 SL → BE @ {}", plan.break_even_trigger);
    let _ = writeln!(msg, "⚖️ Leverage: {}x", plan.leverage);

    if !candidate.details.is_empty() {
        let _ = writeln!(msg);
        let _ = writeln!(msg, "📊 *Metrics:*");
        for line in &candidate.details {
            let _ = writeln!(msg, "• {}", line);
        }
    }
    let _ = write!(msg, "\n_thresholds {}_", thresholds_version);
    msg
}

/// Close/reassess alert for a trade past its time limit.
pub fn time_limit_message(kind: StrategyKind, trade: &ActiveTrade, limit: Duration) -> String {
    format!(
        "⚠️ *{} TIME LIMIT* ⚠️\n\n⌛ *{}* ({}) has been open for more than {}.\n\n👉 *CLOSE NOW* or reassess the position.",
        kind,
        trade.symbol,
        trade.direction,
        format_duration(limit)
    )
}

pub fn online_message(kind: StrategyKind, thresholds_version: &str) -> String {
    format!("🟢 {} *{}* online ({})", kind.emoji(), kind, thresholds_version)
}

/// Market-quality report.
pub fn observer_report(reading: &QualityReading) -> String {
    let m = &reading.metrics;
    format!(
        "📡 *Market Quality Index*\n\n*Score:* {:.0}/100\n*State:* {}\n\n📊 *Data:*\n• BTC trend 1h: {:+.3}%\n• ETH trend 1h: {:+.3}%\n• Breadth: {:.2}%\n• Volatility: {:.2}%\n• Trend: {}\n• VWAP distance: {:+.2}%",
        reading.score,
        reading.state,
        m.btc_trend_pct,
        m.eth_trend_pct,
        m.breadth_pct,
        m.volatility_pct,
        m.trend_label,
        m.vwap_distance_pct,
    )
}
