use common::{Direction, SignalDecision, SignalKey};
use strategy::AlertConfig;

/// Render the message sent for an admitted signal.
///
/// Take-profit and stop-loss levels are quoted from the configured
/// percentages around the signal price.
pub fn format_alert(key: &SignalKey, decision: &SignalDecision, alert: &AlertConfig) -> String {
    let price = decision.price;
    let (icon, take_profit, stop_loss) = match decision.direction {
        Direction::Long => (
            "🟢",
            price * (1.0 + alert.take_profit_pct),
            price * (1.0 - alert.stop_loss_pct),
        ),
        Direction::Short => (
            "🔴",
            price * (1.0 - alert.take_profit_pct),
            price * (1.0 + alert.stop_loss_pct),
        ),
    };

    format!(
        "{icon} {direction} signal | {symbol} | {timeframe}\n\
         Bar: {bar_time}\n\
         Price: {price}\n\
         TP: {tp} ({tp_pct:.2}%)\n\
         SL: {sl} ({sl_pct:.2}%)",
        direction = decision.direction,
        symbol = key.symbol,
        timeframe = key.timeframe,
        bar_time = decision.bar_time.format("%Y-%m-%d %H:%M UTC"),
        price = format_price(price),
        tp = format_price(take_profit),
        tp_pct = alert.take_profit_pct * 100.0,
        sl = format_price(stop_loss),
        sl_pct = alert.stop_loss_pct * 100.0,
    )
}

/// Fixed decimals scaled to magnitude, trailing zeros trimmed.
/// Low-priced tokens need eight places; majors need two.
fn format_price(price: f64) -> String {
    let decimals = match price.abs() {
        p if p >= 100.0 => 2,
        p if p >= 1.0 => 4,
        _ => 8,
    };
    let text = format!("{price:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
