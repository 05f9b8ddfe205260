//! Markdown scan report adapter.
//!
//! One section per signal with its levels and the replay of its last
//! occurrences, meant to be read by a human or fed to an LLM.

use crate::domain::backtest::ProofRecord;
use crate::domain::error::ScannerError;
use crate::domain::scan::ScanResult;
use crate::domain::signal::Signal;
use crate::domain::simulator::TradeResult;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;
use tracing::info;

const SENTIMENT_THRESHOLD: f64 = 0.2;
const TARGET_REWARD_RISK: f64 = 2.0;

pub struct MarkdownReport;

impl ReportPort for MarkdownReport {
    fn write(&self, result: &ScanResult, output_path: &str) -> Result<(), ScannerError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, render(result))?;
        info!(path = output_path, signals = result.signals.len(), "report written");
        Ok(())
    }
}

pub fn render(result: &ScanResult) -> String {
    let mut output = render_header(result);

    if result.signals.is_empty() {
        output.push_str(&render_no_signals());
    } else {
        output.push_str(&format!(
            "## 🎯 Trading Signals ({} Found)\n\n",
            result.signals.len()
        ));
        for (i, signal) in result.signals.iter().enumerate() {
            output.push_str(&render_signal(i + 1, signal));
        }
    }

    output.push_str(&render_footer());
    output
}

pub fn sentiment_label(score: f64) -> &'static str {
    if score > SENTIMENT_THRESHOLD {
        "📈 Bullish"
    } else if score < -SENTIMENT_THRESHOLD {
        "📉 Bearish"
    } else {
        "😐 Neutral"
    }
}

fn render_header(result: &ScanResult) -> String {
    format!(
        "# Market Snapshot Report\n\n\
         **Generated**: {}  \n\
         **Sentiment Score**: {:+.3} {}  \n\
         **Assets Scanned**: {}\n\n---\n\n",
        result.generated_at,
        result.sentiment_score,
        sentiment_label(result.sentiment_score),
        result.symbols.join(", ")
    )
}

fn render_signal(number: usize, signal: &Signal) -> String {
    let mut output = format!("### Signal {}: {} - {}\n\n", number, signal.asset, signal.strategy);
    output.push_str(&format!("- **Type**: {}\n", signal.strategy_type));
    output.push_str(&format!("- **Entry Price**: ${:.2}\n", signal.entry_price));
    output.push_str(&format!("- **Timestamp**: {}\n", signal.timestamp));

    match &signal.risk {
        Some(risk) => {
            output.push_str(&format!(
                "- **Stop Loss**: ${:.2} ({:.1}%, ATR {:.2} × {:.1})\n",
                risk.stop_loss_price,
                risk.stop_pct * 100.0,
                risk.atr_value,
                risk.atr_multiplier
            ));
            output.push_str(&format!(
                "- **Take Profit**: ${:.2}\n",
                risk.take_profit_price
            ));
            output.push_str(&format!("- **Risk Status**: {}\n", risk.risk_status));
        }
        None => {
            output.push_str(&format!(
                "- **Stop Loss**: {:.1}%\n",
                signal.params.stop_loss_pct * 100.0
            ));
            output.push_str(&format!(
                "- **Take Profit**: {:.1}%\n",
                signal.params.take_profit_pct * 100.0
            ));
        }
    }

    let rr = signal.reward_risk();
    let rr_check = if rr >= TARGET_REWARD_RISK { "✅" } else { "⚠️" };
    output.push_str(&format!("- **R:R Ratio**: {} {:.1}:1\n", rr_check, rr));
    output.push_str(&format!(
        "- **Win Rate (Last 3)**: {:.0}%\n\n",
        signal.win_rate
    ));

    output.push_str(&render_proof(&signal.backtest_results));
    output.push_str("---\n\n");
    output
}

fn render_proof(records: &[ProofRecord]) -> String {
    if records.is_empty() {
        return String::from(
            "⚠️ **No backtest proof available** (insufficient historical signals)\n\n",
        );
    }

    let mut output = String::from("**Backtest Proof (Last 3 Signals)**:\n\n");
    output.push_str("| Signal Date | Result | P&L | Duration |\n");
    output.push_str("|-------------|--------|-----|----------|\n");
    for record in records {
        let marker = match record.result {
            TradeResult::TakeProfit => "✅",
            TradeResult::StopLoss => "❌",
            TradeResult::Open => "⏸️",
        };
        output.push_str(&format!(
            "| {} | {} {} | {:+.2}% | {} bars |\n",
            record.signal_date, marker, record.result, record.pnl_percent, record.duration_bars
        ));
    }
    output.push('\n');
    output
}

fn render_no_signals() -> String {
    String::from(
        "## 😴 No Trading Signals Found\n\n\
         No strategy conditions were met in the current market scan.\n\n",
    )
}

fn render_footer() -> String {
    String::from(
        "---\n\n*This report is for analysis purposes. Always validate before live trading.*\n",
    )
}
