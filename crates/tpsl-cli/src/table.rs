use std::fmt::Write;

use colored::Colorize;

use tpsl_engine::{ReportRow, Variant};

const RULE_WIDTH: usize = 118;

pub fn render(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "{:>7} {:>7} {:<6} {:>9} {:>10} {:>12} {:>10} {:>9} {:>9} {:>6} {:>6} {:>6} {:>7}",
        "TP%", "SL%", "Dir", "Success%", "Revenue", "FinalCap", "Loss", "Fees", "ROI%",
        "Wins", "Losses", "Unres", "Unres%"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for row in rows {
        let _ = writeln!(
            out,
            "{:>7.2} {:>7.2} {:<6} {:>8.1}% {:>10.2} {:>12.2} {:>10.2} {:>9.2} {} {:>6} {:>6} {:>6} {:>6.1}%{}",
            row.tp * 100.0,
            row.sl * 100.0,
            row.direction.to_string(),
            row.success_rate,
            row.revenue,
            row.final_capital,
            row.loss,
            row.fees,
            roi_cell(row),
            row.wins,
            row.losses,
            row.unresolved,
            row.unresolved_pct,
            if row.capital_exhausted { " *" } else { "" },
        );
    }

    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    if rows.iter().any(|r| r.capital_exhausted) {
        let _ = writeln!(out, "* capital exhausted before the end of the series");
    }
    out
}

fn roi_cell(row: &ReportRow) -> String {
    if row.direction == Variant::Hedge && row.capital_exhausted {
        return format!("{:>9}", "n/a").dimmed().to_string();
    }
    let s = format!("{:>9.2}", row.roi_pct);
    if row.roi_pct >= 0.0 {
        s.green().to_string()
    } else {
        s.red().to_string()
    }
}
