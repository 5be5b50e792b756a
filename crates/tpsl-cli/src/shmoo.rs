//! Heat-map ("shmoo plot") of one ROI matrix.

use std::fmt::Write;

use colored::Colorize;

use tpsl_engine::EXHAUSTED_ROI;

const CELL_WIDTH: usize = 9;

/// Red to green, low ROI to high.
const GRADIENT: [(u8, u8, u8); 5] = [
    (215, 48, 39),
    (252, 141, 89),
    (254, 224, 139),
    (145, 207, 96),
    (26, 152, 80),
];

/// Render `matrix[sl][tp]` with TP across and SL down. Axis labels are
/// fractions and printed as percent.
pub fn render(title: &str, tp_list: &[f64], sl_list: &[f64], matrix: &[Vec<f64>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", title.bold());

    let _ = write!(out, "{:>CELL_WIDTH$}", "SL\\TP %");
    for tp in tp_list {
        let _ = write!(out, "{:>CELL_WIDTH$.2}", tp * 100.0);
    }
    out.push('\n');

    let range = value_range(matrix);
    for (sl, row) in sl_list.iter().zip(matrix) {
        let _ = write!(out, "{:>CELL_WIDTH$.2}", sl * 100.0);
        for &v in row {
            let _ = write!(out, "{}", cell(v, range));
        }
        out.push('\n');
    }

    out.push_str(&legend(range));
    out
}

fn cell(v: f64, range: Option<(f64, f64)>) -> String {
    match range {
        Some((lo, hi)) if is_plottable(v) => {
            let (r, g, b) = GRADIENT[bucket(v, lo, hi)];
            format!("{:>CELL_WIDTH$.2}", v)
                .black()
                .on_truecolor(r, g, b)
                .to_string()
        }
        _ => format!("{:>CELL_WIDTH$}", "n/a").dimmed().to_string(),
    }
}

fn legend(range: Option<(f64, f64)>) -> String {
    let Some((lo, hi)) = range else {
        return "  (no finite values)\n".to_string();
    };
    let step = (hi - lo) / GRADIENT.len() as f64;
    let mut out = String::from("  legend ROI %: ");
    for (k, &(r, g, b)) in GRADIENT.iter().enumerate() {
        let from = lo + k as f64 * step;
        let label = format!(" {:.2}..{:.2} ", from, from + step);
        let _ = write!(out, "{}", label.black().on_truecolor(r, g, b));
    }
    let _ = writeln!(out, "  {} = capital exhausted", "n/a".dimmed());
    out
}

fn is_plottable(v: f64) -> bool {
    v.is_finite() && v != EXHAUSTED_ROI
}

/// Min and max over plottable cells; `None` if there are none.
fn value_range(matrix: &[Vec<f64>]) -> Option<(f64, f64)> {
    matrix
        .iter()
        .flatten()
        .copied()
        .filter(|&v| is_plottable(v))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Gradient index for `v` within `[lo, hi]`. A flat matrix maps to the middle.
fn bucket(v: f64, lo: f64, hi: f64) -> usize {
    let n = GRADIENT.len();
    if hi - lo <= f64::EPSILON {
        return n / 2;
    }
    let t = (v - lo) / (hi - lo);
    ((t * n as f64).floor() as usize).min(n - 1)
}
