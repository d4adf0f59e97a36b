use cipherforge::api::HmmOutcome;
use cipherforge::cipher::Permutation;
use cipherforge::evaluation::{self, LengthAccuracy};
use cipherforge::optimizer::history::Discovery;
use cipherforge::optimizer::SearchResult;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

const PREVIEW_CHARS: usize = 72;

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut s: String = text.chars().take(PREVIEW_CHARS - 3).collect();
    s.push_str("...");
    s
}

/// Two-row grid: plaintext letters over the cipher letters they map to.
pub fn print_key_grid(name: &str, key: &Permutation) {
    println!("\nKey: {}", name);
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);

    let plain: Vec<Cell> = (b'a'..=b'z')
        .map(|b| {
            Cell::new((b as char).to_string())
                .set_alignment(CellAlignment::Center)
                .add_attribute(Attribute::Bold)
        })
        .collect();
    let cipher: Vec<Cell> = key
        .letters()
        .chars()
        .map(|c| Cell::new(c.to_string()).set_alignment(CellAlignment::Center))
        .collect();

    table.add_row(plain);
    table.add_row(cipher);
    println!("{}", table);
}

/// Ranked candidates, with an accuracy column when the true plaintext is
/// known.
pub fn print_candidates(candidates: &[Discovery], truth: Option<&str>) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("logL").fg(Color::Cyan),
        Cell::new("Restart"),
        Cell::new("Iter"),
    ];
    if truth.is_some() {
        header.push(Cell::new("Acc").fg(Color::Green));
    }
    header.push(Cell::new("Plaintext").add_attribute(Attribute::Bold));
    table.add_row(header);

    for i in 1..=3 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for (rank, d) in candidates.iter().enumerate() {
        let mut row = vec![
            Cell::new(rank + 1),
            Cell::new(format!("{:.2}", d.log_likelihood)).fg(Color::Cyan),
            Cell::new(d.restart + 1),
            Cell::new(d.iteration),
        ];
        if let Some(t) = truth {
            let acc = evaluation::similarity(t, &d.text) * 100.0;
            row.push(Cell::new(format!("{:.1}%", acc)).fg(Color::Green));
        }
        row.push(Cell::new(preview(&d.text)));
        table.add_row(row);
    }
    println!("\n{}", table);
}

pub fn print_search_summary(result: &SearchResult) {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);

    let rate = if result.iterations > 0 {
        result.accepted as f64 / result.iterations as f64 * 100.0
    } else {
        0.0
    };

    table.add_row(vec![Cell::new("Iterations"), Cell::new(result.iterations)]);
    table.add_row(vec![
        Cell::new("Accepted"),
        Cell::new(format!("{} ({:.1}%)", result.accepted, rate)),
    ]);
    table.add_row(vec![
        Cell::new("Distinct decodings"),
        Cell::new(result.history.len()),
    ]);
    table.add_row(vec![
        Cell::new("Best logL").add_attribute(Attribute::Bold),
        Cell::new(format!("{:.3}", result.best.log_likelihood)).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("Elapsed"),
        Cell::new(format!("{:.2}s", result.elapsed.as_secs_f64())),
    ]);
    println!("\n{}", table);
}

/// Hidden-to-observed symbol mapping learned by Baum-Welch, grouped in
/// rows of nine.
pub fn print_mapping(mapping: &[(char, char)]) {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);

    let show = |c: char| if c == ' ' { "_".to_string() } else { c.to_string() };

    for chunk in mapping.chunks(9) {
        let cells: Vec<Cell> = chunk
            .iter()
            .map(|&(h, o)| {
                Cell::new(format!("{} -> {}", show(h), show(o))).set_alignment(CellAlignment::Center)
            })
            .collect();
        table.add_row(cells);
    }
    println!("\nEmission mapping (plain -> cipher):\n{}", table);
}

pub fn print_hmm_summary(outcome: &HmmOutcome, truth: Option<&str>) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let status = match outcome.converged_at {
        Some(it) => format!("converged at iteration {}", it),
        None => format!("stopped after {} iterations", outcome.iterations),
    };

    table.add_row(vec![Cell::new("EM status"), Cell::new(status)]);
    table.add_row(vec![
        Cell::new("EM logL"),
        Cell::new(format!("{:.3}", outcome.em_log_likelihood)).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("Viterbi log score"),
        Cell::new(format!("{:.3}", outcome.viterbi_log_score)).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("Viterbi").add_attribute(Attribute::Bold),
        Cell::new(preview(&outcome.plaintext)),
    ]);
    table.add_row(vec![
        Cell::new("Symbolwise"),
        Cell::new(preview(&outcome.symbolwise)),
    ]);

    if let Some(t) = truth {
        table.add_row(vec![
            Cell::new("Viterbi accuracy").fg(Color::Green),
            Cell::new(format!(
                "{:.1}%",
                evaluation::char_accuracy(t, &outcome.plaintext) * 100.0
            )),
        ]);
    }
    println!("\n{}", table);
}

pub fn print_accuracy_report(results: &[LengthAccuracy]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Words").add_attribute(Attribute::Bold),
        Cell::new("Mean accuracy").fg(Color::Green),
        Cell::new("Key accuracy").fg(Color::Cyan),
    ]);
    for i in 1..=2 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for r in results {
        table.add_row(vec![
            Cell::new(r.words),
            Cell::new(format!("{:.1}%", r.mean_accuracy * 100.0)),
            Cell::new(format!("{:.1}%", r.mean_key_accuracy * 100.0)),
        ]);
    }
    println!("\n{}", table);
}
