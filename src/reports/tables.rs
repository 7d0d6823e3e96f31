use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use lensforge::blocks::{Issue, Severity};
use lensforge::merit::MeritBreakdown;
use lensforge::surface::SurfaceRow;
use lensforge::value::Value;
use lensforge::variables::DesignVariable;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn align_right(table: &mut Table, columns: std::ops::RangeInclusive<usize>) {
    for i in columns {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn fmt_num(v: f64) -> String {
    if v == 0.0 || (1e-3..1e6).contains(&v.abs()) {
        format!("{v:.6}")
    } else {
        format!("{v:.4e}")
    }
}

fn fmt_value(v: &Value) -> String {
    match v {
        Value::Number(n) => fmt_num(*n),
        other => other.to_string(),
    }
}

pub fn merit(breakdown: &MeritBreakdown) {
    let mut table = new_table();

    table.add_row(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Operand").add_attribute(Attribute::Bold),
        Cell::new("Config"),
        Cell::new("Value").fg(Color::Cyan),
        Cell::new("Target"),
        Cell::new("Weight"),
        Cell::new("Term"),
        Cell::new("Impact %").fg(Color::Yellow),
    ]);

    for t in &breakdown.terms {
        let impact = Cell::new(format!("{:.2}", t.contribution));
        let impact = if t.contribution >= 50.0 {
            impact.fg(Color::Red)
        } else if t.contribution >= 10.0 {
            impact.fg(Color::Yellow)
        } else {
            impact
        };
        table.add_row(vec![
            Cell::new(t.index + 1),
            Cell::new(&t.operand).add_attribute(Attribute::Bold),
            Cell::new(if t.config_id.is_empty() { "Current" } else { t.config_id.as_str() }),
            Cell::new(fmt_num(t.value)).fg(Color::Cyan),
            Cell::new(fmt_num(t.target)),
            Cell::new(fmt_num(t.weight)),
            Cell::new(fmt_num(t.term)),
            impact,
        ]);
    }

    align_right(&mut table, 3..=7);
    println!("\n{}", table);
}

pub fn surfaces(rows: &[SurfaceRow]) {
    let mut table = new_table();

    table.add_row(vec![
        Cell::new("Surf").add_attribute(Attribute::Bold),
        Cell::new("Type"),
        Cell::new("Radius"),
        Cell::new("Thickness"),
        Cell::new("Material"),
        Cell::new("Conic"),
        Cell::new("Semi-Dia"),
        Cell::new("Block").fg(Color::Green),
        Cell::new("Role").fg(Color::Green),
    ]);

    for row in rows {
        table.add_row(vec![
            Cell::new(row.surface_number()).add_attribute(Attribute::Bold),
            Cell::new(row.surf_type),
            Cell::new(fmt_value(&row.radius)),
            Cell::new(fmt_value(&row.thickness)),
            Cell::new(&row.material),
            Cell::new(fmt_value(&row.conic)),
            Cell::new(fmt_value(&row.semidia)),
            Cell::new(row.provenance.block_id.as_deref().unwrap_or("")).fg(Color::Green),
            Cell::new(row.role().map(|r| r.to_string()).unwrap_or_default()).fg(Color::Green),
        ]);
    }

    align_right(&mut table, 2..=6);
    println!("\n{}", table);
}

pub fn issues(issues: &[Issue]) {
    let mut table = new_table();

    table.add_row(vec![
        Cell::new("Severity").add_attribute(Attribute::Bold),
        Cell::new("Phase"),
        Cell::new("Block"),
        Cell::new("Surf"),
        Cell::new("Message"),
    ]);

    for issue in issues {
        let color = match issue.severity {
            Severity::Fatal => Color::Red,
            Severity::Warning => Color::Yellow,
        };
        table.add_row(vec![
            Cell::new(issue.severity).fg(color),
            Cell::new(issue.phase),
            Cell::new(issue.block_id.as_deref().unwrap_or("")),
            Cell::new(issue.surface_index.map(|s| s.to_string()).unwrap_or_default()),
            Cell::new(&issue.message),
        ]);
    }
    println!("\n{}", table);
}

pub fn variables(vars: &[DesignVariable]) {
    let mut table = new_table();

    table.add_row(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Variable").add_attribute(Attribute::Bold),
        Cell::new("Config"),
        Cell::new("Scope"),
        Cell::new("Value").fg(Color::Cyan),
    ]);

    for (i, v) in vars.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format!("{}.{}", v.block_id, v.name)).add_attribute(Attribute::Bold),
            Cell::new(&v.config_id),
            Cell::new(format!("{:?}", v.scope)),
            Cell::new(fmt_num(v.value)).fg(Color::Cyan),
        ]);
    }

    align_right(&mut table, 4..=4);
    println!("\n{}", table);
}
