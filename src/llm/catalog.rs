use colored::*;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};

/// One curated model known to resolve against the remote host policy.
pub struct CatalogEntry {
    pub model_id: &'static str,
    pub parameters: &'static str,
    pub quantized: bool,
    pub notes: &'static str,
}

/// Models verified by hand with the smoke-test runner. Ordered smallest
/// first; the first entry doubles as a quick connectivity probe.
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        model_id: "openai-community/gpt2",
        parameters: "124M",
        quantized: true,
        notes: "Default model; fast to download, weak conversationalist",
    },
    CatalogEntry {
        model_id: "distilbert/distilgpt2",
        parameters: "82M",
        quantized: true,
        notes: "Smallest usable option",
    },
    CatalogEntry {
        model_id: "openai-community/gpt2-medium",
        parameters: "355M",
        quantized: true,
        notes: "Noticeably better replies, slower load",
    },
    CatalogEntry {
        model_id: "EleutherAI/pythia-160m",
        parameters: "160M",
        quantized: false,
        notes: "Full precision only",
    },
    CatalogEntry {
        model_id: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        parameters: "1.1B",
        quantized: true,
        notes: "Chat-tuned; needs the quantized file on slow links",
    },
];

/// Prints the catalog as a table.
pub fn display_catalog() {
    let mut table = Table::new();
    table
        .set_header(vec![
            Cell::new("#")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Model")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Parameters")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Quantized")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Notes")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(Attribute::Bold),
        ])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for (i, entry) in CATALOG.iter().enumerate() {
        table.add_row(vec![
            Cell::new((i + 1).to_string())
                .fg(comfy_table::Color::White)
                .set_alignment(CellAlignment::Center),
            Cell::new(entry.model_id).fg(comfy_table::Color::Green),
            Cell::new(entry.parameters)
                .fg(comfy_table::Color::Blue)
                .set_alignment(CellAlignment::Center),
            Cell::new(if entry.quantized { "yes" } else { "no" })
                .fg(comfy_table::Color::Magenta)
                .set_alignment(CellAlignment::Center),
            Cell::new(entry.notes).fg(comfy_table::Color::DarkGrey),
        ]);
    }

    println!("\n{}", table);
    println!(
        "{}",
        format!("Total models: {}", CATALOG.len()).bright_green()
    );
}
