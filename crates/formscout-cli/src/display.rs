//! Vertical card display for detection results.
//!
//! Renders a [`DetectionResult`] grouped by detected section, one line per
//! field with its category, confidence and severity.

use formscout_core::{DetectionResult, FieldClassification, FieldGrouping, Section, Severity};

const MAX_RULES: usize = 6;

/// Print a detection result as a card grouped by section.
pub fn print_result_card(result: &DetectionResult, show_rules: bool) {
    println!("=== {} ===", result.url);
    println!(
        "  {:<26} {} (prior {})",
        "jurisdiction", result.jurisdiction.code, result.jurisdiction.prior
    );
    println!(
        "  {:<26} {} ({})",
        "confidence",
        result.confidence,
        Severity::from_confidence(result.confidence).as_str()
    );
    println!(
        "  {:<26} {}",
        "registration form",
        if result.is_registration_form { "yes" } else { "no" }
    );
    println!("  {:<26} {}", "fields", result.field_count);
    println!("  {:<26} {}", "generation", result.generation);
    println!();

    if result.sections.is_empty() {
        println!("(no form fields found)");
        return;
    }
    for section in &result.sections {
        print_section(section, show_rules);
    }
}

fn print_section(section: &Section, show_rules: bool) {
    match &section.title {
        Some(title) => println!("{title}"),
        None => println!("(ungrouped)"),
    }
    for field in &section.fields {
        print_field(field);
        if show_rules && !field.matched_rules.is_empty() {
            let shown: Vec<&str> = field
                .matched_rules
                .iter()
                .take(MAX_RULES)
                .map(String::as_str)
                .collect();
            print!("      {}", shown.join(", "));
            if field.matched_rules.len() > MAX_RULES {
                print!(" ... and {} more", field.matched_rules.len() - MAX_RULES);
            }
            println!();
        }
    }
    println!();
}

fn print_field(field: &FieldClassification) {
    let label = field_label(field);
    let label_short = if label.chars().count() > 40 {
        let cut: String = label.chars().take(37).collect();
        format!("{cut}...")
    } else {
        label
    };
    print!(
        "  {:<18} {:>3}  {:<6}  {}",
        field.category.as_str(),
        field.confidence,
        Severity::from_confidence(field.confidence).as_str(),
        label_short
    );
    match &field.grouping {
        FieldGrouping::Single => {}
        FieldGrouping::RadioGroup { options } => print!("  [radio: {}]", options.join(" / ")),
        FieldGrouping::CheckboxGroup { members } => print!("  [{} checkboxes]", members.len()),
    }
    println!();
}

/// The most human-readable identifier a field offers.
fn field_label(field: &FieldClassification) -> String {
    let f = &field.field;
    [&f.label, &f.placeholder, &f.name, &f.html_id]
        .into_iter()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("#{}", f.element.0))
}
