//! Plain-text listings for the CLI

use crate::storage::{ArchiveRecord, ComponentRecord, ExplanationRecord};

/// Longest snippet preview shown per component
const SNIPPET_PREVIEW_CHARS: usize = 80;

/// Prints archives, one per line, in the order given
pub fn print_archives(archives: &[ArchiveRecord]) {
    if archives.is_empty() {
        println!("No archives.");
        return;
    }

    for archive in archives {
        let crawled = archive.last_crawled_at.as_deref().unwrap_or("never");
        println!(
            "#{:<5} {:<11} {}  (last crawled: {})",
            archive.id, archive.status, archive.root_url, crawled
        );
        if let Some(error) = &archive.last_error {
            println!("       error: {}", error);
        }
    }
}

/// Prints components with their tags and a snippet preview
pub fn print_components(components: &[ComponentRecord]) {
    if components.is_empty() {
        println!("No components match.");
        return;
    }

    for component in components {
        let favorite = if component.is_favorite { "*" } else { " " };
        println!(
            "{}#{:<5} {:<8} score {:<4} {}",
            favorite, component.id, component.component_type, component.complexity_score, component.name
        );
        if !component.tags.is_empty() {
            println!("        tags: {}", component.tags.join(", "));
        }
        println!("        {}", snippet_preview(&component.html_snippet));
    }
}

/// Prints an explanation document
pub fn print_explanation(explanation: &ExplanationRecord) {
    println!("Summary: {}", explanation.summary);
    println!("Complexity: {}", explanation.complexity_rating);
    if !explanation.tags.is_empty() {
        println!("Tags: {}", explanation.tags.join(", "));
    }
    println!();
    println!("{}", explanation.technical_notes);
    println!();
    println!("{}", explanation.markdown_content);
}

/// Single-line preview of a snippet, cut on a character boundary
fn snippet_preview(html: &str) -> String {
    let flat = html.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(SNIPPET_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}
