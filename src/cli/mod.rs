pub mod config;
pub mod context;
pub mod memory;
pub mod trainer;

use avatar_memory::types::MemoryRecord;

/// Single-line preview of memory text for terminal output
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        preview.push_str("...");
    }
    preview.replace('\n', " ")
}

pub(crate) fn print_memory(m: &MemoryRecord, score: Option<f64>) {
    match score {
        Some(score) => println!("[{}] score: {:.3}, trust: {}, source: {}", m.id, score, m.trust_weight, m.source),
        None => println!("[{}] trust: {}, source: {}", m.id, m.trust_weight, m.source),
    }

    if let Some(category) = &m.category {
        println!("    category: {}", category);
    }

    println!("    {}\n", preview(&m.text, 200));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("line one\nline two", 40), "line one line two");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
