use super::preview;
use avatar_memory::memory::AvatarMemory;
use avatar_memory::types::ConfidenceRanking;
use avatar_memory::Result;

/// Run the context command - print memories relevant to a message, ready for a prompt
pub fn run_context(avatar: &str, prompt: &str, limit: Option<usize>, threshold: Option<f64>) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let ranking = mem.ask(avatar, prompt, limit, threshold)?;

    print!("{}", render_context(&ranking));
    Ok(())
}

/// Markdown block for prompt injection. When nothing clears the threshold the
/// block tells the model to admit it doesn't know.
pub(crate) fn render_context(ranking: &ConfidenceRanking) -> String {
    let mut out = String::from("# Relevant Memories\n\n");

    if ranking.is_empty() {
        out.push_str(
            "No stored memory is relevant to this message. \
             If it asks about facts you have not been told, say that you don't know.\n",
        );
        return out;
    }

    for r in &ranking.relevant_memories {
        out.push_str(&format!(
            "- ({:.0}% match, {}) {}\n",
            r.score * 100.0,
            r.memory.trust_weight,
            preview(&r.memory.text, 500)
        ));
    }

    out
}
