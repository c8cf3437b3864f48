use super::preview;
use avatar_memory::memory::AvatarMemory;
use avatar_memory::Result;

/// Run the trainer teach command
pub fn run_teach(trainer: &str, text: &str) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let index = mem.teach(trainer, text)?;

    println!("Taught {} context #{}", trainer, index);
    Ok(())
}

/// Run the trainer label command
pub fn run_label(trainer: &str, index: usize, text: &str) -> Result<()> {
    let mem = AvatarMemory::open()?;
    mem.label_context(trainer, index, text)?;

    println!("Labelled {} context #{}: {}", trainer, index, preview(text, 80));
    Ok(())
}

/// Run the trainer unlabel command
pub fn run_unlabel(trainer: &str, index: usize) -> Result<()> {
    let mem = AvatarMemory::open()?;

    if mem.unlabel_context(trainer, index)? {
        println!("Removed label of {} context #{}", trainer, index);
    } else {
        println!("{} context #{} had no label.", trainer, index);
    }
    Ok(())
}

/// Run the trainer recall command
pub fn run_recall(
    trainer: &str,
    query: &str,
    limit: Option<usize>,
    threshold: Option<f64>,
    json: bool,
) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let ranking = mem.trainer_recall(trainer, query, limit, threshold)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ranking)?);
        return Ok(());
    }

    println!(
        "{} of {} contexts relevant\n",
        ranking.relevant_count, ranking.total_memories
    );

    for (ranked, view) in ranking.relevant_memories.iter().zip(&ranking.context_texts) {
        let text = if view.text.is_empty() {
            "(unlabelled)"
        } else {
            view.text.as_str()
        };
        println!("#{} similarity: {:.3}", ranked.index, ranked.similarity);
        println!("    {}\n", preview(text, 200));
    }

    Ok(())
}
