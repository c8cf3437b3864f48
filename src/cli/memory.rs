use super::{preview, print_memory};
use avatar_memory::config::STORE_DIR;
use avatar_memory::memory::{AvatarMemory, MemoryUpdate};
use avatar_memory::types::{MemorySource, TrustWeight};
use avatar_memory::{MemoryError, Result};
use std::io::{self, Write};
use std::path::Path;

/// Run the init command
pub fn run_init(path: &str) -> Result<()> {
    let path = Path::new(path);
    let store_path = path.join(STORE_DIR);

    if store_path.exists() {
        return Err(MemoryError::Config(format!(
            "{} already exists at {}",
            STORE_DIR,
            store_path.display()
        )));
    }

    let mem = AvatarMemory::init(path)?;
    println!("Initialized {} at {}", STORE_DIR, mem.store_path().display());

    Ok(())
}

/// Run the remember command
pub fn run_remember(
    avatar: &str,
    text: &str,
    source: &str,
    trust: Option<&str>,
    category: Option<&str>,
) -> Result<()> {
    let mem = AvatarMemory::open()?;

    let source: MemorySource = source.parse().map_err(MemoryError::Config)?;
    let trust: Option<TrustWeight> = trust.and_then(|t| t.parse().ok());

    let id = mem.remember(avatar, text, source, trust, category)?;
    let record = mem.get(id)?.ok_or(MemoryError::NotFound(id))?;

    println!("Remembered [{}] for {}", id, avatar);
    println!("  trust: {}, source: {}", record.trust_weight, record.source);
    if let Some(c) = category {
        println!("  category: {}", c);
    }

    Ok(())
}

/// Run the recall command
pub fn run_recall(avatar: &str, query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let results = mem.recall(avatar, query, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No memories for {}.", avatar);
        return Ok(());
    }

    for r in results {
        print_memory(&r.memory, Some(r.score));
    }

    Ok(())
}

/// Run the ask command
pub fn run_ask(
    avatar: &str,
    query: &str,
    limit: Option<usize>,
    threshold: Option<f64>,
    json: bool,
) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let ranking = mem.ask(avatar, query, limit, threshold)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ranking)?);
        return Ok(());
    }

    println!(
        "{} of {} memories relevant\n",
        ranking.relevant_count, ranking.total_memories
    );

    if ranking.is_empty() {
        println!("Nothing known about that.");
        return Ok(());
    }

    for r in ranking.relevant_memories {
        print_memory(&r.memory, Some(r.score));
    }

    Ok(())
}

/// Run the update command
pub fn run_update(id: i64, text: Option<&str>, category: Option<&str>, clear_category: bool) -> Result<()> {
    let mem = AvatarMemory::open()?;

    let category = if clear_category {
        Some(None)
    } else {
        category.map(Some)
    };

    mem.update(id, MemoryUpdate { text, category })?;

    println!("Updated [{}]", id);
    if let Some(t) = text {
        println!("  text: {}", preview(t, 80));
    }
    match category {
        Some(Some(c)) => println!("  category: {}", c),
        Some(None) => println!("  category cleared"),
        None => {}
    }

    Ok(())
}

/// Run the archive command
pub fn run_archive(id: i64, force: bool) -> Result<()> {
    let mem = AvatarMemory::open()?;

    let memory = mem
        .get(id)?
        .filter(|m| m.is_active)
        .ok_or(MemoryError::NotFound(id))?;

    if !force {
        println!("Archive [{}] of {}:", id, memory.avatar_id);
        println!("  {}", preview(&memory.text, 100));

        print!("Confirm? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    mem.archive(id)?;
    println!("Archived [{}]", id);

    Ok(())
}

/// Run the list command
pub fn run_list(avatar: &str, limit: usize) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let memories = mem.list(avatar, limit)?;

    if memories.is_empty() {
        println!("No memories yet. Add one with: avatar-memory remember {} \"...\"", avatar);
        return Ok(());
    }

    for m in memories {
        print_memory(&m, None);
    }

    Ok(())
}

/// Run the avatars command
pub fn run_avatars() -> Result<()> {
    let mem = AvatarMemory::open()?;
    let avatars = mem.avatars()?;

    if avatars.is_empty() {
        println!("No avatars yet.");
        return Ok(());
    }

    println!("Avatars:\n");
    for (avatar, count) in avatars {
        println!("  {:20} ({})", avatar, count);
    }

    Ok(())
}

/// Run the stats command
pub fn run_stats(avatar: &str) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let stats = mem.stats(avatar)?;

    println!("Memory Statistics: {}", avatar);
    println!("==================\n");

    println!("Active memories:   {}", stats.total_memories);
    println!("Archived memories: {}", stats.archived_memories);

    for (title, counts) in [("By trust", &stats.by_trust), ("By source", &stats.by_source)] {
        if counts.is_empty() {
            continue;
        }

        println!("\n{}:", title);
        let mut rows: Vec<_> = counts.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (key, count) in rows {
            println!("  {:22} {}", key, count);
        }
    }

    Ok(())
}

/// Run the export command
pub fn run_export(avatar: &str, format: &str) -> Result<()> {
    let mem = AvatarMemory::open()?;
    let memories = mem.all(avatar)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&memories)?);
        }
        "md" => {
            for m in memories {
                println!("## [{}] {}", m.id, m.created_at.format("%Y-%m-%d"));
                println!("*Trust: {}, source: {}*\n", m.trust_weight, m.source);
                if let Some(category) = &m.category {
                    println!("*Category: {}*\n", category);
                }
                println!("{}\n", m.text);
                println!("---\n");
            }
        }
        _ => {
            return Err(MemoryError::Config(format!("Unknown format: {}", format)));
        }
    }

    Ok(())
}
