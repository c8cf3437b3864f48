use avatar_memory::config::{find_store_path, ConfigFile, CONFIG_KEYS, STORE_DIR};
use avatar_memory::memory::AvatarMemory;
use avatar_memory::{MemoryError, Result};

/// Run the config command
pub fn run_config(key: Option<&str>, value: Option<&str>) -> Result<()> {
    let store_path = find_store_path().ok_or_else(|| {
        MemoryError::Config(format!("No {} directory found. Run 'avatar-memory init' first.", STORE_DIR))
    })?;
    let mut file = ConfigFile::load(&store_path)?;

    match (key, value) {
        (None, None) => {
            let mem = AvatarMemory::open_at(store_path)?;
            let config = mem.config();

            println!("Current configuration:\n");
            println!("  embedder:             {:?} (active: {})", config.embedder, mem.embedder_name());
            println!("  socket_path:          {}", config.socket_path.display());
            println!("  top_k:                {}", config.top_k);
            println!("  confidence_threshold: {}", config.confidence_threshold);
        }
        (Some(k), None) => {
            if !CONFIG_KEYS.contains(&k) {
                return Err(MemoryError::Config(format!("Unknown config key: {}", k)));
            }
            if let Some((v, origin)) = file.get(k)? {
                println!("{}: {} ({})", k, v, origin);
            }
        }
        (Some(k), Some(v)) => {
            file.set(k, v)?;
            println!("Set {} = {}", k, v);
        }
        (None, Some(_)) => {
            return Err(MemoryError::Config("Key required when setting a value".to_string()));
        }
    }

    Ok(())
}
