use anyhow::Context;
use colored::Colorize;

pub fn handle() -> anyhow::Result<()> {
    let (config, origin) = hcsync_config::load_config().context("Failed to load config")?;

    match origin {
        Some(path) => println!("Config file: {}", path.display().to_string().cyan()),
        None => println!("{}", "No config file found, using defaults".yellow()),
    }
    println!();
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
