//! The `rubricon init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("rubricon.toml").exists() {
        println!("rubricon.toml already exists, skipping.");
    } else {
        std::fs::write("rubricon.toml", SAMPLE_CONFIG)?;
        println!("Created rubricon.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit rubricon.toml with your API keys");
    println!("  2. Run: rubricon seed");
    println!("  3. Run: rubricon serve");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# rubricon configuration

default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"
default_temperature = 0.4
section_parallelism = 4
data_dir = "./rubricon-data"
bind_addr = "127.0.0.1:8570"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

# Canned prose without network calls, handy for local development.
[providers.mock]
type = "mock"
"#;
