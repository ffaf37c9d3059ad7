//! `medbridge doctor`: check configuration and credentials.

use medbridge_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 MedBridge Doctor");
    println!("===================\n");

    let mut issues = 0;

    let config_path = AppConfig::resolved_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults", config_path.display());
    }

    match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            println!("     model: {}", config.llm.model);
            println!(
                "     retry: {} attempts, {}ms base delay, {}ms timeout",
                config.retry.max_attempts, config.retry.base_delay_ms, config.retry.timeout_ms
            );
            println!("     default language: {}", config.default_language);

            match medbridge_providers::build_from_config(&config) {
                Ok(provider) => println!("  ✅ Provider `{}` ready", provider.name()),
                Err(e) => {
                    println!("  ❌ {e}. Set GEMINI_API_KEY or llm.api_key");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
