//! Check command implementation.
//!
//! Validates configuration and the installed speedtest CLI.

use speedtest_exporter::HealthProber;

use crate::config::{validate_effective_config, Config};

/// Validates configuration and the speedtest installation.
pub async fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Speedtest Exporter - System Check");
    println!("====================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📡 Checking speedtest CLI '{}'...", config.speedtest_binary());
    let prober = HealthProber::new(config.speedtest_binary());
    match prober.probe().await {
        Ok(path) => println!("   ✅ Official speedtest CLI found at {}", path.display()),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    let settings = config.measurement_settings();
    println!("\n📋 Measurement settings:");
    println!(
        "   Server:  {}",
        settings.server_id.as_deref().unwrap_or("nearest")
    );
    println!("   Timeout: {}s", settings.timeout.as_secs());

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        std::process::exit(1);
    }
}
