//! Doctor command for deployment diagnostics
//!
//! Checks the pieces a running relay actually depends on: configuration,
//! the database, both configured providers, and host memory.

use crate::config::Settings;
use crate::db;
use crate::providers::ProviderRegistry;
use colored::Colorize;
use sysinfo::System;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

/// Deployment diagnostics
pub struct Doctor {
    settings: Settings,
}

impl Doctor {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run all checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let mut checks = vec![self.check_config()];
        checks.push(self.check_database().await);
        checks.extend(self.check_providers().await);
        checks.push(self.check_memory());
        checks
    }

    fn check_config(&self) -> HealthCheck {
        let status = match self.settings.validate() {
            Ok(()) => HealthStatus::Pass,
            Err(err) => HealthStatus::Fail(err.to_string()),
        };
        HealthCheck {
            name: "Configuration".to_string(),
            status,
        }
    }

    async fn check_database(&self) -> HealthCheck {
        let status = match &self.settings.database_url {
            None => HealthStatus::Warn("DATABASE_URL not set, auth disabled".to_string()),
            Some(url) => match db::connect(url).await {
                Ok(pool) => match db::ping(&pool).await {
                    Ok(()) => HealthStatus::Pass,
                    Err(err) => HealthStatus::Fail(format!("ping failed: {err}")),
                },
                Err(err) => HealthStatus::Fail(format!("cannot connect: {err}")),
            },
        };
        HealthCheck {
            name: "Database".to_string(),
            status,
        }
    }

    async fn check_providers(&self) -> Vec<HealthCheck> {
        let registry = match ProviderRegistry::from_settings(&self.settings) {
            Ok(registry) => registry,
            Err(err) => {
                return vec![HealthCheck {
                    name: "Providers".to_string(),
                    status: HealthStatus::Fail(err.to_string()),
                }]
            }
        };

        let mut checks = Vec::new();
        for (label, provider) in [
            ("Chat Provider", &registry.chat),
            ("Reason Provider", &registry.reason),
        ] {
            let status = if provider.health_check().await {
                HealthStatus::Pass
            } else {
                HealthStatus::Fail(format!(
                    "{} ({}) not reachable",
                    provider.name(),
                    provider.model()
                ))
            };
            checks.push(HealthCheck {
                name: label.to_string(),
                status,
            });
        }
        checks
    }

    fn check_memory(&self) -> HealthCheck {
        let mut sys = System::new_all();
        sys.refresh_memory();
        let available_gb = sys.available_memory() / (1024 * 1024 * 1024);

        let status = if available_gb < 1 {
            HealthStatus::Fail(format!("less than 1GB RAM available ({available_gb} GB)"))
        } else if available_gb < 2 {
            HealthStatus::Warn(format!("low memory ({available_gb} GB available)"))
        } else {
            HealthStatus::Pass
        };
        HealthCheck {
            name: "Memory".to_string(),
            status,
        }
    }

    /// Print results as a table
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\nAssistGen diagnostics\n");
        println!("{:<18} Status", "Check");
        println!("{}", "=".repeat(50));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => "PASS".green().to_string(),
                HealthStatus::Warn(msg) => format!("{} {msg}", "WARN".yellow()),
                HealthStatus::Fail(msg) => format!("{} {msg}", "FAIL".red()),
            };
            println!("{:<18} {status}", check.name);
        }
        println!();
    }

    /// Healthy means no check failed; warnings are tolerated
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks
            .iter()
            .any(|check| matches!(check.status, HealthStatus::Fail(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_settings() -> Settings {
        Settings::from_lookup(|key| match key {
            "CHAT_SERVICE" | "REASON_SERVICE" => Some("OLLAMA".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_config_check_passes_for_ollama_only() {
        let doctor = Doctor::new(minimal_settings());
        let check = doctor.check_config();
        assert_eq!(check.status, HealthStatus::Pass);
    }

    #[test]
    fn test_config_check_fails_without_deepseek_key() {
        let settings = Settings::from_lookup(|key| match key {
            "CHAT_SERVICE" => Some("DEEPSEEK".to_string()),
            _ => None,
        })
        .unwrap();
        let doctor = Doctor::new(settings);
        assert!(matches!(doctor.check_config().status, HealthStatus::Fail(_)));
    }

    #[tokio::test]
    async fn test_missing_database_is_a_warning() {
        let doctor = Doctor::new(minimal_settings());
        let check = doctor.check_database().await;
        assert!(matches!(check.status, HealthStatus::Warn(_)));
    }

    #[test]
    fn test_overall_status() {
        let checks = vec![
            HealthCheck {
                name: "A".to_string(),
                status: HealthStatus::Pass,
            },
            HealthCheck {
                name: "B".to_string(),
                status: HealthStatus::Warn("w".to_string()),
            },
        ];
        assert!(Doctor::overall_status(&checks));

        let checks = vec![HealthCheck {
            name: "C".to_string(),
            status: HealthStatus::Fail("f".to_string()),
        }];
        assert!(!Doctor::overall_status(&checks));
    }
}
