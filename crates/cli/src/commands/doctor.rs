use serde::Serialize;
use smartscoop_core::config::{AppConfig, CatalogProvider, LoadOptions};
use smartscoop_db::connect_with_settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\
                \"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_catalog_readiness(&config));
            checks.push(check_recommendation_catalog(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["catalog_readiness", "recommendation_catalog", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail)
        && checks.iter().any(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog_readiness(config: &AppConfig) -> DoctorCheck {
    let local_missing = config.catalog.local_path.as_deref().filter(|path| !path.exists());
    if let Some(path) = local_missing {
        return DoctorCheck {
            name: "catalog_readiness",
            status: CheckStatus::Fail,
            details: format!("catalog.local_path `{}` does not exist", path.display()),
        };
    }

    let details = match config.catalog.provider {
        CatalogProvider::Amazon if config.catalog.local_path.is_some() => {
            format!("amazon catalog at {} with local fallback", config.catalog.base_url)
        }
        CatalogProvider::Amazon => format!("amazon catalog at {}", config.catalog.base_url),
        CatalogProvider::Local => "local catalog file present".to_string(),
    };
    DoctorCheck { name: "catalog_readiness", status: CheckStatus::Pass, details }
}

fn check_recommendation_catalog(config: &AppConfig) -> DoctorCheck {
    match config.recommendation.catalog_path.as_deref() {
        None => DoctorCheck {
            name: "recommendation_catalog",
            status: CheckStatus::Skipped,
            details: "recommendation.catalog_path is not set; recommendations will be empty"
                .to_string(),
        },
        Some(path) if path.exists() => DoctorCheck {
            name: "recommendation_catalog",
            status: CheckStatus::Pass,
            details: format!("embedding catalog `{}` present", path.display()),
        },
        Some(path) => DoctorCheck {
            name: "recommendation_catalog",
            status: CheckStatus::Fail,
            details: format!("recommendation.catalog_path `{}` does not exist", path.display()),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
