use nodeweave_agent::workflows::{chat, hello, ingest, rag};
use nodeweave_core::config::AppConfig;
use nodeweave_memory::SqliteDocumentStore;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

/// Print one line per check and a pass/issue tally. Returns the issue count.
pub fn run_doctor(config: &AppConfig) -> usize {
    let checks = vec![
        check_api_key(config),
        check_fallbacks(config),
        check_store(config),
        check_log_file(config),
        check_workflows(),
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

fn has_key(key: Option<&String>) -> bool {
    key.is_some_and(|k| !k.is_empty() && !k.starts_with("${"))
}

fn needs_key(provider: &str) -> bool {
    !matches!(provider, "mock" | "ollama")
}

fn check_api_key(config: &AppConfig) -> CheckResult {
    let provider = &config.model.provider;
    let ok = !needs_key(provider) || has_key(config.model.api_key.as_ref());
    CheckResult {
        label: "API Key".into(),
        ok,
        detail: if ok {
            format!("Configured for {} ({})", config.model.model_id, provider)
        } else {
            format!("No API key set for provider '{}'", provider)
        },
    }
}

fn check_fallbacks(config: &AppConfig) -> CheckResult {
    let missing: Vec<&str> = config
        .fallback_models
        .iter()
        .filter(|m| needs_key(&m.provider) && !has_key(m.api_key.as_ref()))
        .map(|m| m.model_id.as_str())
        .collect();

    if !missing.is_empty() {
        CheckResult {
            label: "Fallbacks".into(),
            ok: false,
            detail: format!("Missing API key for {}", missing.join(", ")),
        }
    } else if config.fallback_models.is_empty() {
        CheckResult {
            label: "Fallbacks".into(),
            ok: true,
            detail: "None configured".into(),
        }
    } else {
        CheckResult {
            label: "Fallbacks".into(),
            ok: true,
            detail: format!("{} models", config.fallback_models.len()),
        }
    }
}

fn check_store(config: &AppConfig) -> CheckResult {
    let path = config.store_path();
    let opened = SqliteDocumentStore::open(&path).and_then(|store| {
        let collections = store.collections()?;
        let mut docs = 0;
        for name in &collections {
            docs += store.count(name)?;
        }
        Ok((collections.len(), docs))
    });
    match opened {
        Ok((collections, docs)) => CheckResult {
            label: "Store".into(),
            ok: true,
            detail: format!(
                "{} ({} collections, {} documents)",
                path.display(),
                collections,
                docs
            ),
        },
        Err(e) => CheckResult {
            label: "Store".into(),
            ok: false,
            detail: format!("{}: {}", path.display(), e),
        },
    }
}

fn check_log_file(config: &AppConfig) -> CheckResult {
    let Some(ref file) = config.log.file else {
        return CheckResult {
            label: "Log file".into(),
            ok: true,
            detail: "Console only".into(),
        };
    };
    let path = std::path::Path::new(file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    if dir.is_dir() {
        CheckResult {
            label: "Log file".into(),
            ok: true,
            detail: file.clone(),
        }
    } else {
        CheckResult {
            label: "Log file".into(),
            ok: false,
            detail: format!("{} (directory {} does not exist)", file, dir.display()),
        }
    }
}

fn check_workflows() -> CheckResult {
    let results = [
        ("hello", hello::graph().validate()),
        ("chat", chat::graph().validate()),
        ("ingest", ingest::graph().validate()),
        ("rag", rag::graph().validate()),
    ];
    let broken: Vec<String> = results
        .iter()
        .filter_map(|(name, r)| r.as_ref().err().map(|e| format!("{}: {}", name, e)))
        .collect();

    if broken.is_empty() {
        CheckResult {
            label: "Workflows".into(),
            ok: true,
            detail: format!("{} graphs closed", results.len()),
        }
    } else {
        CheckResult {
            label: "Workflows".into(),
            ok: false,
            detail: broken.join("; "),
        }
    }
}
