use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use authentext_lib::models::{ScoreDisplay, ScoreOptions, ScoreResult};
use authentext_lib::services::detection::{score_batch, DetectionSensitivity, DEFAULT_BATCH_CONCURRENCY};
use authentext_lib::services::text_processor::preview;
use authentext_lib::services::{ConfigStore, EngineConfig, ScoringEngine};
use serde::Serialize;

const VALUE_FLAGS: [&str; 6] = [
    "--max-sentences",
    "--sensitivity",
    "--config",
    "--budget-ms",
    "--out",
    "--concurrency",
];

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

/// Positional arguments: everything that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for a in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&a.as_str()) {
            skip_next = true;
            continue;
        }
        if a.starts_with("--") {
            continue;
        }
        out.push(a.clone());
    }
    out
}

fn parse_number<T: std::str::FromStr>(args: &[String], key: &str) -> anyhow::Result<Option<T>> {
    match parse_arg_value(args, key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} expects a non-negative integer, got {:?}", key, v)),
        None => Ok(None),
    }
}

fn load_config(args: &[String]) -> anyhow::Result<EngineConfig> {
    let store = match parse_arg_value(args, "--config") {
        Some(path) => Some(ConfigStore::from_file(PathBuf::from(path))),
        None => ConfigStore::default_config_dir().map(ConfigStore::new),
    };
    let mut config = match store {
        Some(store) => store
            .load()
            .with_context(|| format!("loading config {}", store.config_file().display()))?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(level) = parse_arg_value(args, "--sensitivity") {
        config.sensitivity = DetectionSensitivity::from_label(&level).as_str().to_string();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    source: String,
    display: ScoreDisplay,
    result: ScoreResult,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        eprintln!(
            "Usage:\n  score_text [<file>...] [--detailed] [--max-sentences <n>] [--sensitivity <low|medium|high>] \
             [--config <config.json>] [--budget-ms <n>] [--concurrency <n>] [--out <json_path>]\n\n\
             Reads stdin when no file is given (or the file is `-`)."
        );
        return Ok(());
    }

    authentext_lib::init_logging();

    let config = load_config(&args)?;
    let options = ScoreOptions {
        detailed: has_flag(&args, "--detailed"),
        max_sentences: parse_number(&args, "--max-sentences")?,
        budget: parse_number::<u64>(&args, "--budget-ms")?.map(Duration::from_millis),
    };
    let concurrency = parse_number(&args, "--concurrency")?.unwrap_or(DEFAULT_BATCH_CONCURRENCY);
    let out_path = parse_arg_value(&args, "--out");

    let mut sources = positional(&args);
    if sources.is_empty() {
        sources.push("-".to_string());
    }

    let mut texts = Vec::with_capacity(sources.len());
    for source in &sources {
        let text = if source == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        } else {
            std::fs::read_to_string(source).with_context(|| format!("reading {}", source))?
        };
        texts.push(text);
    }

    let engine = Arc::new(ScoringEngine::from_config(config).context("loading pattern catalog")?);
    let results = score_batch(engine.clone(), texts, options, concurrency).await;

    let mut outputs = Vec::with_capacity(results.len());
    for (source, result) in sources.into_iter().zip(results) {
        let display = ScoreDisplay::from(&result);
        println!("Source: {}", source);
        println!(
            "Prediction: {}  (ai={:.2}%, human={:.2}%, confidence={:.2})",
            display.prediction, display.scores.ai_generated, display.scores.human, display.confidence
        );
        println!(
            "Words: {}  Patterns: {} hits in {} categories{}",
            result.word_count,
            result.pattern_summary.total_count,
            result.distinct_categories(),
            if result.truncated { "  [truncated]" } else { "" }
        );
        if let Some(warning) = &result.warning {
            println!("Warning: {}", warning);
        }
        for (name, category) in &result.pattern_summary.categories {
            println!("  - {} ({}): {}", name, category.label, category.count);
        }
        for s in &result.sentences {
            println!(
                "[S{:02}] ai={:>6.2}%{}  {}",
                s.index,
                s.ai_probability * 100.0,
                if s.flagged { " *" } else { "  " },
                preview(&s.text, 100)
            );
        }
        if let Some(summary) = &result.sentence_summary {
            println!(
                "Sentences: scored={} omitted={} flagged={} consistency={:.2}{}",
                summary.scored,
                summary.omitted,
                summary.flagged,
                summary.consistency_score,
                if summary.interrupted { " (budget exhausted)" } else { "" }
            );
        }
        println!();
        outputs.push(Output { source, display, result });
    }

    if let Some(cache) = engine.cache() {
        let stats = cache.stats();
        tracing::info!(
            "[score_text] cache hits={} misses={} entries={}",
            stats.hits,
            stats.misses,
            stats.len
        );
    }

    if let Some(out_path) = out_path {
        let json = serde_json::to_string_pretty(&outputs)?;
        std::fs::write(&out_path, json).with_context(|| format!("writing {}", out_path))?;
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_skips_flag_values() {
        let a = args(&["score_text", "a.txt", "--max-sentences", "5", "--detailed", "b.txt"]);
        assert_eq!(positional(&a), vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(parse_number::<usize>(&a, "--max-sentences").unwrap(), Some(5));
        assert!(parse_number::<u64>(&args(&["x", "--budget-ms", "-1"]), "--budget-ms").is_err());
    }

    #[tokio::test]
    async fn test_blank_input_scores_neutral_with_warning() {
        let engine = Arc::new(ScoringEngine::from_config(EngineConfig::default()).unwrap());
        let texts = vec!["  \n\t ".to_string()];
        let results = score_batch(engine, texts, ScoreOptions::default(), 1).await;
        assert_eq!(results.len(), 1);
        let display = ScoreDisplay::from(&results[0]);
        assert_eq!(display.prediction, "uncertain");
        assert_eq!(display.scores.ai_generated, 50.0);
        assert!(display.warning.is_some());
    }
}
