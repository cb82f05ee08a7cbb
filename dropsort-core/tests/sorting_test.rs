//! Integration tests for the sorting workflow
//!
//! Tests the complete path: config -> pipeline -> classify -> move

use dropsort_core::{Outcome, Pipeline, Result, Rule, SortError, SorterConfig};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Helper: watch folder + destination root with a fast readiness check
fn setup(rules: Vec<Rule>) -> Result<(TempDir, TempDir, Pipeline)> {
    let watch = TempDir::new().map_err(SortError::Io)?;
    let dest = TempDir::new().map_err(SortError::Io)?;

    let config = SorterConfig::new()
        .with_watch_path(watch.path())
        .with_dest_root(dest.path())
        .with_rules(rules)
        .with_poll_interval(Duration::from_millis(5))
        .with_max_readiness_attempts(3);
    config.validate()?;
    let pipeline = config.build_pipeline()?;

    Ok((watch, dest, pipeline))
}

fn write(dir: &Path, name: &str, content: &str) -> Result<std::path::PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content)?;
    Ok(path)
}

#[test]
fn test_extension_rule_round_trip() -> Result<()> {
    let (watch, dest, mut pipeline) = setup(vec![Rule::extension("*.png", "Images")])?;
    let photo = write(watch.path(), "photo.png", "png")?;

    let outcome = pipeline.process(&photo);

    let expected = dest.path().join("Images").join("photo.png");
    assert_eq!(
        outcome,
        Outcome::Moved {
            from: photo.clone(),
            to: expected.clone(),
            renamed: false
        }
    );
    assert!(expected.exists());
    assert!(!photo.exists());

    Ok(())
}

#[test]
fn test_unmatched_file_stays() -> Result<()> {
    let (watch, dest, mut pipeline) = setup(vec![Rule::extension("*.png", "Images")])?;
    let song = write(watch.path(), "song.mp3", "id3")?;

    assert_eq!(pipeline.process(&song), Outcome::LeftInPlace { path: song.clone() });
    assert!(song.exists());
    assert_eq!(fs::read_dir(dest.path())?.count(), 0);

    Ok(())
}

#[test]
fn test_first_matching_keyword_wins() -> Result<()> {
    let (watch, dest, mut pipeline) = setup(vec![
        Rule::keyword("tax", "Finance"),
        Rule::keyword("report", "Reports"),
    ])?;
    let file = write(watch.path(), "TAX-Report-2024.xlsx", "data")?;

    pipeline.process(&file);

    assert!(dest.path().join("Finance").join("TAX-Report-2024.xlsx").exists());
    assert!(!dest.path().join("Reports").exists());

    Ok(())
}

#[test]
fn test_content_keyword_without_name_match() -> Result<()> {
    let (watch, dest, mut pipeline) = setup(vec![Rule::content("invoice", "Finance")])?;
    let scan = write(watch.path(), "scan-0042.txt", "ACME Corp\nInvoice #123\nTotal: 99.00")?;

    assert!(pipeline.process(&scan).is_moved());
    assert!(dest.path().join("Finance").join("scan-0042.txt").exists());

    Ok(())
}

#[test]
fn test_collisions_yield_distinct_paths() -> Result<()> {
    let (watch, dest, mut pipeline) = setup(vec![Rule::extension("*.pdf", "Docs")])?;

    let first = write(watch.path(), "statement.pdf", "first")?;
    let first_outcome = pipeline.process(&first);

    let second = write(watch.path(), "statement.pdf", "second")?;
    let second_outcome = pipeline.process(&second);

    let third = write(watch.path(), "statement.pdf", "third")?;
    let third_outcome = pipeline.process(&third);

    let targets: Vec<_> = [first_outcome, second_outcome, third_outcome]
        .into_iter()
        .map(|outcome| match outcome {
            Outcome::Moved { to, .. } => to,
            other => panic!("expected a move, got {:?}", other),
        })
        .collect();

    let docs = dest.path().join("Docs");
    assert_eq!(
        targets,
        vec![
            docs.join("statement.pdf"),
            docs.join("statement (1).pdf"),
            docs.join("statement (2).pdf"),
        ]
    );
    assert_eq!(fs::read_to_string(&targets[0])?, "first");
    assert_eq!(fs::read_to_string(&targets[1])?, "second");
    assert_eq!(fs::read_to_string(&targets[2])?, "third");
    assert_eq!(pipeline.stats().renamed, 2);

    Ok(())
}

#[test]
fn test_partial_download_never_moved() -> Result<()> {
    let (watch, dest, mut pipeline) = setup(vec![
        Rule::keyword("invoice", "Finance"),
        Rule::extension("*", "Everything"),
    ])?;
    let partial = write(watch.path(), "invoice.pdf.crdownload", "%PDF")?;

    let mut outcomes = vec![pipeline.process(&partial)];
    while pipeline.has_pending() {
        outcomes.extend(pipeline.retry_pending());
    }

    assert!(outcomes.iter().all(|o| !o.is_moved()));
    assert!(matches!(outcomes.last(), Some(Outcome::Unresolved { attempts: 3, .. })));
    assert!(partial.exists());
    assert_eq!(fs::read_dir(dest.path())?.count(), 0);

    Ok(())
}

#[test]
fn test_already_moved_file_is_noop() -> Result<()> {
    let (watch, _dest, mut pipeline) = setup(vec![Rule::extension("*.png", "Images")])?;
    let photo = write(watch.path(), "photo.png", "png")?;

    assert!(pipeline.process(&photo).is_moved());
    assert_eq!(pipeline.process(&photo), Outcome::Skipped { path: photo.clone() });
    assert_eq!(pipeline.stats().moved, 1);
    assert_eq!(pipeline.stats().failed, 0);

    Ok(())
}

#[test]
fn test_default_routes_sweep() -> Result<()> {
    let watch = TempDir::new()?;
    let dest = TempDir::new()?;
    let config = SorterConfig::new()
        .with_watch_path(watch.path())
        .with_dest_root(dest.path())
        .with_poll_interval(Duration::from_millis(5));
    let mut pipeline = config.build_pipeline()?;

    write(watch.path(), "Resume_JDoe.pdf", "cv")?;
    write(watch.path(), "holiday.JPG", "jpg")?;
    write(watch.path(), "notes.md", "Receipt for your order")?;
    write(watch.path(), "homework-3.pdf", "math")?;
    write(watch.path(), "setup.exe", "MZ")?;

    let outcomes = pipeline.scan_existing(watch.path())?;
    assert_eq!(outcomes.len(), 5);

    assert!(dest.path().join("Resumes").join("Resume_JDoe.pdf").exists());
    assert!(dest.path().join("Images").join("holiday.JPG").exists());
    assert!(dest.path().join("Finance").join("notes.md").exists());
    assert!(dest.path().join("School").join("homework-3.pdf").exists());
    assert!(watch.path().join("setup.exe").exists());

    Ok(())
}

#[test]
fn test_config_file_drives_pipeline() -> Result<()> {
    let watch = TempDir::new()?;
    let dest = TempDir::new()?;
    let config_dir = TempDir::new()?;
    let config_path = config_dir.path().join("dropsort.json");

    let json = format!(
        r#"{{
            "watch_path": {watch:?},
            "dest_root": {dest:?},
            "stability_poll_interval_ms": 5,
            "rules": [
                {{"kind": "keyword", "pattern": "bank", "destination": "Finance/Bank"}}
            ]
        }}"#,
        watch = watch.path().to_string_lossy(),
        dest = dest.path().to_string_lossy(),
    );
    fs::write(&config_path, json)?;

    let config = SorterConfig::load(&config_path)?;
    config.validate()?;
    let mut pipeline = config.build_pipeline()?;

    let file = write(watch.path(), "Bank-Statement.csv", "a,b")?;
    assert!(pipeline.process(&file).is_moved());
    assert!(dest.path().join("Finance").join("Bank").join("Bank-Statement.csv").exists());

    Ok(())
}
