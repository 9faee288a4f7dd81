//! Baseline listing and removal

use console::style;
use storyprobe::{BaselineEntry, BaselineStore, StoryId};
use tracing::info;

use crate::commands::{selected_kinds, ListArgs, ListFormat, RemoveArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Execute `baselines list`
pub fn execute_list(config: &CliConfig, args: &ListArgs) -> CliResult<()> {
    let store = BaselineStore::from_config(&config.probe_config()?);
    let entries = list_entries(&store, args)?;
    match args.format {
        ListFormat::Json => {
            let json =
                serde_json::to_string_pretty(&entries).map_err(|e| CliError::render(e.to_string()))?;
            println!("{json}");
        }
        ListFormat::Text => {
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
            if !config.verbosity.is_quiet() {
                eprintln!("{} baseline(s)", entries.len());
            }
        }
    }
    Ok(())
}

/// Baselines matching the `--kind` filter, sorted
pub fn list_entries(store: &BaselineStore, args: &ListArgs) -> CliResult<Vec<BaselineEntry>> {
    let mut entries = Vec::new();
    for kind in selected_kinds(args.kind) {
        entries.extend(store.list(kind)?);
    }
    entries.sort();
    Ok(entries)
}

fn format_entry(entry: &BaselineEntry) -> String {
    format!(
        "{} {} {}  {}",
        style(entry.kind).cyan(),
        entry.story,
        style(&entry.name).bold(),
        style(entry.path.display()).dim()
    )
}

/// Execute `baselines remove`
pub fn execute_remove(config: &CliConfig, args: &RemoveArgs) -> CliResult<()> {
    let store = BaselineStore::from_config(&config.probe_config()?);
    let removed = remove_baselines(&store, args)?;
    if !config.verbosity.is_quiet() {
        println!("{} {removed} baseline(s) for {}", style("Removed").green(), args.story);
    }
    Ok(())
}

/// Delete the selected baselines and return how many files went away
pub fn remove_baselines(store: &BaselineStore, args: &RemoveArgs) -> CliResult<usize> {
    let story = StoryId::new(args.story.as_str())?;
    let mut removed = 0;
    for kind in selected_kinds(args.kind) {
        removed += match args.name {
            Some(ref name) => usize::from(store.remove(kind, &story, name)?),
            None => store.remove_story(kind, &story)?,
        };
    }
    info!(story = %story, removed, "baselines removed");
    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::KindArg;
    use storyprobe::BaselineKind;

    fn seeded() -> (tempfile::TempDir, BaselineStore, StoryId) {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path().join("screenshots"), dir.path().join("snapshots"));
        let story = StoryId::new("example-button--primary").unwrap();
        store.write(BaselineKind::Visual, &story, "default", b"png").unwrap();
        store.write(BaselineKind::Visual, &story, "hover", b"png").unwrap();
        store.write(BaselineKind::Structural, &story, "default", b"{}").unwrap();
        (dir, store, story)
    }

    fn list_args(kind: Option<KindArg>) -> ListArgs {
        ListArgs {
            kind,
            format: ListFormat::Text,
        }
    }

    fn remove_args(name: Option<&str>, kind: Option<KindArg>) -> RemoveArgs {
        RemoveArgs {
            story: "example-button--primary".into(),
            name: name.map(String::from),
            kind,
        }
    }

    mod list_tests {
        use super::*;

        #[test]
        fn test_lists_all_kinds() {
            let (_dir, store, _) = seeded();
            let entries = list_entries(&store, &list_args(None)).unwrap();
            assert_eq!(entries.len(), 3);
            let visual = list_entries(&store, &list_args(Some(KindArg::Visual))).unwrap();
            assert_eq!(visual.len(), 2);
            assert!(visual.iter().all(|e| e.kind == BaselineKind::Visual));
        }

        #[test]
        fn test_format_entry_mentions_story() {
            console::set_colors_enabled(false);
            let (_dir, store, _) = seeded();
            let entries = list_entries(&store, &list_args(Some(KindArg::Structural))).unwrap();
            let line = format_entry(&entries[0]);
            assert!(line.contains("example-button--primary"));
            assert!(line.contains("default"));
        }
    }

    mod remove_tests {
        use super::*;

        #[test]
        fn test_remove_single_name() {
            let (_dir, store, story) = seeded();
            let removed =
                remove_baselines(&store, &remove_args(Some("default"), Some(KindArg::Visual))).unwrap();
            assert_eq!(removed, 1);
            assert!(!store.exists(BaselineKind::Visual, &story, "default").unwrap());
            assert!(store.exists(BaselineKind::Structural, &story, "default").unwrap());
        }

        #[test]
        fn test_remove_whole_story() {
            let (_dir, store, _) = seeded();
            assert_eq!(remove_baselines(&store, &remove_args(None, None)).unwrap(), 3);
            assert_eq!(remove_baselines(&store, &remove_args(None, None)).unwrap(), 0);
        }

        #[test]
        fn test_invalid_story_id() {
            let (_dir, store, _) = seeded();
            let mut args = remove_args(None, None);
            args.story = "NotAStory".into();
            assert!(remove_baselines(&store, &args).is_err());
        }
    }
}
