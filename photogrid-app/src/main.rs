mod app_dir;
mod export;
mod preferences;
mod session;
mod sheet;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use preferences::{clamp_columns, clamp_rows, clamp_thumbnail_size, AppPreferences};
use session::Session;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "photogrid",
    about = "Render a page of a photo folder as a contact sheet"
)]
struct Cli {
    /// Folder to scan. Defaults to the last folder used, then the Pictures folder.
    root: Option<PathBuf>,

    /// Thumbnails per row (1-8).
    #[arg(long)]
    columns: Option<u32>,

    /// Rows on the sheet (1-32).
    #[arg(long)]
    rows: Option<u32>,

    /// Index of the first image. Defaults to where the last run stopped.
    #[arg(long)]
    start: Option<usize>,

    /// Thumbnail side length in pixels (16-512).
    #[arg(long)]
    size: Option<u32>,

    /// Where to write the sheet PNG.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Re-scan the folder after the first sheet and rewrite it if anything changed.
    #[arg(long)]
    refresh: bool,

    /// Leave the saved preferences untouched.
    #[arg(long)]
    no_save: bool,
}

impl Cli {
    fn apply_to(&self, prefs: &mut AppPreferences) {
        if let Some(columns) = self.columns {
            prefs.columns = clamp_columns(columns);
        }
        if let Some(rows) = self.rows {
            prefs.rows = clamp_rows(rows);
        }
        if let Some(size) = self.size {
            prefs.loader.thumbnail_size = clamp_thumbnail_size(size);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn run(cli: &Cli, prefs: &mut AppPreferences) -> Result<(), String> {
    let root = cli
        .root
        .clone()
        .or_else(|| prefs.last_root.clone())
        .unwrap_or_else(app_dir::default_photo_root);
    let output = cli.output.clone().unwrap_or_else(app_dir::default_sheet_path);

    let mut session = Session::open(&root, prefs).map_err(|e| e.to_string())?;
    let start = cli.start.unwrap_or(prefs.resume_position);
    let report = session.show_page(start);
    info!(
        images = report.collection_len,
        first = report.first_index,
        rendered = report.rendered,
        failed = report.failed,
        elapsed_ms = report.elapsed.as_millis(),
        "Sheet rendered"
    );
    session.export(&output)?;
    info!("Wrote {}", output.display());

    if cli.refresh {
        match session.refresh() {
            Some(true) => {
                let report = session.report(report.elapsed);
                info!(
                    images = report.collection_len,
                    rendered = report.rendered,
                    "Collection changed, sheet updated"
                );
                session.export(&output)?;
            }
            Some(false) => info!("Collection unchanged"),
            None => error!("Refresh did not complete"),
        }
    }

    prefs.resume_position = session.first_index();
    prefs.last_root = Some(root);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting photogrid");

    let mut prefs = AppPreferences::load();
    cli.apply_to(&mut prefs);

    match run(&cli, &mut prefs) {
        Ok(()) => {
            if !cli.no_save {
                prefs.save();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_preferences() {
        let cli = Cli::parse_from(["photogrid", "/pics", "--columns", "12", "--rows", "0", "--size", "96"]);
        let mut prefs = AppPreferences::default();
        cli.apply_to(&mut prefs);
        assert_eq!(prefs.columns, 8);
        assert_eq!(prefs.rows, 1);
        assert_eq!(prefs.loader.thumbnail_size, 96);
        assert_eq!(cli.root, Some(PathBuf::from("/pics")));
        assert!(!cli.refresh);
    }

    #[test]
    fn huge_grid_flags_are_capped() {
        let cli = Cli::parse_from(["photogrid", "--rows", "4000000000", "--size", "4000000000"]);
        let mut prefs = AppPreferences::default();
        cli.apply_to(&mut prefs);
        assert_eq!(prefs.rows, preferences::MAX_ROWS);
        assert_eq!(prefs.loader.thumbnail_size, preferences::MAX_THUMBNAIL_SIZE);

        let cli = Cli::parse_from(["photogrid", "--size", "0"]);
        cli.apply_to(&mut prefs);
        assert_eq!(prefs.loader.thumbnail_size, preferences::MIN_THUMBNAIL_SIZE);
    }

    #[test]
    fn absent_flags_keep_preferences() {
        let cli = Cli::parse_from(["photogrid", "--refresh", "--no-save"]);
        let mut prefs = AppPreferences::default();
        cli.apply_to(&mut prefs);
        assert_eq!(prefs, AppPreferences::default());
        assert!(cli.refresh && cli.no_save);
        assert!(cli.root.is_none());
    }
}
