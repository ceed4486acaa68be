use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod columns;
mod controller;
mod domain;
mod inputter;
mod labels;
mod model;
mod pagination;
mod register;
mod storage;
mod ui;

use columns::{ColumnVisibility, VISIBILITY_STORAGE_KEY};
use controller::Controller;
use domain::{AVConfig, AVError, Args};
use labels::{LabelSheetRenderer, expand_by_quantity};
use model::{Model, Status};
use pagination::paginate;
use register::Register;
use storage::{FileStore, MemoryStore, VisibilityStore};
use ui::TableUI;

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Could not open log file {}: {e}", args.log_file.display());
    }

    let result = if args.print_labels {
        print_labels(&args)
    } else {
        run(&args)
    };
    match result {
        Err(e) => {
            error!("assetview failed: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

// The terminal belongs to the TUI, so logs go to a file.
fn init_logging(args: &Args) -> Result<(), AVError> {
    let file = File::create(&args.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("assetview=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn open_store(args: &Args) -> Result<Box<dyn VisibilityStore>, AVError> {
    let store: Box<dyn VisibilityStore> = if args.no_persist {
        Box::new(MemoryStore::new())
    } else {
        match &args.state_dir {
            Some(dir) => Box::new(FileStore::from_user_path(dir)?),
            None => Box::new(FileStore::default_for_app("assetview")),
        }
    };
    if args.reset_columns {
        match store.clear(VISIBILITY_STORAGE_KEY) {
            Ok(()) => info!("Cleared saved column choices"),
            Err(e) => warn!("Could not clear saved column choices: {e}"),
        }
    }
    Ok(store)
}

fn print_labels(args: &Args) -> Result<(), AVError> {
    let register = Register::load(args.file.clone())?;
    let rows: Vec<usize> = (0..register.nrows()).collect();
    let assets = register.label_assets(&rows);
    let renderer = LabelSheetRenderer::new(Local::now().date_naive())
        .company(args.company.clone())
        .qr_base_url(args.qr_base_url.clone());

    if args.dry_run {
        let labels = expand_by_quantity(&assets);
        let pages = paginate(&labels, renderer.layout.capacity());
        print!("{}", renderer.render_text(&pages));
    } else {
        let summary = labels::write_label_sheets(&assets, &renderer, &args.label_output)?;
        println!(
            "Wrote {} labels for {} assets on {} sheets to {}",
            summary.labels,
            summary.assets,
            summary.pages,
            args.label_output.display()
        );
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), AVError> {
    let config = AVConfig::from(args);
    let register = Register::load(args.file.clone())?;
    let columns = ColumnVisibility::new(register.definitions(), catalog::groups(), open_store(args)?);

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), AVError> {
        let size = terminal.size()?;
        let mut model = Model::init(
            &config,
            register,
            columns,
            catalog::presets(),
            size.width as usize,
            size.height as usize,
        );
        let mut ui = TableUI::new(&config);
        let controller = Controller::new(&config);

        while model.status != Status::QUITTING {
            terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

            if let Some(message) = controller.handle_event(&model)? {
                model.update(Some(message))?;
            };
        }
        Ok(())
    })();
    ratatui::restore();
    result
}
