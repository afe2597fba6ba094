use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use imgfs::config::init_logging;
use imgfs::store::imgfs::{DEFAULT_MAX_FILES, DEFAULT_SMALL_RES, DEFAULT_THUMB_RES};

mod commands;

/// imgFS command line tool
#[derive(Debug, Parser)]
#[command(name = "imgfscmd", version, about = "Manage an imgFS store file")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List imgFS content
    List { store: PathBuf },

    /// Create a new imgFS
    Create {
        store: PathBuf,

        /// Maximum number of files
        #[arg(long = "max-files", default_value_t = DEFAULT_MAX_FILES)]
        max_files: u32,

        /// Resolution for thumbnail images (max 128x128)
        #[arg(long = "thumb-res", num_args = 2, value_names = ["X_RES", "Y_RES"],
              default_values_t = [DEFAULT_THUMB_RES, DEFAULT_THUMB_RES])]
        thumb_res: Vec<u16>,

        /// Resolution for small images (max 512x512)
        #[arg(long = "small-res", num_args = 2, value_names = ["X_RES", "Y_RES"],
              default_values_t = [DEFAULT_SMALL_RES, DEFAULT_SMALL_RES])]
        small_res: Vec<u16>,
    },

    /// Read an image from the imgFS and save it to a file
    Read {
        store: PathBuf,
        img_id: String,

        /// original|orig|thumbnail|thumb|small
        #[arg(default_value = "original")]
        resolution: String,
    },

    /// Insert a new image in the imgFS
    Insert {
        store: PathBuf,
        img_id: String,
        filename: PathBuf,
    },

    /// Delete image imgID from imgFS
    Delete { store: PathBuf, img_id: String },

    /// Insert every JPEG found under a folder, using file stems as ids
    Import { store: PathBuf, folder: PathBuf },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::List { store } => commands::do_list_cmd(&store),
        Command::Create {
            store,
            max_files,
            thumb_res,
            small_res,
        } => commands::do_create_cmd(&store, max_files, &thumb_res, &small_res),
        Command::Read {
            store,
            img_id,
            resolution,
        } => commands::do_read_cmd(&store, &img_id, &resolution),
        Command::Insert {
            store,
            img_id,
            filename,
        } => commands::do_insert_cmd(&store, &img_id, &filename),
        Command::Delete { store, img_id } => commands::do_delete_cmd(&store, &img_id),
        Command::Import { store, folder } => commands::do_import_cmd(&store, &folder),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            ExitCode::FAILURE
        }
    }
}
