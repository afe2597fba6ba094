/// Implementations of the imgfscmd subcommands
///
/// Each command opens the store, performs one operation and closes it.

use std::fs;
use std::path::Path;

use tracing::{info, warn};
use walkdir::WalkDir;

use imgfs::error::{ImgfsError, Result};
use imgfs::store::{do_list, CreateOptions, ImgFs, ListMode, Resolution};

/// Extensions picked up by `import`
const JPEG_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

pub fn do_list_cmd(store: &Path) -> Result<()> {
    let imgfs = ImgFs::open(store)?;
    print!("{}", do_list(&imgfs, ListMode::Stdout)?);
    imgfs.close()
}

pub fn do_create_cmd(store: &Path, max_files: u32, thumb_res: &[u16], small_res: &[u16]) -> Result<()> {
    let pair = |res: &[u16]| match res {
        [w, h] => Ok((*w, *h)),
        _ => Err(ImgfsError::NotEnoughArguments),
    };
    let options = CreateOptions {
        max_files,
        thumb_res: pair(thumb_res)?,
        small_res: pair(small_res)?,
    };
    ImgFs::create(store, options)?.close()
}

pub fn do_read_cmd(store: &Path, img_id: &str, resolution: &str) -> Result<()> {
    let res = Resolution::parse(resolution)?;

    let mut imgfs = ImgFs::open(store)?;
    let image = imgfs.read(img_id, res);
    imgfs.close()?;
    let image = image?;

    let out = format!("{}_{}.jpg", img_id, res.suffix());
    fs::write(&out, image)?;
    info!(path = %out, "Image written");
    Ok(())
}

pub fn do_insert_cmd(store: &Path, img_id: &str, filename: &Path) -> Result<()> {
    let image = fs::read(filename)?;

    let mut imgfs = ImgFs::open(store)?;
    let inserted = imgfs.insert(&image, img_id);
    imgfs.close()?;
    inserted.map(|_| ())
}

pub fn do_delete_cmd(store: &Path, img_id: &str) -> Result<()> {
    let mut imgfs = ImgFs::open(store)?;
    let deleted = imgfs.delete(img_id);
    imgfs.close()?;
    deleted
}

/// Walk `folder` recursively and insert every JPEG file
///
/// Files whose id is already taken, or whose bytes cannot be decoded, are
/// skipped. Import stops early if the store fills up.
pub fn do_import_cmd(store: &Path, folder: &Path) -> Result<()> {
    let mut imgfs = ImgFs::open(store)?;
    let mut imported_count = 0usize;
    let mut skipped_count = 0usize;

    info!(folder = %folder.display(), "🔍 Scanning folder");

    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_jpeg = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| JPEG_EXTENSIONS.contains(&ext.as_str()));
        if !is_jpeg {
            continue;
        }

        let Some(img_id) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let image = fs::read(path)?;
        match imgfs.insert(&image, &img_id) {
            Ok(_) => imported_count += 1,
            Err(ImgfsError::ImgfsFull) => {
                warn!("imgFS is full, stopping import");
                break;
            }
            Err(err @ (ImgfsError::DuplicateId | ImgfsError::ImgLib(_) | ImgfsError::InvalidImgId)) => {
                warn!(file = %path.display(), error = %err, "Skipping file");
                skipped_count += 1;
            }
            Err(err) => {
                imgfs.close()?;
                return Err(err);
            }
        }
    }

    info!(imported_count, skipped_count, "✅ Import complete");
    println!("Imported {} images, skipped {}.", imported_count, skipped_count);
    imgfs.close()
}
