use argh::FromArgs;
use std::path::PathBuf;

use photoscan::mask::walker::validate_folder;
use photoscan::mask::{
    build_backend, create_masks_in_folder, BackendConfig, ProcessMethod, SourceFileType,
};

#[derive(FromArgs)]
/// Write a binary foreground mask next to every photograph of a folder
struct Args {
    /// folder that contains the images to process
    #[argh(option, short = 'f')]
    folder: PathBuf,

    /// masking method: removebg or rembg
    #[argh(option, short = 'm')]
    method: ProcessMethod,

    /// type of the images in the folder: .NEF or .jpg
    #[argh(option, short = 't', long = "type")]
    file_type: SourceFileType,

    /// overwrite existing masks
    #[argh(switch, short = 'o')]
    overwrite: bool,

    /// API key for remove.bg
    #[argh(option, short = 'a', long = "removebg-key")]
    removebg_key: Option<String>,

    /// path to the ISNet ONNX model, downloaded when missing
    #[argh(option)]
    model_path: Option<PathBuf>,

    /// path to the ORT dylib
    #[argh(option)]
    ort_dylib_path: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    // set the ort dylib path
    if let Some(ort_dylib_path) = args.ort_dylib_path.as_ref() {
        std::env::set_var("ORT_DYLIB_PATH", ort_dylib_path);
    }

    validate_folder(&args.folder)?;

    let config = BackendConfig {
        api_key: args.removebg_key,
        model_path: args.model_path,
        ..BackendConfig::new(args.method)
    };
    config.validate()?;

    let mut backend = build_backend(&config)?;
    log::info!("Masking {} files with {}", args.file_type, args.method);

    let summary = create_masks_in_folder(
        &args.folder,
        args.file_type,
        backend.as_mut(),
        args.overwrite,
    )?;

    println!(
        "Done: {} masks written, {} skipped",
        summary.processed, summary.skipped
    );

    Ok(())
}
