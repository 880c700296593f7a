//! `list` command: images saved by the active provider.

use orbitlapse::loader::ImageryLoader;
use orbitlapse::provider::ReqwestClient;

use crate::error::CliError;

/// Run the list command.
pub fn run(loader: &ImageryLoader<ReqwestClient>) -> Result<(), CliError> {
    let info = loader.current_source();
    let images = loader.list_downloaded_images()?;

    println!(
        "{} image(s) from {} in {}",
        images.len(),
        info.source_name,
        info.data_directory.display()
    );
    if images.is_empty() {
        return Ok(());
    }
    println!();
    for image in &images {
        match &image.metadata {
            Some(record) => println!(
                "  {:<48} {}  {:>5.1}%  {}",
                image.filename, record.date, record.cloud_cover, record.satellite
            ),
            None => println!("  {:<48} (no metadata)", image.filename),
        }
    }
    Ok(())
}
