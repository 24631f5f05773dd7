use std::path::{Path, PathBuf};
use std::thread;

use tracing::warn;
use tryon_contracts::image::{read_image_file, EncodedImage};
use tryon_contracts::validation::UPLOAD_READ_FAILED;
use tryon_contracts::{StudioError, StudioResult};

/// Reads the user's source photo.
pub fn read_photo(path: &Path) -> StudioResult<EncodedImage> {
    read_image_file(path).map_err(|err| {
        warn!(path = %path.display(), error = %format!("{err:#}"), "photo upload failed");
        StudioError::invalid_input(format!("Could not read {}: {err:#}", path.display()))
    })
}

/// Reads every file on its own thread and only assembles the list once all
/// reads are done. Input order is kept; one failure rejects the batch.
pub fn read_images_parallel(paths: &[PathBuf]) -> StudioResult<Vec<EncodedImage>> {
    let outcomes: Vec<anyhow::Result<EncodedImage>> = thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| scope.spawn(move || read_image_file(path)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("image reader thread panicked")))
            })
            .collect()
    });

    let mut images = Vec::with_capacity(outcomes.len());
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok(image) => images.push(image),
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "error converting upload");
                return Err(StudioError::invalid_input(UPLOAD_READ_FAILED));
            }
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};
    use tryon_contracts::validation::UPLOAD_READ_FAILED;
    use tryon_contracts::StudioError;

    use super::{read_images_parallel, read_photo};

    fn write_png(path: &std::path::Path, shade: u8) -> anyhow::Result<()> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::from_pixel(3, 3, Rgb([shade, shade, shade])).write_to(&mut out, ImageFormat::Png)?;
        std::fs::write(path, out.into_inner())?;
        Ok(())
    }

    #[test]
    fn parallel_reads_keep_input_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut paths = Vec::new();
        for shade in [10u8, 120, 240] {
            let path = temp.path().join(format!("item-{shade}.png"));
            write_png(&path, shade)?;
            paths.push(path);
        }

        let images = read_images_parallel(&paths)?;
        assert_eq!(images.len(), 3);
        for (path, image) in paths.iter().zip(&images) {
            assert_eq!(image.decode_bytes()?, std::fs::read(path)?);
        }
        Ok(())
    }

    #[test]
    fn one_bad_file_rejects_the_batch() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let good = temp.path().join("good.png");
        write_png(&good, 50)?;
        let missing = temp.path().join("missing.png");

        let err = read_images_parallel(&[good, missing]).unwrap_err();
        assert_eq!(err, StudioError::InvalidInput(UPLOAD_READ_FAILED.to_string()));
        Ok(())
    }

    #[test]
    fn unreadable_photo_is_invalid_input() {
        let err = read_photo(std::path::Path::new("/definitely/not/here.jpg")).unwrap_err();
        assert!(matches!(err, StudioError::InvalidInput(message) if message.contains("Could not read")));
    }
}
