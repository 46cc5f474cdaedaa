//! Export command - write a single tile as PNG.

use std::path::{Path, PathBuf};

use image::ImageFormat;

use mosaiclayer::{CompositeView, Tile};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the export command.
pub struct ExportArgs {
    pub zoom: u8,
    pub col: u32,
    pub row: u32,
    pub render: bool,
    pub output: PathBuf,
}

/// Run the export command.
pub fn run(config_path: Option<&Path>, args: ExportArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("export");
    let mosaic = runner.open_mosaic()?;

    let tile = fetch_tile(&mosaic.tiles(), &args)?;
    save_png(&tile, &args.output)?;

    println!(
        "Wrote tile {}/{}/{} ({}x{}) to {}",
        args.zoom,
        args.col,
        args.row,
        tile.width(),
        tile.height(),
        args.output.display()
    );
    Ok(())
}

fn fetch_tile(view: &CompositeView, args: &ExportArgs) -> Result<Tile, CliError> {
    let tile = if args.render {
        view.render_tile(args.zoom, args.col, args.row)?
    } else {
        view.get_tile(args.zoom, args.col, args.row)?
    };
    tile.ok_or(CliError::TileNotFound {
        zoom: args.zoom,
        col: args.col,
        row: args.row,
    })
}

fn save_png(tile: &Tile, path: &Path) -> Result<(), CliError> {
    tile.image()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|error| CliError::FileWrite {
            path: path.to_path_buf(),
            error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use mosaiclayer::{Envelope, Frame, GeoPoint, Mosaic, Projection, TilePyramid};
    use tempfile::TempDir;

    fn mosaic_with_frame() -> Mosaic {
        let pyramid = TilePyramid::quadtree(
            Projection::Equirectangular,
            Envelope::new(0.0, 0.0, 64.0, 64.0),
            8,
            0,
            2,
        )
        .unwrap();
        let mosaic = Mosaic::in_memory(pyramid);
        let frame = Frame::new(
            [
                GeoPoint::new(62.0, 2.0),
                GeoPoint::new(62.0, 14.0),
                GeoPoint::new(50.0, 14.0),
                GeoPoint::new(50.0, 2.0),
            ],
            1.0,
            RgbaImage::from_pixel(4, 4, Rgba([0, 200, 0, 255])),
        );
        mosaic.update_mosaic(&frame).unwrap();
        mosaic
    }

    fn args(zoom: u8, col: u32, row: u32, output: PathBuf) -> ExportArgs {
        ExportArgs {
            zoom,
            col,
            row,
            render: false,
            output,
        }
    }

    #[test]
    fn test_exported_png_matches_tile() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("tile.png");
        let mosaic = mosaic_with_frame();
        let view = mosaic.tiles();

        let export = args(2, 0, 0, output.clone());
        let tile = fetch_tile(&view, &export).unwrap();
        save_png(&tile, &output).unwrap();

        let written = image::open(&output).unwrap().into_rgba8();
        assert_eq!(&written, tile.image());
    }

    #[test]
    fn test_missing_tile_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let mosaic = mosaic_with_frame();

        let export = args(2, 3, 3, temp_dir.path().join("tile.png"));
        assert!(matches!(
            fetch_tile(&mosaic.tiles(), &export),
            Err(CliError::TileNotFound { zoom: 2, col: 3, row: 3 })
        ));
    }
}
