use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
};

use threadpool::ThreadPool;

pub use cli::CLIParser;
pub use error::Error;
use image::codec::{self, FileFormat, SaveOptions};
use image::effect::{ColorKey, Convert, FlipX, FlipY, Monochrome};
use image::format::{ChannelLayout, Compression, DataType};
use image::Image;

pub mod binary_stream;
mod cli;
pub mod color;
pub mod error;
pub mod image;
mod logger;

pub type Result<T> = std::result::Result<T, error::Error>;

#[derive(Clone, Debug)]
pub struct Arguments {
    input_files: Vec<PathBuf>,
    output_directory: PathBuf,
    format: FileFormat,
    compression: Compression,
    rle: bool,
    flip_x: bool,
    flip_y: bool,
    monochrome: bool,
    color_key: Option<color::RgbColor>,
    tolerance: f64,
    number_of_threads: usize,
}

fn open_input_file(file_path: &Path) -> Result<File> {
    File::open(file_path).map_err(|e| {
        Error::UnableToOpenInputFileForReading(file_path.display().to_string(), e)
    })
}

fn open_output_file(file_path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(file_path)
        .map_err(|e| {
            Error::UnableToOpenOutputFileForWriting(file_path.display().to_string(), e)
        })
}

/// Converts every input file on the worker pool and reports the first failure.
pub fn convert_images(arguments: &Arguments) -> Result<()> {
    let pool = ThreadPool::new(arguments.number_of_threads.max(1));
    let (sender, receiver) = mpsc::channel();
    let shared_arguments = Arc::new(arguments.clone());
    for input_file in &arguments.input_files {
        let sender = sender.clone();
        let arguments = Arc::clone(&shared_arguments);
        let input_file = input_file.clone();
        pool.execute(move || {
            let result = convert_image(&arguments, &input_file);
            // The receiver only hangs up after every job reported
            let _ = sender.send((input_file, result));
        });
    }
    drop(sender);

    let mut received = 0;
    let mut first_failure = None;
    for (input_file, result) in receiver {
        received += 1;
        match result {
            Ok(output_file) => log::info!(
                "Converted '{}' to '{}'",
                input_file.display(),
                output_file.display()
            ),
            Err(e) => {
                log::error!("Converting '{}' failed: {}", input_file.display(), e);
                first_failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_failure {
        return Err(e);
    }
    let lost = arguments.input_files.len() - received;
    if lost > 0 {
        return Err(Error::ConversionWorkerLost(lost));
    }
    Ok(())
}

/// Reads one file, applies the requested effects and writes it to the
/// output directory. Returns the path written.
pub fn convert_image(arguments: &Arguments, input_file: &Path) -> Result<PathBuf> {
    let input_format = FileFormat::from_path(input_file)?;
    let reader = BufReader::new(open_input_file(input_file)?);
    let mut image = codec::read_image(input_format, reader)?;
    apply_effects(&mut image, arguments)?;
    prepare_for_output(&mut image, arguments.format, arguments.compression)?;

    let output_file = output_file_path(arguments, input_file);
    let writer = BufWriter::new(open_output_file(&output_file)?);
    let options = SaveOptions {
        rle: arguments.rle,
    };
    codec::write_image(arguments.format, writer, &image, &options)?;
    Ok(output_file)
}

fn apply_effects(image: &mut Image<'_>, arguments: &Arguments) -> Result<()> {
    if let Some(color) = arguments.color_key {
        image.apply_effect(&ColorKey::new(color, arguments.tolerance))?;
    }
    if arguments.monochrome {
        image.apply_effect(&Monochrome)?;
    }
    if arguments.flip_x {
        image.apply_effect(&FlipX)?;
    }
    if arguments.flip_y {
        image.apply_effect(&FlipY)?;
    }
    Ok(())
}

/// Brings the pixels into a format the output container can store.
fn prepare_for_output(
    image: &mut Image<'_>,
    format: FileFormat,
    compression: Compression,
) -> Result<()> {
    let buffer = image.buffer().ok_or(Error::ImageHasNoBuffer)?;
    let data_type = buffer.data_type();
    let layout = buffer.layout();
    match format {
        FileFormat::Dds => {
            let target = match compression {
                Compression::Bc4 => ChannelLayout::Grayscale,
                Compression::Bc5 => ChannelLayout::GrayscaleAlpha,
                _ => ChannelLayout::Rgba,
            };
            image.apply_effect(&Convert::new(DataType::Byte, target))?;
            for buffer in image.buffers_mut() {
                buffer.set_compression(compression)?;
            }
        }
        FileFormat::Tga | FileFormat::Bmp => {
            let target = match layout {
                ChannelLayout::GrayscaleAlpha => ChannelLayout::Rgba,
                ChannelLayout::Palette if data_type != DataType::Byte => ChannelLayout::Rgb,
                other => other,
            };
            if data_type != DataType::Byte || target != layout {
                image.apply_effect(&Convert::new(DataType::Byte, target))?;
            }
        }
    }
    Ok(())
}

fn output_file_path(arguments: &Arguments, input_file: &Path) -> PathBuf {
    let stem = input_file.file_stem().unwrap_or_default();
    arguments
        .output_directory
        .join(stem)
        .with_extension(arguments.format.extension())
}
