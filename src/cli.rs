use crate::color::RgbColor;
use crate::image::codec::FileFormat;
use crate::image::format::Compression;
use crate::Arguments;
use clap::{
    arg, crate_authors, crate_description, crate_name, crate_version, value_parser, Arg,
    ArgAction, ArgMatches, Command,
};
use std::ffi::OsString;
use std::path::PathBuf;
use std::{io, thread};

pub struct CLIParser {
    command: Command,
}

impl CLIParser {
    pub fn new() -> Self {
        let command = Self::create_base_command();
        let command = Self::register_arguments(command);
        CLIParser { command }
    }

    pub fn parse<I, T>(&mut self, itr: I) -> Arguments
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self
            .command
            .try_get_matches_from_mut(itr)
            .unwrap_or_else(|e| e.exit());
        Self::extract_arguments(&matches)
    }

    fn register_arguments(command: Command) -> Command {
        let command = Self::register_input_files_argument(command);
        let command = Self::register_output_directory_argument(command);
        let command = Self::register_format_argument(command);
        let command = Self::register_compression_argument(command);
        let command = Self::register_rle_argument(command);
        let command = Self::register_flip_arguments(command);
        let command = Self::register_monochrome_argument(command);
        let command = Self::register_color_key_arguments(command);
        Self::register_threads_argument(command)
    }

    fn register_input_files_argument(command: Command) -> Command {
        command.arg(Self::create_input_files_argument())
    }

    fn register_output_directory_argument(command: Command) -> Command {
        command.arg(Self::create_output_directory_argument())
    }

    fn register_format_argument(command: Command) -> Command {
        command.arg(Self::create_format_argument())
    }

    fn register_compression_argument(command: Command) -> Command {
        command.arg(Self::create_compression_argument())
    }

    fn register_rle_argument(command: Command) -> Command {
        command.arg(Self::create_rle_argument())
    }

    fn register_flip_arguments(command: Command) -> Command {
        command
            .arg(Self::create_flip_x_argument())
            .arg(Self::create_flip_y_argument())
    }

    fn register_monochrome_argument(command: Command) -> Command {
        command.arg(Self::create_monochrome_argument())
    }

    fn register_color_key_arguments(command: Command) -> Command {
        command
            .arg(Self::create_color_key_argument())
            .arg(Self::create_tolerance_argument())
    }

    fn register_threads_argument(command: Command) -> Command {
        command.arg(Self::create_threads_argument())
    }

    fn create_base_command() -> Command {
        Command::new(crate_name!())
            .version(crate_version!())
            .author(crate_authors!())
            .about(crate_description!())
    }

    fn create_input_files_argument() -> Arg {
        Arg::new("input_files")
            .help("TGA, BMP or DDS files to convert")
            .value_parser(value_parser!(PathBuf))
            .num_args(1..)
            .required(true)
    }

    fn create_output_directory_argument() -> Arg {
        arg!(output_directory: -o --output_directory <DIR> "Directory receiving the converted files")
            .default_value(".")
            .value_parser(value_parser!(PathBuf))
    }

    fn create_format_argument() -> Arg {
        arg!(format: -f --format <FORMAT> "Output file format")
            .default_value("tga")
            .value_parser(value_parser!(FileFormat))
    }

    fn create_compression_argument() -> Arg {
        arg!(compression: -c --compression <COMPRESSION> "Block compression of DDS output")
            .default_value("dxt5")
            .value_parser(value_parser!(Compression))
    }

    fn create_rle_argument() -> Arg {
        arg!(rle: --rle "Run length encode TGA output").action(ArgAction::SetTrue)
    }

    fn create_flip_x_argument() -> Arg {
        arg!(flip_x: --flip_x "Mirror the image horizontally").action(ArgAction::SetTrue)
    }

    fn create_flip_y_argument() -> Arg {
        arg!(flip_y: --flip_y "Mirror the image vertically").action(ArgAction::SetTrue)
    }

    fn create_monochrome_argument() -> Arg {
        arg!(monochrome: -m --monochrome "Reduce colors to their luminance").action(ArgAction::SetTrue)
    }

    fn create_color_key_argument() -> Arg {
        arg!(color_key: -k --color_key <RRGGBB> "Make pixels of this color transparent")
            .required(false)
            .value_parser(value_parser!(RgbColor))
    }

    fn create_tolerance_argument() -> Arg {
        arg!(tolerance: --tolerance <TOLERANCE> "Per channel color key tolerance between 0 and 1")
            .default_value("0")
            .value_parser(parse_tolerance)
    }

    fn create_threads_argument() -> Arg {
        arg!(-t --threads <THREADS> "Number of Threads")
            .default_value(get_number_of_threads().unwrap_or(1).to_string())
            .required(false)
            .value_parser(value_parser!(usize))
    }

    fn extract_arguments(matches: &ArgMatches) -> Arguments {
        Arguments {
            input_files: Self::extract_input_files_argument(matches),
            output_directory: Self::extract_output_directory_argument(matches),
            format: Self::extract_format_argument(matches),
            compression: Self::extract_compression_argument(matches),
            rle: matches.get_flag("rle"),
            flip_x: matches.get_flag("flip_x"),
            flip_y: matches.get_flag("flip_y"),
            monochrome: matches.get_flag("monochrome"),
            color_key: Self::extract_color_key_argument(matches),
            tolerance: Self::extract_tolerance_argument(matches),
            number_of_threads: Self::extract_threads_argument(matches),
        }
    }

    fn extract_input_files_argument(matches: &ArgMatches) -> Vec<PathBuf> {
        matches
            .get_many::<PathBuf>("input_files")
            .expect("Required argument input_files not provided")
            .cloned()
            .collect()
    }

    fn extract_output_directory_argument(matches: &ArgMatches) -> PathBuf {
        matches
            .get_one::<PathBuf>("output_directory")
            .expect("Output directory must be provided, but was unset.")
            .clone()
    }

    fn extract_format_argument(matches: &ArgMatches) -> FileFormat {
        matches
            .get_one::<FileFormat>("format")
            .expect("Output format must be provided, but was unset.")
            .to_owned()
    }

    fn extract_compression_argument(matches: &ArgMatches) -> Compression {
        matches
            .get_one::<Compression>("compression")
            .expect("Compression must be provided, but was unset.")
            .to_owned()
    }

    fn extract_color_key_argument(matches: &ArgMatches) -> Option<RgbColor> {
        matches.get_one::<RgbColor>("color_key").copied()
    }

    fn extract_tolerance_argument(matches: &ArgMatches) -> f64 {
        matches
            .get_one::<f64>("tolerance")
            .expect("Tolerance must be provided, but was unset.")
            .to_owned()
    }

    fn extract_threads_argument(matches: &ArgMatches) -> usize {
        matches
            .get_one::<usize>("threads")
            .expect("Required argument threads not provided")
            .to_owned()
    }
}

impl Default for CLIParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_tolerance(value: &str) -> Result<f64, String> {
    let tolerance = value
        .parse::<f64>()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    if (0.0..=1.0).contains(&tolerance) {
        Ok(tolerance)
    } else {
        Err(format!("Tolerance {} is outside of 0..1", tolerance))
    }
}

fn get_number_of_threads() -> io::Result<usize> {
    Ok(thread::available_parallelism()?.get())
}

#[cfg(test)]
mod tests {
    use clap::{error::ErrorKind, Command};

    use super::{CLIParser, Compression, FileFormat, RgbColor};

    const PROGRAM_NAME_ARGUMENT: &str = "test_program_name";

    #[test]
    fn parse_input_files_argument() {
        let command = Command::new("test");
        let command = CLIParser::register_input_files_argument(command);
        let matches =
            command.get_matches_from(vec![PROGRAM_NAME_ARGUMENT, "first.tga", "second.dds"]);
        let input_files = CLIParser::extract_input_files_argument(&matches);
        assert_eq!(input_files.len(), 2);
        assert_eq!(input_files[1].file_name().unwrap(), "second.dds");
    }

    #[test]
    fn missing_input_files_are_rejected() {
        let command = Command::new("test");
        let command = CLIParser::register_input_files_argument(command);
        let result = command.try_get_matches_from(vec![PROGRAM_NAME_ARGUMENT]);
        if let Err(error) = result {
            assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
        } else {
            panic!("Missing input files not detected");
        }
    }

    #[test]
    fn parse_format_argument() {
        let command = Command::new("test");
        let command = CLIParser::register_format_argument(command);
        let matches = command.get_matches_from(vec![PROGRAM_NAME_ARGUMENT, "--format", "dds"]);
        assert_eq!(
            CLIParser::extract_format_argument(&matches),
            FileFormat::Dds
        );
    }

    #[test]
    fn parse_compression_alias() {
        let command = Command::new("test");
        let command = CLIParser::register_compression_argument(command);
        let matches = command.get_matches_from(vec![PROGRAM_NAME_ARGUMENT, "-c", "bc1"]);
        assert_eq!(
            CLIParser::extract_compression_argument(&matches),
            Compression::Dxt1
        );
    }

    #[test]
    fn parse_color_key_arguments() {
        let command = Command::new("test");
        let command = CLIParser::register_color_key_arguments(command);
        let matches = command.get_matches_from(vec![
            PROGRAM_NAME_ARGUMENT,
            "--color_key",
            "FF00ff",
            "--tolerance",
            "0.25",
        ]);
        assert_eq!(
            CLIParser::extract_color_key_argument(&matches),
            Some(RgbColor::new(255, 0, 255))
        );
        assert_eq!(CLIParser::extract_tolerance_argument(&matches), 0.25);
    }

    #[test]
    fn parse_tolerance_illegal_argument() {
        let command = Command::new("test");
        let command = CLIParser::register_color_key_arguments(command);
        let result =
            command.try_get_matches_from(vec![PROGRAM_NAME_ARGUMENT, "--tolerance", "1.5"]);
        if let Err(error) = result {
            assert_eq!(error.kind(), ErrorKind::ValueValidation);
        } else {
            panic!("Illegal value for tolerance not detected");
        }
    }

    #[test]
    fn parse_number_of_threads_argument() {
        let command = Command::new("test");
        let command = CLIParser::register_threads_argument(command);
        let matches = command.get_matches_from(vec![PROGRAM_NAME_ARGUMENT, "--threads", "5"]);
        let actual = CLIParser::extract_threads_argument(&matches);
        let expected = 5;
        assert_eq!(actual, expected);
    }

    #[test]
    fn parse_required_arguments_only() {
        let mut cli_parser = CLIParser::default();
        let arguments = cli_parser.parse(vec![PROGRAM_NAME_ARGUMENT, "/input/image.bmp"]);
        assert_eq!(
            arguments.input_files[0].file_name().unwrap(),
            "image.bmp",
            "input file does not match"
        );
        assert_eq!(
            arguments.output_directory.to_str(),
            Some("."),
            "output directory does not match"
        );
        assert_eq!(arguments.format, FileFormat::Tga, "format does not match");
        assert_eq!(
            arguments.compression,
            Compression::Dxt5,
            "compression does not match"
        );
        assert!(!arguments.rle && !arguments.flip_x && !arguments.flip_y);
        assert!(!arguments.monochrome, "monochrome does not match");
        assert_eq!(arguments.color_key, None, "color key does not match");
        assert_eq!(arguments.tolerance, 0.0, "tolerance does not match");
    }

    #[test]
    fn parse_all_flags() {
        let mut cli_parser = CLIParser::default();
        let arguments = cli_parser.parse(vec![
            PROGRAM_NAME_ARGUMENT,
            "a.tga",
            "--rle",
            "--flip_x",
            "--flip_y",
            "-m",
            "-t",
            "3",
        ]);
        assert!(arguments.rle && arguments.flip_x && arguments.flip_y && arguments.monochrome);
        assert_eq!(arguments.number_of_threads, 3);
    }
}
