use std::env::args_os;

use image_buffer::{convert_images, CLIParser};

fn main() {
    let mut cli_parser = CLIParser::default();
    let arguments = cli_parser.parse(args_os());
    match convert_images(&arguments) {
        Ok(_) => println!("Conversion successful"),
        Err(e) => eprintln!("Conversion failed because of: {}", e),
    }
}
