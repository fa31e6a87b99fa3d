use std::path::Path;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const CONFIG_FILE: &str = "log4rs.yaml";
const PATTERN: &str = "{d(%H:%M:%S%.3f)} {h({l:<5})} {t} - {m}{n}";

#[ctor::ctor]
fn init() {
    let result = if Path::new(CONFIG_FILE).exists() {
        log4rs::init_file(CONFIG_FILE, Default::default()).map_err(|e| e.to_string())
    } else {
        init_stderr()
    };
    if let Err(e) = result {
        eprintln!("Logging is disabled: {}", e);
    }
}

fn init_stderr() -> Result<(), String> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(LevelFilter::Warn))
        .map_err(|e| e.to_string())?;
    log4rs::init_config(config)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Dumps a file header as hex bytes, sixteen per line.
pub fn log_header(name: &str, bytes: &[u8]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    fn get_byte_line(bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|byte| format!("{:02X}", byte))
            .collect::<Vec<_>>()
            .join(" ")
    }
    let lines: Vec<String> = bytes.chunks(16).map(get_byte_line).collect();
    log::debug!("{} ({} bytes)\n{}", name, bytes.len(), lines.join("\n"));
}
