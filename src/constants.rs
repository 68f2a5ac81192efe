use std::time::Duration;

// Protocol constants
pub const ESCAPE_CHAR: u8 = 0x1B;
pub const ESCAPE_ESCAPE_CHAR: u8 = 0x01;
pub const NEWLINE_CHAR: u8 = 0x0A;
pub const NEWLINE_ESCAPE_CHAR: u8 = 0x02;
pub const CARRIAGERETURN_CHAR: u8 = 0x0D;
pub const CARRIAGERETURN_ESCAPE_CHAR: u8 = 0x03;

// Default configuration
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONCURRENT: usize = 16;
pub const DEFAULT_BASE_URL: &str = "http://lcls-archapp.slac.stanford.edu/retrieval";
pub const DEFAULT_OPERATOR: &str = "mean";

// Archiver endpoints, relative to the base URL
pub const RAW_DATA_PATH: &str = "data/getData.raw";
pub const JSON_DATA_PATH: &str = "data/getData.qw";
pub const REGEX_PATH: &str = "bpl/getMatchingPVs";

pub const REGEX_MAXIMUM_MATCHES: usize = 1000;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
