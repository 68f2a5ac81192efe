// live.rs

use once_cell::sync::Lazy;
use regex::Regex;

const PV_SEPARATOR: &str = ":";
const PATH_SEPARATOR: &str = "=";

static PV_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-:\.]+$").expect("Failed to compile PV name regex")
});

static CHANNEL_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-=\.]+$").expect("Failed to compile channel path regex")
});

/// Channel path under which live updates of `pvname` are published
pub fn channel_path(pvname: &str) -> String {
    pvname.replace(PV_SEPARATOR, PATH_SEPARATOR)
}

pub fn pv_from_channel(path: &str) -> String {
    path.replace(PATH_SEPARATOR, PV_SEPARATOR)
}

pub fn is_pv_name_valid(pvname: &str) -> bool {
    PV_NAME_REGEX.is_match(pvname)
}

pub fn is_path_valid(path: &str) -> bool {
    CHANNEL_PATH_REGEX.is_match(path)
}
