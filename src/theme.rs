const AUTHOR: &str = "Christian Hammond";
const HOMEPAGE: &str = "http://www.galago-project.org/";

/// Theme metadata reported to the daemon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemeInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub homepage: String,
}

pub fn theme_info() -> ThemeInfo {
    ThemeInfo {
        name: "Standard".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        author: AUTHOR.to_string(),
        homepage: HOMEPAGE.to_string(),
    }
}

/// A theme only loads into a daemon of exactly its own version.
pub fn check_init(major: u32, minor: u32, micro: u32) -> bool {
    let ours = [
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    ];
    [major, minor, micro]
        .iter()
        .zip(ours)
        .all(|(theirs, ours)| ours.parse::<u32>().is_ok_and(|ours| ours == *theirs))
}
