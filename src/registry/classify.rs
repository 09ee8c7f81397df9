// ABOUTME: Derives a release's channel from its own tag, name and prerelease flag.
// ABOUTME: Case-insensitive keyword match: nightly, then dev, then beta, then the prerelease flag.

use crate::types::Channel;

pub fn classify(tag: &str, name: &str, prerelease: bool) -> Channel {
    let tag = tag.to_lowercase();
    let name = name.to_lowercase();
    let mentions = |word: &str| tag.contains(word) || name.contains(word);

    if mentions("nightly") {
        Channel::Nightly
    } else if mentions("dev") {
        Channel::Dev
    } else if mentions("beta") || prerelease {
        Channel::Beta
    } else {
        Channel::Release
    }
}
