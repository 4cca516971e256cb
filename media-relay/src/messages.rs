//! Texts sent back to submitters.

use std::path::Path;

pub const UNAUTHORIZED: &str = "Access denied: this bot is private.";

pub const INVALID_URL: &str = "Please send me a valid link (http/https).";

pub const GENERIC_ERROR: &str =
    "\u{274c} Something went wrong while downloading or sending the video. Try again with another link.";

pub const STILL_PROCESSING: &str = "\u{23f3} The upload is taking longer than expected. \
     The server is still processing it; the video should arrive shortly.";

pub fn welcome(upload_limit_mb: u64) -> String {
    format!(
        "\u{1f44b} Hi! Send me a YouTube/Instagram/TikTok link and I will download the video \
         and send it back to you.\nMaximum upload size: {upload_limit_mb} MB.\n\n\
         /keep <link> downloads without sending, /send <path> sends a file from the download folder."
    )
}

pub fn queued(position: usize) -> String {
    if position <= 1 {
        "Downloading the video, one moment...".to_string()
    } else {
        format!("Link received. You are number {position} in the queue.")
    }
}

pub fn already_present(file_name: &str) -> String {
    format!("\u{267b}\u{fe0f} {file_name} was already downloaded, sending the existing file.")
}

pub fn stored(path: &Path, size_mb: f64) -> String {
    format!(
        "\u{1f4be} Saved {size_mb:.1} MB to {} on the server.",
        path.display()
    )
}

pub fn local_file_missing(path: &str) -> String {
    format!("\u{274c} No file found at {path} on the server.")
}

pub fn outside_download_dir(path: &str) -> String {
    format!("\u{274c} {path} is outside the download folder and cannot be sent.")
}
