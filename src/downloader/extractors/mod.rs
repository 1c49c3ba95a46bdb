// InfoExtractor module - metadata probing through yt-dlp
//
// The extractor reads stream formats and titles without downloading media.
// Diagnostics turn yt-dlp stderr into a reason a chat user can understand.

mod cli;
mod diagnostics;
mod traits;

pub use cli::CliInfoExtractor;
pub use diagnostics::{diagnose_error, BlockingReason};
pub use traits::{ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, InfoExtractor};
