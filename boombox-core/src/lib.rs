mod config;
mod util;

mod playback;

pub use config::*;
pub use playback::*;
pub use util::*;
