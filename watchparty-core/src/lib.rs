mod config;
mod danmu;
mod events;
mod sync;
mod util;

pub use config::*;
pub use danmu::*;
pub use events::*;
pub use sync::*;
pub use util::*;
