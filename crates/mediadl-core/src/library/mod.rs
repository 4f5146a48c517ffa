//! Library placement and media-server refresh.

mod notify;
mod placer;

pub use notify::{notifier_from_config, JellyfinNotifier, LibraryNotifier, NoopNotifier};
pub use placer::{unique_destination, FsLibrary, LibraryPlacer};
pub(crate) use placer::move_file;
