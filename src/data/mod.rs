pub mod loader;
pub mod panel;
pub mod raw;

pub use loader::{parse_date, PanelLoader};
pub use panel::{Panel, PanelError};
pub use raw::{FieldSource, LoaderCapabilities, RawDataLoader, RawField};
