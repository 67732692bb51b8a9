mod store;

pub use store::{ConfigScope, JsonStore, CONFIG_DIR_NAME};
