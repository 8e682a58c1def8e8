pub mod errors;
pub mod meta;
pub mod model;
pub mod script;
pub mod session;
pub mod trace;
pub mod webdriver;

pub use errors::{DriverError, DriverResult};
pub use meta::SessionMeta;
pub use script::PageScript;
pub use session::{AutomationSession, WaitOptions};
pub use webdriver::{WebDriverConfig, WebDriverSession};
