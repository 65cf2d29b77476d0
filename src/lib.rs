pub mod auth;
pub mod capture;
pub mod config;
mod error;
pub mod key_asset;
pub mod page;
pub mod progress;
pub mod recorder;
pub mod schedule;

pub use auth::{AuthSession, Authenticator};
pub use config::Config;
pub use error::{Error, Result};
pub use key_asset::{KeyAssetProvider, KeyMaterial};
pub use page::StreamDescriptor;
pub use recorder::{Recorder, Recording};
pub use schedule::{ProgramTitle, TitleResolver};
