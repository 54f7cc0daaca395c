//! Configuration section definitions.
//!
//! Each module corresponds to a section in `hotserve.toml`:
//!
//! | Module     | TOML Section   | Purpose                               |
//! |------------|----------------|---------------------------------------|
//! | `reload`   | `[reload]`     | Dependency depth, settle delay, paths |
//! | `serve`    | `[serve]`      | Interface, port probing, workers      |
//! | `instance` | `[[instance]]` | Server instances launched by the CLI  |

mod instance;
mod reload;
mod serve;

pub use instance::InstanceConfig;
pub use reload::ReloadConfig;
pub use serve::ServeConfig;
