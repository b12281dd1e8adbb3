pub mod channel;
pub mod columnar;
pub mod config;
pub mod error;
pub mod exec;
pub mod ident;
pub mod marshal;
pub mod mindb;
pub mod observe;

pub use config::MarshalConfig;
pub use error::{AppError, AppResult};
pub use exec::{all_marshal, all_marshal_observed};
pub use marshal::{MarshalOptions, MarshalValue, MarshalVersion};
pub use mindb::{open_variant, MinDb, OpenMode, SqlParam, VariantKind};

// Test-only printing helper: expands to eprintln! during tests and is absent otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
