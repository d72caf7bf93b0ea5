//! Fuzz connection string parsing. Must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use trackdb_pool::ConnectionParams;

fuzz_target!(|data: &str| {
    if let Ok(params) = ConnectionParams::from_connection_string(data) {
        let _ = params.validate();
        let _ = params.open_flags();
        let _ = format!("{params:?}");
    }
});
