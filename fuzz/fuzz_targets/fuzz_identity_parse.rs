#![no_main]

use libfuzzer_sys::fuzz_target;
use ziti_wire::bootstrap::IdentityConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(identity) = IdentityConfig::from_json(json) {
            assert!(identity.controller_url.starts_with("https://"));
            assert!(identity.validate().is_ok());
        }
    }
});
