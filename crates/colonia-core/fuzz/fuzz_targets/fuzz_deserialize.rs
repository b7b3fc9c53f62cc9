#![no_main]
use colonia_core::catalog::Catalog;
use colonia_core::city::City;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic -- returning Err is fine.
    let _ = City::deserialize(data, Catalog::standard());
});
