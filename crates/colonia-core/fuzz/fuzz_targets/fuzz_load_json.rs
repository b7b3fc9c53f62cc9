#![no_main]
use colonia_core::city::City;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let mut city = City::standard();
    if city.load_json(json).is_ok() {
        // Whatever loaded must be able to run.
        city.advance(30);
    }
});
