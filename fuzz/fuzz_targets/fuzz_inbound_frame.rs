#![no_main]

use gamelink_client::router::Router;
use gamelink_client::Envelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Outer envelope only.
    let _ = Envelope::decode(text);

    // Full inbound path: envelope, tag lookup and typed payload decode.
    let router = Router::new();
    let _ = router.decode(text);
});
