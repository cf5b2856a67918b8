#![no_main]

use bytes::Bytes;
use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use ziti_wire::socket::{Chunk, Encoding};

#[derive(Debug)]
struct ChunkInput {
    text: String,
    raw: Vec<u8>,
    encoding: Encoding,
}

impl<'a> Arbitrary<'a> for ChunkInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        let encoding = match u.int_in_range(0..=4u8)? {
            0 => Encoding::Utf8,
            1 => Encoding::Ascii,
            2 => Encoding::Latin1,
            3 => Encoding::Hex,
            _ => Encoding::Base64,
        };
        Ok(Self {
            text: u.arbitrary()?,
            raw: u.arbitrary()?,
            encoding,
        })
    }
}

fuzz_target!(|input: ChunkInput| {
    // conversion never panics; byte chunks pass through untouched
    let _ = Chunk::from(input.text).into_bytes(input.encoding);

    let raw = Bytes::from(input.raw);
    let converted = Chunk::from(raw.clone()).into_bytes(input.encoding);
    assert_eq!(converted.ok(), Some(raw));
});
