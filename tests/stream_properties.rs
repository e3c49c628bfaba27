//! Properties that must hold however the stream is cut into chunks, and for any input bytes at all.


use proptest::prelude::*;

use ebml_streaming::tools::{self, SignedVint, Vint};
use ebml_streaming::{EbmlSize, ParseEvent};

use test_schema::*;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 100,
        max_shrink_iters: 100,
        timeout: 1000,
        ..ProptestConfig::default()
    }
}

fn whole_stream_events() -> Vec<ParseEvent> {
    final_events(&parse_in_chunks(&mut parser(), &sample_stream(), usize::MAX))
}

proptest! {
    #![proptest_config(config())]

    /// Chunk boundaries never change what is produced.
    #[test]
    fn any_split_matches_whole_stream(mut splits in prop::collection::vec(0usize..400, 0..12)) {
        splits.sort_unstable();
        let events = parse_split_at(&mut parser(), &sample_stream(), &splits);
        prop_assert_eq!(whole_stream_events(), final_events(&events));
    }

    #[test]
    fn any_chunk_size_matches_whole_stream(chunk_len in 1usize..64) {
        let events = parse_in_chunks(&mut parser(), &sample_stream(), chunk_len);
        prop_assert_eq!(whole_stream_events(), final_events(&events));
    }

    /// Garbage is reported, never a panic, and flushing always leaves the parser empty.
    #[test]
    fn garbage_never_panics(input in prop::collection::vec(any::<u8>(), 0..1000), chunk_len in 1usize..64) {
        let mut parser = tracing_parser();
        let _ = parse_in_chunks(&mut parser, &input, chunk_len);
        prop_assert_eq!(0, parser.buffered_len());
        prop_assert!(!parser.has_open_document());
        prop_assert_eq!(input.len() as u64, parser.stream_offset());
    }

    /// Garbage after a complete document doesn't reach back into it.
    #[test]
    fn garbage_after_document(input in prop::collection::vec(any::<u8>(), 0..200)) {
        let mut stream = encode(&[webm_header()]);
        stream.extend_from_slice(&input);
        let docs = documents(&parse_in_chunks(&mut parser(), &stream, 16));
        prop_assert!(!docs.is_empty());
        prop_assert_eq!(Ok("webm"), docs[0].header_fields().doc_type());
    }
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn sizes_read_back(value in 0u64..(1 << 56) - 1) {
        let bytes = value.as_vint().unwrap();
        prop_assert_eq!(Some((EbmlSize::Known(value), bytes.len())), tools::read_size(&bytes).unwrap());

        // Any shorter prefix asks for more data instead of failing
        for end in 0..bytes.len() {
            prop_assert_eq!(None, tools::read_size(&bytes[..end]).unwrap());
        }
    }

    #[test]
    fn signed_vints_read_back(value in -(1i64 << 55) + 1..(1i64 << 55)) {
        let bytes = value.as_signed_vint().unwrap();
        prop_assert_eq!(Some((value, bytes.len())), tools::read_signed_vint(&bytes).unwrap());
    }

    /// A tag id read from a stream is the same number that was written, marker included.
    #[test]
    fn tags_keep_marker(width in 1u32..=4, data in any::<u32>()) {
        let data = u64::from(data) & ((1 << (7 * width)) - 1);
        let tag = (1u64 << (7 * width)) | data;
        let bytes = tools::tag_id_bytes(tag);
        prop_assert_eq!(width as usize, bytes.len());
        prop_assert_eq!(Some((tag, bytes.len())), tools::read_tag_id(&bytes).unwrap());

        let (size, length) = tools::read_size(&bytes).unwrap().unwrap();
        prop_assert_eq!(EbmlSize::new(data, length), size);
    }
}
